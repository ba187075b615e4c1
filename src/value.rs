//! The dynamic value type that flows through bindings.

use std::fmt;
use std::rc::Rc;

use crate::observation::{Object, ObservableArray};
use crate::template::ViewTemplate;

/// A value read from a source object, produced by a binding, or written to a node.
///
/// Primitives compare by value. Objects, arrays and templates compare by
/// identity, so two structurally equal objects are still different values.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number. `NaN` is never equal to anything, itself included.
    Number(f64),
    /// Immutable shared text.
    Text(Rc<str>),
    /// An observable object.
    Object(Object),
    /// An observable array.
    Array(ObservableArray),
    /// A view template, rendered when bound to content.
    Template(ViewTemplate),
}

impl Value {
    /// Strict identity comparison used for change detection.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Template(a), Value::Template(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Template(_) => "template",
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by boolean attributes: null, `false`, zero, `NaN` and
    /// empty text are falsy, everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Template(_) => true,
        }
    }

    /// Reads a property when this value is an object, tracking the read if an
    /// observer is active. Every other variant yields [`Value::Null`].
    pub fn get(&self, name: &str) -> Value {
        match self {
            Value::Object(object) => object.get(name),
            _ => Value::Null,
        }
    }

    /// The object, if this is one.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The array, if this is one.
    pub fn as_array(&self) -> Option<&ObservableArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// The template, if this is one.
    pub fn as_template(&self) -> Option<&ViewTemplate> {
        match self {
            Value::Template(template) => Some(template),
            _ => None,
        }
    }

    /// The text, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The number, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text written into the DOM for this value. Null renders as the empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null | Value::Template(_) => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_owned(),
            Value::Array(array) => array
                .to_vec()
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{sign}Infinity")
    } else {
        // f64's Display already drops a trailing `.0`.
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Text(s) => write!(f, "Text({s:?})"),
            Value::Object(object) => write!(f, "Object({})", object.type_name()),
            Value::Array(array) => write!(f, "Array(len = {})", array.len()),
            Value::Template(_) => f.write_str("Template"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Value::Number(n as f64)
            }
        })*
    };
}

number_from!(i32, i64, u32, usize, f32);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Text(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<ObservableArray> for Value {
    fn from(array: ObservableArray) -> Self {
        Value::Array(array)
    }
}

impl From<ViewTemplate> for Value {
    fn from(template: ViewTemplate) -> Self {
        Value::Template(template)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

//! Binding descriptions: an expression plus how it reacts to change.

use std::fmt;
use std::rc::Rc;

use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::observation::BindingFn;
use crate::value::Value;

/// Writes a value from the DOM back into the source.
pub type AssignFn = Rc<dyn Fn(&Value, Value, &ExecutionContext) -> Result<()>>;

/// Converts a value read from the DOM before it is assigned.
pub type ConvertFn = Rc<dyn Fn(Value) -> Value>;

/// Options of a two-way binding.
#[derive(Clone)]
pub struct TwoWayOptions {
    pub(crate) assign: AssignFn,
    pub(crate) change_event: Rc<str>,
    pub(crate) convert: Option<ConvertFn>,
}

/// When a binding is re-evaluated.
#[derive(Clone)]
pub enum BindingMode {
    /// Evaluated once at bind time, never observed.
    OneTime,
    /// Observed; re-evaluated whenever a dependency changes.
    OnChange,
    /// Observed like [`BindingMode::OnChange`], and the node's value is
    /// written back to the source when its change event fires.
    TwoWay(TwoWayOptions),
    /// Re-evaluated only when the named signal is sent.
    Signal(Rc<str>),
}

/// A binding expression and its update policy.
///
/// Bindings are volatile by default: dependencies are rediscovered on every
/// evaluation, which is always correct. Call [`stable`](Binding::stable) on
/// bindings whose set of reads never depends on the data.
#[derive(Clone)]
pub struct Binding {
    evaluate: BindingFn,
    volatile: bool,
    synchronous: bool,
    mode: BindingMode,
}

impl Binding {
    /// An on-change binding.
    pub fn new(f: impl Fn(&Value, &ExecutionContext) -> Result<Value> + 'static) -> Self {
        Self {
            evaluate: Rc::new(f),
            volatile: true,
            synchronous: false,
            mode: BindingMode::OnChange,
        }
    }

    /// Declare that the expression always reads the same properties.
    pub fn stable(mut self) -> Self {
        self.volatile = false;
        self
    }

    /// Apply changes immediately instead of through the update queue.
    pub fn synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }

    /// Queue changes through the update queue. The default except for two-way bindings.
    pub fn queued(mut self) -> Self {
        self.synchronous = false;
        self
    }

    /// Change the event a two-way binding listens for. Default: `"change"`.
    pub fn change_event(mut self, event_type: &str) -> Self {
        if let BindingMode::TwoWay(options) = &mut self.mode {
            options.change_event = event_type.into();
        }
        self
    }

    /// Convert DOM values before a two-way binding assigns them.
    pub fn convert(mut self, f: impl Fn(Value) -> Value + 'static) -> Self {
        if let BindingMode::TwoWay(options) = &mut self.mode {
            options.convert = Some(Rc::new(f));
        }
        self
    }

    /// Evaluate without any observation bookkeeping of its own.
    pub fn evaluate(&self, source: &Value, context: &ExecutionContext) -> Result<Value> {
        (self.evaluate)(source, context)
    }

    /// The expression.
    pub fn evaluator(&self) -> BindingFn {
        self.evaluate.clone()
    }

    /// The update policy.
    pub fn mode(&self) -> &BindingMode {
        &self.mode
    }

    /// Whether dependencies are rediscovered on each evaluation.
    pub fn is_volatile(&self) -> bool {
        self.volatile
    }

    /// Whether changes bypass the update queue.
    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match &self.mode {
            BindingMode::OneTime => "one-time".to_owned(),
            BindingMode::OnChange => "on-change".to_owned(),
            BindingMode::TwoWay(options) => format!("two-way({})", options.change_event),
            BindingMode::Signal(name) => format!("signal({name})"),
        };
        f.debug_struct("Binding")
            .field("mode", &mode)
            .field("volatile", &self.volatile)
            .field("synchronous", &self.synchronous)
            .finish()
    }
}

/// An on-change binding.
pub fn bind(f: impl Fn(&Value, &ExecutionContext) -> Result<Value> + 'static) -> Binding {
    Binding::new(f)
}

/// A binding evaluated once per bind.
pub fn one_time(f: impl Fn(&Value, &ExecutionContext) -> Result<Value> + 'static) -> Binding {
    Binding {
        mode: BindingMode::OneTime,
        ..Binding::new(f)
    }
}

/// A binding re-evaluated when signal `name` is sent.
pub fn signal(
    name: &str,
    f: impl Fn(&Value, &ExecutionContext) -> Result<Value> + 'static,
) -> Binding {
    Binding {
        mode: BindingMode::Signal(name.into()),
        ..Binding::new(f)
    }
}

/// A two-way binding: `get` renders, `assign` writes DOM changes back.
///
/// Two-way bindings apply model changes synchronously, so the node and the
/// source agree as soon as the change event handler returns.
pub fn two_way(
    get: impl Fn(&Value, &ExecutionContext) -> Result<Value> + 'static,
    assign: impl Fn(&Value, Value, &ExecutionContext) -> Result<()> + 'static,
) -> Binding {
    Binding {
        mode: BindingMode::TwoWay(TwoWayOptions {
            assign: Rc::new(assign),
            change_event: "change".into(),
            convert: None,
        }),
        synchronous: true,
        ..Binding::new(get)
    }
}

/// A stable on-change binding reading property `name` of the source.
pub fn prop(name: &str) -> Binding {
    let name: Rc<str> = name.into();
    Binding::new(move |source, _| Ok(source.get(&name))).stable()
}

/// A two-way binding on property `name` of the source object.
pub fn two_way_prop(name: &str) -> Binding {
    let read: Rc<str> = name.into();
    let write = read.clone();
    two_way(
        move |source, _| Ok(source.get(&read)),
        move |source, value, _| {
            let object = source.as_object().ok_or(Error::TypeMismatch {
                expected: "object",
                found: source.kind(),
            })?;
            object.set(&write, value);
            Ok(())
        },
    )
    .stable()
}

//! Observable objects: dynamic property bags whose accessor-backed fields
//! notify subscribers on change.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::accessor;
use super::notifier::{ChangeArgs, Notifier};
use super::watcher::current_watcher;
use super::PropertySource;
use crate::hash::FastHashMap;
use crate::value::Value;

/// A shared, dynamically typed object.
///
/// Reads and writes of properties that have an [`Accessor`](super::Accessor)
/// registered for the object's type are observable; all other fields are
/// plain storage.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

struct ObjectInner {
    type_name: Rc<str>,
    fields: RefCell<FastHashMap<Rc<str>, Value>>,
    notifier: OnceCell<Notifier>,
}

impl Object {
    /// Create an empty object of the given registered type.
    pub fn new(type_name: &str) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                type_name: type_name.into(),
                fields: RefCell::new(FastHashMap::default()),
                notifier: OnceCell::new(),
            }),
        }
    }

    /// An object of the built-in `Object` type, which has no accessors.
    pub fn plain() -> Self {
        Self::new("Object")
    }

    /// Store an initial field value without notifying. Builder style.
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.inner
            .fields
            .borrow_mut()
            .insert(name.into(), value.into());
        self
    }

    /// The registered type name.
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Whether `name` is an observable property of this object's type.
    pub fn is_observable(&self, name: &str) -> bool {
        accessor::accessor(&self.inner.type_name, name).is_some()
    }

    /// Read a property, recording the read against the active observer when
    /// the property is observable.
    pub fn get(&self, name: &str) -> Value {
        if let Some(watcher) = current_watcher() {
            if self.is_observable(name) {
                watcher.watch(PropertySource::Object(self.clone()), name);
            }
        }
        self.peek(name)
    }

    /// Read a property without tracking.
    pub fn peek(&self, name: &str) -> Value {
        self.inner
            .fields
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Write a property.
    ///
    /// For observable properties an identical value is ignored entirely.
    /// Otherwise the value is stored, the accessor's change callback runs, and
    /// subscribers of the property are notified, in that order.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let Some(accessor) = accessor::accessor(&self.inner.type_name, name) else {
            self.inner.fields.borrow_mut().insert(name.into(), value);
            return;
        };
        let key: Rc<str> = name.into();
        let old = {
            let mut fields = self.inner.fields.borrow_mut();
            let old = fields.get(name).cloned().unwrap_or_default();
            if old.strict_eq(&value) {
                return;
            }
            fields.insert(key.clone(), value.clone());
            old
        };
        if let Some(changed) = accessor.changed() {
            changed(self, &old, &value);
        }
        if let Some(notifier) = self.inner.notifier.get() {
            notifier.notify(&ChangeArgs::Property(key));
        }
    }

    /// The object's notifier, created on first use.
    pub fn notifier(&self) -> Notifier {
        self.inner.notifier.get_or_init(Notifier::new).clone()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.inner.fields.borrow();
        let mut names: Vec<&str> = fields.keys().map(|k| &**k).collect();
        names.sort_unstable();
        f.debug_struct("Object")
            .field("type", &self.type_name())
            .field("fields", &names)
            .finish()
    }
}

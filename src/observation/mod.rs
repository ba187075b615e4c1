//! Property-level change tracking.
//!
//! Observable state lives in [`Object`]s and [`ObservableArray`]s. Each has a
//! [`Notifier`] holding weak [`Subscriber`]s. A [`BindingObserver`] evaluates a
//! binding with itself installed as the thread's current watcher, so every
//! observable read made during evaluation subscribes it to that property.

mod accessor;
mod array;
mod binding_observer;
mod notifier;
mod object;
mod signal;
mod watcher;

pub use accessor::{Accessor, ChangedCallback, accessor, accessors, define_property, define_type};
pub use array::{
    ArrayObserver, ArrayObserverFactory, ObservableArray, Splice, SpliceObserver,
    array_observation_enabled, enable_array_observation, length_of, set_array_observer_factory,
};
pub use binding_observer::{BindingFn, BindingObserver};
pub use notifier::{ChangeArgs, Notifier, Subscriber};
pub use object::Object;
pub use signal::{send_signal, signal_notifier};
pub use watcher::{is_tracking, track, track_volatile, untracked};

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::value::Value;

/// Something a tracked read can be recorded against.
#[derive(Clone, Debug)]
pub enum PropertySource {
    /// An observable object.
    Object(Object),
    /// An observable array; its only observable property is `length`.
    Array(ObservableArray),
    /// An execution context; `index` and `length` are observable.
    Context(ExecutionContext),
}

impl PropertySource {
    /// The notifier for this source.
    pub fn notifier(&self) -> Result<Notifier> {
        match self {
            PropertySource::Object(object) => Ok(object.notifier()),
            PropertySource::Array(array) => array.notifier(),
            PropertySource::Context(context) => Ok(context.notifier()),
        }
    }

    /// Current value of `name`, untracked.
    pub fn peek(&self, name: &str) -> Value {
        match self {
            PropertySource::Object(object) => object.peek(name),
            PropertySource::Array(array) if name == "length" => array.len().into(),
            PropertySource::Array(_) => Value::Null,
            PropertySource::Context(context) => context.peek(name),
        }
    }

    /// Whether `value` is this very source.
    pub(crate) fn is(&self, value: &Value) -> bool {
        match (self, value) {
            (PropertySource::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (PropertySource::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<Object> for PropertySource {
    fn from(object: Object) -> Self {
        PropertySource::Object(object)
    }
}

impl From<ObservableArray> for PropertySource {
    fn from(array: ObservableArray) -> Self {
        PropertySource::Array(array)
    }
}

impl From<ExecutionContext> for PropertySource {
    fn from(context: ExecutionContext) -> Self {
        PropertySource::Context(context)
    }
}

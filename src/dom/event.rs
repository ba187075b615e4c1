use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::Node;
use crate::value::Value;

/// A dispatched DOM event.
#[derive(Clone)]
pub struct Event {
    inner: Rc<EventInner>,
}

struct EventInner {
    event_type: Rc<str>,
    detail: Value,
    bubbles: bool,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    target: RefCell<Option<Node>>,
}

impl Event {
    /// A non-bubbling event with no detail.
    pub fn new(event_type: &str) -> Self {
        Self::build(event_type, Value::Null, false)
    }

    /// A bubbling event carrying `detail`.
    pub fn custom(event_type: &str, detail: impl Into<Value>) -> Self {
        Self::build(event_type, detail.into(), true)
    }

    fn build(event_type: &str, detail: Value, bubbles: bool) -> Self {
        Self {
            inner: Rc::new(EventInner {
                event_type: event_type.into(),
                detail,
                bubbles,
                default_prevented: Cell::new(false),
                propagation_stopped: Cell::new(false),
                target: RefCell::new(None),
            }),
        }
    }

    /// The event type, e.g. `"click"`.
    pub fn event_type(&self) -> &str {
        &self.inner.event_type
    }

    /// The payload of a custom event.
    pub fn detail(&self) -> Value {
        self.inner.detail.clone()
    }

    /// Whether the event travels up through ancestors.
    pub fn bubbles(&self) -> bool {
        self.inner.bubbles
    }

    /// Cancel the event's default action.
    pub fn prevent_default(&self) {
        self.inner.default_prevented.set(true);
    }

    /// Whether [`prevent_default`](Self::prevent_default) was called.
    pub fn default_prevented(&self) -> bool {
        self.inner.default_prevented.get()
    }

    /// Stop bubbling after the current node.
    pub fn stop_propagation(&self) {
        self.inner.propagation_stopped.set(true);
    }

    pub(crate) fn propagation_stopped(&self) -> bool {
        self.inner.propagation_stopped.get()
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<Node> {
        self.inner.target.borrow().clone()
    }

    pub(crate) fn set_target(&self, target: &Node) {
        self.inner.target.borrow_mut().get_or_insert_with(|| target.clone());
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type())
            .field("default_prevented", &self.default_prevented())
            .finish()
    }
}

//! Execution contexts: the second argument of every binding.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::dom::Event;
use crate::observation::{ChangeArgs, Notifier, PropertySource, track};
use crate::value::Value;

thread_local! {
    static CURRENT_EVENT: RefCell<Option<Event>> = const { RefCell::new(None) };
}

/// Makes `event` visible through [`ExecutionContext::event`] until dropped.
pub(crate) struct EventGuard {
    previous: Option<Event>,
}

impl EventGuard {
    pub(crate) fn new(event: Event) -> Self {
        let previous = CURRENT_EVENT.with(|slot| slot.replace(Some(event)));
        Self { previous }
    }
}

impl Drop for EventGuard {
    fn drop(&mut self) {
        CURRENT_EVENT.with(|slot| *slot.borrow_mut() = self.previous.take());
    }
}

/// Ambient information for a binding: the parent source and context of a
/// nested view, the item's position inside a repeat, and the event being
/// handled.
///
/// Position reads are observable, so a binding on `index()` updates when a
/// repeat with positioning enabled moves its item.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    parent: Value,
    parent_context: Option<ExecutionContext>,
    index: Cell<usize>,
    length: Cell<usize>,
    notifier: OnceCell<Notifier>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// A root context: no parent, position zero of zero.
    pub fn new() -> Self {
        Self::build(Value::Null, None, 0, 0)
    }

    fn build(
        parent: Value,
        parent_context: Option<ExecutionContext>,
        index: usize,
        length: usize,
    ) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent,
                parent_context,
                index: Cell::new(index),
                length: Cell::new(length),
                notifier: OnceCell::new(),
            }),
        }
    }

    /// A context for views nested inside a view bound to `parent_source` with
    /// this context.
    pub fn create_child_context(&self, parent_source: &Value) -> Self {
        Self::build(parent_source.clone(), Some(self.clone()), 0, 0)
    }

    /// A context for item `index` of `length`, sharing this context's parent
    /// and parent context.
    pub fn create_item_context(&self, index: usize, length: usize) -> Self {
        Self::build(
            self.inner.parent.clone(),
            self.inner.parent_context.clone(),
            index,
            length,
        )
    }

    /// The source the enclosing view is bound to.
    pub fn parent(&self) -> Value {
        self.inner.parent.clone()
    }

    /// The enclosing view's context.
    pub fn parent_context(&self) -> Option<ExecutionContext> {
        self.inner.parent_context.clone()
    }

    /// The event currently being handled, if any.
    pub fn event(&self) -> Option<Event> {
        CURRENT_EVENT.with(|slot| slot.borrow().clone())
    }

    /// Position of the item, tracked.
    pub fn index(&self) -> usize {
        track(PropertySource::Context(self.clone()), "index");
        self.inner.index.get()
    }

    /// Size of the collection, tracked.
    pub fn length(&self) -> usize {
        track(PropertySource::Context(self.clone()), "length");
        self.inner.length.get()
    }

    /// Whether the item is first.
    pub fn is_first(&self) -> bool {
        self.index() == 0
    }

    /// Whether the item is last.
    pub fn is_last(&self) -> bool {
        let index = self.index();
        index + 1 == self.length()
    }

    /// Whether the item is neither first nor last.
    pub fn is_in_middle(&self) -> bool {
        let index = self.index();
        index > 0 && index + 1 < self.length()
    }

    /// Whether the index is even.
    pub fn is_even(&self) -> bool {
        self.index() % 2 == 0
    }

    /// Whether the index is odd.
    pub fn is_odd(&self) -> bool {
        self.index() % 2 == 1
    }

    /// Move the item, notifying position observers of whatever changed.
    pub fn update_position(&self, index: usize, length: usize) {
        let index_changed = self.inner.index.replace(index) != index;
        let length_changed = self.inner.length.replace(length) != length;
        let Some(notifier) = self.inner.notifier.get() else {
            return;
        };
        if index_changed {
            notifier.notify(&ChangeArgs::Property("index".into()));
        }
        if length_changed {
            notifier.notify(&ChangeArgs::Property("length".into()));
        }
    }

    /// The notifier for position changes.
    pub fn notifier(&self) -> Notifier {
        self.inner.notifier.get_or_init(Notifier::new).clone()
    }

    pub(crate) fn peek(&self, name: &str) -> Value {
        match name {
            "index" => self.inner.index.get().into(),
            "length" => self.inner.length.get().into(),
            _ => Value::Null,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ExecutionContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("parent", &self.inner.parent)
            .field("index", &self.inner.index.get())
            .field("length", &self.inner.length.get())
            .field("has_parent_context", &self.inner.parent_context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{BindingFn, BindingObserver, Object};
    use crate::updates;

    #[test]
    fn item_contexts_share_the_parent() {
        let root = ExecutionContext::new();
        let source = Value::from(Object::plain());
        let child = root.create_child_context(&source);
        let item = child.create_item_context(1, 3);
        assert_eq!(item.parent(), source);
        assert!(item.parent_context().is_some_and(|c| c.ptr_eq(&root)));
        assert!(item.is_in_middle());
        assert!(item.is_odd());
        assert!(!item.is_first() && !item.is_last());
    }

    #[test]
    fn position_is_observable() {
        let item = ExecutionContext::new().create_item_context(0, 2);
        let binding: BindingFn = Rc::new(|_, c| Ok(c.is_last().into()));
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let observer = BindingObserver::new(binding, false, move || {
            counter.set(counter.get() + 1);
            Ok(())
        });
        assert_eq!(observer.observe(&Value::Null, &item).unwrap(), Value::from(false));

        item.update_position(0, 2);
        updates::process();
        assert_eq!(calls.get(), 0);

        item.update_position(1, 2);
        updates::process();
        assert_eq!(calls.get(), 1);
        assert_eq!(observer.observe(&Value::Null, &item).unwrap(), Value::from(true));
    }

    #[test]
    fn event_is_scoped_to_the_guard() {
        let context = ExecutionContext::new();
        assert!(context.event().is_none());
        {
            let _guard = EventGuard::new(Event::new("click"));
            assert_eq!(context.event().map(|e| e.event_type().to_owned()), Some("click".to_owned()));
        }
        assert!(context.event().is_none());
    }
}

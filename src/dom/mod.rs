//! The DOM seam.
//!
//! Views are built on the in-memory [`Node`] tree, and every mutation a
//! behavior makes goes through the thread's [`Host`]. The default
//! [`MemoryHost`] applies mutations directly to the tree. Embedders install
//! their own host to mirror or intercept them.

mod event;
mod node;

use std::cell::RefCell;
use std::rc::Rc;

pub use event::Event;
pub use node::{EventHandler, ListenerId, Node, NodeKind, is_void_element};

use crate::value::Value;

/// Applies DOM mutations on behalf of views and behaviors.
///
/// Every method has a default that mutates the in-memory tree, so a host only
/// overrides what it needs to observe.
pub trait Host {
    /// Insert `child` into `parent` before `reference` (or at the end).
    fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) {
        parent.insert_before(child, reference);
    }

    /// Detach `node` from its parent.
    fn remove(&self, node: &Node) {
        node.remove();
    }

    /// Replace the character data of a text node.
    fn set_text(&self, node: &Node, text: &str) {
        node.set_data(text);
    }

    /// Set an attribute, or remove it when `value` is `None`.
    fn set_attribute(&self, node: &Node, name: &str, value: Option<&str>) {
        match value {
            Some(value) => node.set_attribute(name, value),
            None => node.remove_attribute(name),
        }
    }

    /// Add or remove a boolean attribute.
    fn set_boolean_attribute(&self, node: &Node, name: &str, present: bool) {
        self.set_attribute(node, name, present.then_some(""));
    }

    /// Set a property.
    fn set_property(&self, node: &Node, name: &str, value: Value) {
        node.set_property(name, value);
    }

    /// Register an event listener.
    fn add_event_listener(
        &self,
        node: &Node,
        event_type: &str,
        handler: EventHandler,
        once: bool,
    ) -> ListenerId {
        node.add_event_listener(event_type, handler, once)
    }

    /// Remove an event listener.
    fn remove_event_listener(&self, node: &Node, id: ListenerId) {
        node.remove_event_listener(id);
    }

    /// Copy a template fragment for a new view.
    fn clone_fragment(&self, fragment: &Node) -> Node {
        fragment.deep_clone()
    }
}

/// The default host: mutates the in-memory tree and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryHost;

impl Host for MemoryHost {}

thread_local! {
    static HOST: RefCell<Rc<dyn Host>> = RefCell::new(Rc::new(MemoryHost));
}

/// Install the host used by this thread.
pub fn set_host(host: Rc<dyn Host>) {
    HOST.with(|slot| *slot.borrow_mut() = host);
}

/// The host used by this thread.
pub fn host() -> Rc<dyn Host> {
    HOST.with(|slot| slot.borrow().clone())
}

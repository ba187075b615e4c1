//! A small in-memory DOM.
//!
//! Enough of the node model for views to be instantiated, moved and inspected:
//! elements with attributes, properties and listeners, text, comments and
//! fragments. Inserting a fragment moves its children, as in the browser.

use std::cell::RefCell;
use std::fmt::{self, Write as _};
use std::rc::{Rc, Weak};

use slab::Slab;

use super::Event;
use crate::hash::{FastHashMap, FastIndexMap};
use crate::value::Value;

/// Handler invoked for a dispatched event.
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// What kind of node this is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with its tag name.
    Element(Rc<str>),
    /// A text node.
    Text,
    /// A comment node.
    Comment,
    /// A document fragment.
    Fragment,
}

/// Handle returned by [`Node::add_event_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

struct Listener {
    event_type: Rc<str>,
    handler: EventHandler,
    once: bool,
}

/// A shared handle to a node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

struct NodeInner {
    kind: NodeKind,
    data: RefCell<String>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    attributes: RefCell<FastIndexMap<Rc<str>, String>>,
    properties: RefCell<FastHashMap<Rc<str>, Value>>,
    listeners: RefCell<Slab<Listener>>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Whether `tag` never has children or a closing tag.
pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|void| void.eq_ignore_ascii_case(tag))
}

impl Node {
    fn with_kind(kind: NodeKind, data: &str) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                kind,
                data: RefCell::new(data.to_owned()),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                attributes: RefCell::new(FastIndexMap::default()),
                properties: RefCell::new(FastHashMap::default()),
                listeners: RefCell::new(Slab::new()),
            }),
        }
    }

    /// A new element.
    pub fn element(tag: &str) -> Self {
        Self::with_kind(NodeKind::Element(tag.to_ascii_lowercase().into()), "")
    }

    /// A new text node.
    pub fn text(data: &str) -> Self {
        Self::with_kind(NodeKind::Text, data)
    }

    /// A new comment node.
    pub fn comment(data: &str) -> Self {
        Self::with_kind(NodeKind::Comment, data)
    }

    /// A new, empty fragment.
    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment, "")
    }

    /// The node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// The tag name of an element.
    pub fn tag_name(&self) -> Option<&str> {
        match &self.inner.kind {
            NodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The parent node.
    pub fn parent(&self) -> Option<Node> {
        self.inner
            .parent
            .borrow()
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// A snapshot of the children.
    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// The child at `index`.
    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner.children.borrow().get(index).cloned()
    }

    /// The first child.
    pub fn first_child(&self) -> Option<Node> {
        self.child(0)
    }

    /// The last child.
    pub fn last_child(&self) -> Option<Node> {
        self.inner.children.borrow().last().cloned()
    }

    /// Position within the parent.
    pub fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        let children = parent.inner.children.borrow();
        children.iter().position(|child| child.ptr_eq(self))
    }

    /// The following sibling.
    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.index_in_parent()?;
        parent.child(index + 1)
    }

    /// The preceding sibling.
    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let index = self.index_in_parent()?;
        index.checked_sub(1).and_then(|i| parent.child(i))
    }

    /// Append `child`, moving it from its current parent. Appending a fragment
    /// moves the fragment's children instead.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of this node.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.ptr_eq(self) {
            return;
        }
        let moving = if child.inner.kind == NodeKind::Fragment {
            std::mem::take(&mut *child.inner.children.borrow_mut())
        } else {
            child.remove();
            vec![child.clone()]
        };
        for node in &moving {
            *node.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        }
        let mut children = self.inner.children.borrow_mut();
        let at = reference
            .and_then(|r| children.iter().position(|c| c.ptr_eq(r)))
            .unwrap_or(children.len());
        children.splice(at..at, moving);
    }

    /// Remove `child` if it is a child of this node.
    pub fn remove_child(&self, child: &Node) {
        let mut children = self.inner.children.borrow_mut();
        if let Some(index) = children.iter().position(|c| c.ptr_eq(child)) {
            let removed = children.remove(index);
            *removed.inner.parent.borrow_mut() = Weak::new();
        }
    }

    /// Detach this node from its parent.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    /// Copy this node and its subtree. Listeners are not copied.
    pub fn deep_clone(&self) -> Node {
        let copy = Node::with_kind(self.inner.kind.clone(), &self.inner.data.borrow());
        *copy.inner.attributes.borrow_mut() = self.inner.attributes.borrow().clone();
        *copy.inner.properties.borrow_mut() = self.inner.properties.borrow().clone();
        for child in self.inner.children.borrow().iter() {
            copy.append_child(&child.deep_clone());
        }
        copy
    }

    /// Character data of a text or comment node.
    pub fn data(&self) -> String {
        self.inner.data.borrow().clone()
    }

    /// Replace the character data of a text or comment node.
    pub fn set_data(&self, data: &str) {
        let mut current = self.inner.data.borrow_mut();
        current.clear();
        current.push_str(data);
    }

    /// Concatenated text of this node and its descendants, comments excluded.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self.inner.kind {
            NodeKind::Text => out.push_str(&self.inner.data.borrow()),
            NodeKind::Comment => {}
            NodeKind::Element(_) | NodeKind::Fragment => {
                for child in self.inner.children.borrow().iter() {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Set text: character data for text and comments, otherwise replaces
    /// all children with one text node.
    pub fn set_text_content(&self, text: &str) {
        match self.inner.kind {
            NodeKind::Text | NodeKind::Comment => self.set_data(text),
            NodeKind::Element(_) | NodeKind::Fragment => {
                for child in self.children() {
                    self.remove_child(&child);
                }
                if !text.is_empty() {
                    self.append_child(&Node::text(text));
                }
            }
        }
    }

    /// An attribute value.
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        self.inner.attributes.borrow().get(name).cloned()
    }

    /// Whether an attribute is present.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.attributes.borrow().contains_key(name)
    }

    /// Set an attribute.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.inner
            .attributes
            .borrow_mut()
            .insert(name.into(), value.to_owned());
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.inner.attributes.borrow_mut().shift_remove(name);
    }

    /// Attribute names in insertion order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.inner
            .attributes
            .borrow()
            .keys()
            .map(|k| k.to_string())
            .collect()
    }

    /// A property value; [`Value::Null`] when unset.
    pub fn get_property(&self, name: &str) -> Value {
        self.inner
            .properties
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Set a property.
    pub fn set_property(&self, name: &str, value: Value) {
        self.inner.properties.borrow_mut().insert(name.into(), value);
    }

    /// Register a listener. A `once` listener is removed before its first call.
    pub fn add_event_listener(&self, event_type: &str, handler: EventHandler, once: bool) -> ListenerId {
        ListenerId(self.inner.listeners.borrow_mut().insert(Listener {
            event_type: event_type.into(),
            handler,
            once,
        }))
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn remove_event_listener(&self, id: ListenerId) {
        let mut listeners = self.inner.listeners.borrow_mut();
        if listeners.contains(id.0) {
            listeners.remove(id.0);
        }
    }

    /// Number of listeners for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(_, l)| &*l.event_type == event_type)
            .count()
    }

    /// Dispatch `event` here, then to ancestors if it bubbles. Returns `false`
    /// when a handler prevented the default action.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        event.set_target(self);
        let mut current = Some(self.clone());
        while let Some(node) = current {
            node.invoke_listeners(event);
            if !event.bubbles() || event.propagation_stopped() {
                break;
            }
            current = node.parent();
        }
        !event.default_prevented()
    }

    fn invoke_listeners(&self, event: &Event) {
        let handlers: Vec<EventHandler> = {
            let mut listeners = self.inner.listeners.borrow_mut();
            let matching: Vec<usize> = listeners
                .iter()
                .filter(|(_, l)| *l.event_type == *event.event_type())
                .map(|(key, _)| key)
                .collect();
            matching
                .into_iter()
                .map(|key| {
                    if listeners[key].once {
                        listeners.remove(key).handler
                    } else {
                        listeners[key].handler.clone()
                    }
                })
                .collect()
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Serialize the subtree as HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.inner.kind {
            NodeKind::Text => out.push_str(&escape(&self.inner.data.borrow(), false)),
            NodeKind::Comment => {
                let _ = write!(out, "<!--{}-->", self.inner.data.borrow());
            }
            NodeKind::Fragment => {
                for child in self.inner.children.borrow().iter() {
                    child.write_html(out);
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.inner.attributes.borrow().iter() {
                    if value.is_empty() {
                        let _ = write!(out, " {name}");
                    } else {
                        let _ = write!(out, " {name}=\"{}\"", escape(value, true));
                    }
                }
                out.push('>');
                if is_void_element(tag) {
                    return;
                }
                for child in self.inner.children.borrow().iter() {
                    child.write_html(out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_html())
    }
}

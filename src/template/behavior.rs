//! The directive and behavior traits every template part implements.

use std::fmt;
use std::rc::Rc;

use crate::context::ExecutionContext;
use crate::dom::Node;
use crate::error::Result;
use crate::value::Value;

/// Per-view state attached to one node, connecting it to a source while bound.
pub trait Behavior {
    /// Connect to `source`. Binding an already bound behavior rebinds it.
    fn bind(&self, source: &Value, context: &ExecutionContext) -> Result<()>;

    /// Disconnect. Must be safe to call when not bound.
    fn unbind(&self);
}

/// A compiled template part that creates a [`Behavior`] for each view.
pub trait HtmlDirective {
    /// Create the behavior for `target`, the node this directive points at in
    /// a freshly cloned fragment.
    fn create_behavior(&self, target: &Node) -> Result<Rc<dyn Behavior>>;

    /// The node that marks this directive's position in content.
    fn create_placeholder(&self) -> Node {
        Node::comment("")
    }
}

/// Which part of a node a binding writes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Aspect {
    /// Text content, or a composed view when the value is a template.
    Content,
    /// A string attribute. Null removes it.
    Attribute(Rc<str>),
    /// An attribute present exactly when the value is truthy. Written `?name`.
    BooleanAttribute(Rc<str>),
    /// A node property. Written `:name`.
    Property(Rc<str>),
    /// An event listener. Written `@name`.
    Event(Rc<str>),
}

impl Aspect {
    /// Interpret an attribute name with its aspect prefix.
    pub fn from_attribute(name: &str) -> Self {
        if let Some(rest) = name.strip_prefix('?') {
            Aspect::BooleanAttribute(rest.into())
        } else if let Some(rest) = name.strip_prefix(':') {
            Aspect::Property(rest.into())
        } else if let Some(rest) = name.strip_prefix('@') {
            Aspect::Event(rest.into())
        } else {
            Aspect::Attribute(name.into())
        }
    }

    /// The target name without prefix; `None` for content.
    pub fn name(&self) -> Option<&str> {
        match self {
            Aspect::Content => None,
            Aspect::Attribute(name)
            | Aspect::BooleanAttribute(name)
            | Aspect::Property(name)
            | Aspect::Event(name) => Some(name),
        }
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aspect::Content => f.write_str("content"),
            Aspect::Attribute(name) => f.write_str(name),
            Aspect::BooleanAttribute(name) => write!(f, "?{name}"),
            Aspect::Property(name) => write!(f, ":{name}"),
            Aspect::Event(name) => write!(f, "@{name}"),
        }
    }
}

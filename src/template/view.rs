//! Views: one instantiation of a template.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::behavior::Behavior;
use super::ViewTemplate;
use crate::context::ExecutionContext;
use crate::dom::{self, Node};
use crate::error::Result;
use crate::value::Value;

/// A cloned template fragment plus the behaviors attached to its nodes.
///
/// A view owns the contiguous run of sibling nodes from its first to its last
/// node. While detached those nodes live in the view's own fragment.
#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

struct ViewInner {
    fragment: Node,
    first: Node,
    last: Node,
    behaviors: Vec<Rc<dyn Behavior>>,
    template: ViewTemplate,
    source: RefCell<Option<Value>>,
    context: RefCell<Option<ExecutionContext>>,
}

impl View {
    pub(crate) fn new(
        fragment: Node,
        behaviors: Vec<Rc<dyn Behavior>>,
        template: ViewTemplate,
    ) -> Self {
        let (first, last) = match (fragment.first_child(), fragment.last_child()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                let marker = Node::text("");
                fragment.append_child(&marker);
                (marker.clone(), marker)
            }
        };
        Self {
            inner: Rc::new(ViewInner {
                fragment,
                first,
                last,
                behaviors,
                template,
                source: RefCell::new(None),
                context: RefCell::new(None),
            }),
        }
    }

    /// Bind every behavior to `source`. Binding to the source the view is
    /// already bound to does nothing; binding to another one rebinds.
    pub fn bind(&self, source: &Value, context: &ExecutionContext) -> Result<()> {
        let current = self.inner.source.borrow().clone();
        if let Some(current) = current {
            if current.strict_eq(source) {
                cov_mark::hit!(view_bound_to_same_source);
                return Ok(());
            }
            for behavior in &self.inner.behaviors {
                behavior.unbind();
            }
        }
        *self.inner.source.borrow_mut() = Some(source.clone());
        *self.inner.context.borrow_mut() = Some(context.clone());
        for behavior in &self.inner.behaviors {
            behavior.bind(source, context)?;
        }
        Ok(())
    }

    /// Unbind every behavior. Does nothing when not bound.
    pub fn unbind(&self) {
        if self.inner.source.borrow_mut().take().is_none() {
            return;
        }
        self.inner.context.borrow_mut().take();
        for behavior in &self.inner.behaviors {
            behavior.unbind();
        }
    }

    /// Whether the view is bound.
    pub fn is_bound(&self) -> bool {
        self.inner.source.borrow().is_some()
    }

    /// The bound source.
    pub fn source(&self) -> Option<Value> {
        self.inner.source.borrow().clone()
    }

    /// The bound context.
    pub fn context(&self) -> Option<ExecutionContext> {
        self.inner.context.borrow().clone()
    }

    /// The template this view was created from.
    pub fn template(&self) -> &ViewTemplate {
        &self.inner.template
    }

    /// The first node of the view.
    pub fn first_child(&self) -> Node {
        self.inner.first.clone()
    }

    /// The last node of the view.
    pub fn last_child(&self) -> Node {
        self.inner.last.clone()
    }

    /// The view's nodes, first to last.
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut current = Some(self.inner.first.clone());
        while let Some(node) = current {
            let is_last = node.ptr_eq(&self.inner.last);
            current = if is_last { None } else { node.next_sibling() };
            nodes.push(node);
        }
        nodes
    }

    fn is_detached(&self) -> bool {
        self.inner
            .first
            .parent()
            .is_some_and(|parent| parent.ptr_eq(&self.inner.fragment))
    }

    /// Append the view's nodes to `parent`.
    pub fn append_to(&self, parent: &Node) {
        self.insert_into(parent, None);
    }

    /// Insert the view's nodes before `reference`, which must have a parent.
    pub fn insert_before(&self, reference: &Node) {
        match reference.parent() {
            Some(parent) => self.insert_into(&parent, Some(reference)),
            None => tracing::warn!("cannot insert a view before a detached node"),
        }
    }

    fn insert_into(&self, parent: &Node, reference: Option<&Node>) {
        let host = dom::host();
        if self.is_detached() {
            host.insert_before(parent, &self.inner.fragment, reference);
            return;
        }
        if let Some(reference) = reference {
            if reference
                .previous_sibling()
                .is_some_and(|previous| previous.ptr_eq(&self.inner.last))
            {
                return;
            }
        }
        for node in self.nodes() {
            host.insert_before(parent, &node, reference);
        }
    }

    /// Take the view's nodes out of the document, back into its fragment.
    pub fn remove(&self) {
        if self.is_detached() {
            return;
        }
        let host = dom::host();
        for node in self.nodes() {
            host.insert_before(&self.inner.fragment, &node, None);
        }
    }

    /// Remove the view's nodes for good and unbind it.
    pub fn dispose(&self) {
        let host = dom::host();
        for node in self.nodes() {
            host.remove(&node);
        }
        self.unbind();
    }

    /// Text content of the view's nodes.
    pub fn text_content(&self) -> String {
        self.nodes().iter().map(Node::text_content).collect()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let html: String = self.nodes().iter().map(Node::to_html).collect();
        f.debug_struct("View")
            .field("html", &html)
            .field("bound", &self.is_bound())
            .finish()
    }
}

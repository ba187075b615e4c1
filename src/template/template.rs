//! Compiled templates and directive targeting.

use std::fmt;
use std::rc::Rc;

use super::behavior::{Behavior, HtmlDirective};
use super::view::View;
use crate::context::ExecutionContext;
use crate::dom::{self, Node, NodeKind};
use crate::error::{Error, Result};
use crate::value::Value;

/// Location of a node inside a template fragment: child indices from the root.
///
/// Displayed as `r.0.2`, the third child of the first child of the root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TargetPath(Vec<usize>);

impl TargetPath {
    /// A path from explicit child indices.
    pub fn new(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// The path from `root` down to `node`, if `node` is inside `root`.
    pub fn of(node: &Node, root: &Node) -> Option<Self> {
        let mut indices = Vec::new();
        let mut current = node.clone();
        while !current.ptr_eq(root) {
            indices.push(current.index_in_parent()?);
            current = current.parent()?;
        }
        indices.reverse();
        Some(Self(indices))
    }

    /// Parse the `r.0.2` form.
    pub fn parse(id: &str) -> Result<Self> {
        let mut parts = id.split('.');
        if parts.next() != Some("r") {
            return Err(Error::UnresolvedTarget(id.to_owned()));
        }
        parts
            .map(|part| part.parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| Error::UnresolvedTarget(id.to_owned()))
    }

    /// Follow the path in `root`.
    pub fn resolve(&self, root: &Node) -> Option<Node> {
        self.0
            .iter()
            .try_fold(root.clone(), |node, &index| node.child(index))
    }

    /// The child indices.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("r")?;
        for index in &self.0 {
            write!(f, ".{index}")?;
        }
        Ok(())
    }
}

/// A directive and the node it applies to.
#[derive(Clone)]
pub struct DirectiveDescriptor {
    /// Where the directive's node is.
    pub target: TargetPath,
    /// The directive.
    pub directive: Rc<dyn HtmlDirective>,
}

impl DirectiveDescriptor {
    /// Pair a directive with its target.
    pub fn new(target: TargetPath, directive: impl HtmlDirective + 'static) -> Self {
        Self {
            target,
            directive: Rc::new(directive),
        }
    }
}

/// A compiled template: a prototype fragment and its directives.
///
/// Templates are immutable and cheap to clone; clones share identity, which is
/// what content bindings compare to decide whether a composed view can be
/// reused.
#[derive(Clone)]
pub struct ViewTemplate {
    inner: Rc<TemplateInner>,
}

struct TemplateInner {
    fragment: Node,
    directives: Vec<DirectiveDescriptor>,
}

impl ViewTemplate {
    /// Assemble a template from a fragment and directives targeting it.
    ///
    /// When a directive targets the fragment's first node and that node is a
    /// content placeholder (text or comment), an empty comment is put in front
    /// of it so that content inserted before the placeholder stays inside the
    /// view's node range. Elements are never anchored.
    pub fn from_parts(fragment: Node, mut directives: Vec<DirectiveDescriptor>) -> Self {
        let first_is_placeholder = fragment
            .first_child()
            .is_some_and(|first| matches!(first.kind(), NodeKind::Text | NodeKind::Comment));
        let first_is_target = directives.iter().any(|d| d.target.indices() == [0]);
        if first_is_placeholder && first_is_target {
            let anchor = Node::comment("");
            fragment.insert_before(&anchor, fragment.first_child().as_ref());
            for descriptor in &mut directives {
                if let Some(first) = descriptor.target.0.first_mut() {
                    *first += 1;
                }
            }
        }
        Self {
            inner: Rc::new(TemplateInner {
                fragment,
                directives,
            }),
        }
    }

    /// Instantiate: clone the fragment, resolve every target, and create one
    /// behavior per directive. The view is returned unbound.
    pub fn create(&self) -> Result<View> {
        let fragment = dom::host().clone_fragment(&self.inner.fragment);
        let targets = self
            .inner
            .directives
            .iter()
            .map(|d| {
                d.target
                    .resolve(&fragment)
                    .ok_or_else(|| Error::UnresolvedTarget(d.target.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let behaviors = self
            .inner
            .directives
            .iter()
            .zip(&targets)
            .map(|(d, target)| d.directive.create_behavior(target))
            .collect::<Result<Vec<Rc<dyn Behavior>>>>()?;
        Ok(View::new(fragment, behaviors, self.clone()))
    }

    /// Create a view, bind it to `source` with a fresh root context, and
    /// append it to `parent`.
    pub fn render(&self, source: &Value, parent: &Node) -> Result<View> {
        self.render_with(source, &ExecutionContext::new(), parent)
    }

    /// Like [`render`](Self::render) with an explicit context.
    pub fn render_with(
        &self,
        source: &Value,
        context: &ExecutionContext,
        parent: &Node,
    ) -> Result<View> {
        let view = self.create()?;
        view.bind(source, context)?;
        view.append_to(parent);
        Ok(view)
    }

    /// Number of directives.
    pub fn directive_count(&self) -> usize {
        self.inner.directives.len()
    }

    /// The prototype fragment's markup.
    pub fn to_html(&self) -> String {
        self.inner.fragment.to_html()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ViewTemplate) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ViewTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<String> = self
            .inner
            .directives
            .iter()
            .map(|d| d.target.to_string())
            .collect();
        f.debug_struct("ViewTemplate")
            .field("html", &self.to_html())
            .field("targets", &targets)
            .finish()
    }
}

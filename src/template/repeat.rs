//! The repeat directive: one child view per array item, kept in step with
//! array splices.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use super::behavior::{Behavior, HtmlDirective};
use super::binding::Binding;
use super::view::View;
use super::ViewTemplate;
use crate::context::ExecutionContext;
use crate::dom::Node;
use crate::error::{Error, Result};
use crate::observation::{
    BindingObserver, ChangeArgs, Notifier, ObservableArray, Splice, Subscriber,
};
use crate::value::Value;

/// Options for [`repeat`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatOptions {
    /// Keep every item context's index and length current as items move.
    pub positioning: bool,
    /// Rebind removed views to newly added items instead of creating new ones.
    pub recycle: bool,
}

impl Default for RepeatOptions {
    fn default() -> Self {
        Self {
            positioning: false,
            recycle: true,
        }
    }
}

/// Renders a template once per item of an observable array.
#[derive(Clone, Debug)]
pub struct RepeatDirective {
    items: Binding,
    template: Binding,
    options: RepeatOptions,
}

/// Repeat `template` for every item of the array `items` evaluates to.
pub fn repeat(items: Binding, template: ViewTemplate) -> RepeatDirective {
    let template = Value::Template(template);
    RepeatDirective::new(
        items,
        Binding::new(move |_, _| Ok(template.clone())).stable(),
    )
}

impl RepeatDirective {
    /// Repeat with a per-item template chosen by a binding on the parent source.
    pub fn new(items: Binding, template: Binding) -> Self {
        Self {
            items,
            template,
            options: RepeatOptions::default(),
        }
    }

    /// Enable or disable positioning.
    pub fn positioning(mut self, enabled: bool) -> Self {
        self.options.positioning = enabled;
        self
    }

    /// Enable or disable view recycling.
    pub fn recycle(mut self, enabled: bool) -> Self {
        self.options.recycle = enabled;
        self
    }

    /// Replace all options.
    pub fn options(mut self, options: RepeatOptions) -> Self {
        self.options = options;
        self
    }
}

impl HtmlDirective for RepeatDirective {
    fn create_behavior(&self, target: &Node) -> Result<Rc<dyn Behavior>> {
        Ok(RepeatBehavior::new(
            target.clone(),
            &self.items,
            &self.template,
            self.options,
        ))
    }
}

#[derive(Default)]
struct RepeatState {
    source: Option<Value>,
    context: Option<ExecutionContext>,
    child_context: Option<ExecutionContext>,
    items: Option<ObservableArray>,
    items_notifier: Option<Notifier>,
    template: Option<ViewTemplate>,
    views: Vec<View>,
}

pub(crate) struct RepeatBehavior {
    this: Weak<RepeatBehavior>,
    location: Node,
    options: RepeatOptions,
    items_observer: BindingObserver,
    template_observer: BindingObserver,
    state: RefCell<RepeatState>,
}

fn as_items(value: Value) -> Result<Option<ObservableArray>> {
    match value {
        Value::Array(array) => Ok(Some(array)),
        Value::Null => Ok(None),
        other => Err(Error::TypeMismatch {
            expected: "array",
            found: other.kind(),
        }),
    }
}

fn as_template(value: Value) -> Result<Option<ViewTemplate>> {
    match value {
        Value::Template(template) => Ok(Some(template)),
        Value::Null => Ok(None),
        other => Err(Error::TypeMismatch {
            expected: "template",
            found: other.kind(),
        }),
    }
}

impl RepeatBehavior {
    fn new(
        location: Node,
        items: &Binding,
        template: &Binding,
        options: RepeatOptions,
    ) -> Rc<dyn Behavior> {
        Rc::new_cyclic(|this: &Weak<RepeatBehavior>| {
            let on_items = this.clone();
            let items_observer = BindingObserver::new(items.evaluator(), items.is_volatile(), move || {
                on_items.upgrade().map_or(Ok(()), |repeat| repeat.items_changed())
            });
            let on_template = this.clone();
            let template_observer =
                BindingObserver::new(template.evaluator(), template.is_volatile(), move || {
                    on_template
                        .upgrade()
                        .map_or(Ok(()), |repeat| repeat.template_changed())
                });
            RepeatBehavior {
                this: this.clone(),
                location,
                options,
                items_observer,
                template_observer,
                state: RefCell::new(RepeatState::default()),
            }
        })
    }

    fn subscriber(&self) -> Weak<dyn Subscriber> {
        self.this.clone()
    }

    fn bound(&self) -> Option<(Value, ExecutionContext)> {
        let state = self.state.borrow();
        Some((state.source.clone()?, state.context.clone()?))
    }

    fn items_changed(&self) -> Result<()> {
        let Some((source, context)) = self.bound() else {
            return Ok(());
        };
        let items = as_items(self.items_observer.observe(&source, &context)?)?;
        self.state.borrow_mut().items = items;
        self.observe_items(false)?;
        self.refresh_all_views(false)
    }

    fn template_changed(&self) -> Result<()> {
        let Some((source, context)) = self.bound() else {
            return Ok(());
        };
        let template = as_template(self.template_observer.observe(&source, &context)?)?;
        self.state.borrow_mut().template = template;
        self.refresh_all_views(true)
    }

    /// Point the splice subscription at the current items array.
    fn observe_items(&self, force: bool) -> Result<()> {
        let items = self.state.borrow().items.clone();
        let notifier = match &items {
            Some(array) => Some(array.notifier()?),
            None => None,
        };
        let previous = self.state.borrow_mut().items_notifier.take();
        let changed = match (&previous, &notifier) {
            (Some(old), Some(new)) => !old.ptr_eq(new),
            (None, None) => false,
            _ => true,
        };
        if changed {
            if let Some(old) = &previous {
                old.unsubscribe(&self.subscriber(), None);
            }
        }
        if changed || force {
            if let Some(new) = &notifier {
                new.subscribe(self.subscriber(), None);
            }
        }
        self.state.borrow_mut().items_notifier = notifier;
        Ok(())
    }

    /// Publish the items array's pending splices to every other subscriber.
    /// A full refresh renders the array as it is now, so replaying those
    /// splices afterwards would duplicate or drop views.
    fn skip_pending_splices(&self) {
        let (items, notifier) = {
            let state = self.state.borrow();
            (state.items.clone(), state.items_notifier.clone())
        };
        if let (Some(array), Some(notifier)) = (items, notifier) {
            let subscriber = self.subscriber();
            notifier.unsubscribe(&subscriber, None);
            array.flush_splices();
            notifier.subscribe(subscriber, None);
        }
    }

    fn refresh_all_views(&self, template_changed: bool) -> Result<()> {
        let (items, template, child_context) = {
            let state = self.state.borrow();
            (state.items.clone(), state.template.clone(), state.child_context.clone())
        };
        let Some(child_context) = child_context else {
            return Ok(());
        };
        self.skip_pending_splices();
        let mut views = std::mem::take(&mut self.state.borrow_mut().views);
        let result = self.rebuild(&mut views, items, template, &child_context, template_changed);
        self.state.borrow_mut().views = views;
        result
    }

    fn rebuild(
        &self,
        views: &mut Vec<View>,
        items: Option<ObservableArray>,
        template: Option<ViewTemplate>,
        child_context: &ExecutionContext,
        template_changed: bool,
    ) -> Result<()> {
        let items = items.map(|array| array.to_vec()).unwrap_or_default();
        let Some(template) = template else {
            for view in views.drain(..) {
                view.dispose();
            }
            return Ok(());
        };
        // Views already showing the current template are left alone; without
        // recycling, an items refresh recreates every view.
        let recreate_all = !self.options.recycle && !template_changed;
        views.retain(|view| {
            let keep = !recreate_all && view.template().ptr_eq(&template);
            if !keep {
                view.dispose();
            }
            keep
        });

        let length = items.len();
        for (index, item) in items.iter().enumerate() {
            if let Some(view) = views.get(index) {
                match view.context() {
                    Some(context) if view.source().is_some_and(|s| s.strict_eq(item)) => {
                        context.update_position(index, length);
                    }
                    _ => {
                        let context = child_context.create_item_context(index, length);
                        view.unbind();
                        view.bind(item, &context)?;
                    }
                }
            } else {
                let context = child_context.create_item_context(index, length);
                let view = template.create()?;
                view.bind(item, &context)?;
                view.insert_before(&self.location);
                views.push(view);
            }
        }
        for view in views.drain(length.min(views.len())..) {
            view.dispose();
        }
        Ok(())
    }

    fn update_views(&self, splices: &[Splice]) -> Result<()> {
        let (template, child_context, length) = {
            let state = self.state.borrow();
            (
                state.template.clone(),
                state.child_context.clone(),
                state.items.as_ref().map_or(0, ObservableArray::len),
            )
        };
        let (Some(template), Some(child_context)) = (template, child_context) else {
            return Ok(());
        };
        let mut views = std::mem::take(&mut self.state.borrow_mut().views);
        let result = self.apply_splices(&mut views, splices, &template, &child_context, length);
        self.state.borrow_mut().views = views;
        result
    }

    fn apply_splices(
        &self,
        views: &mut Vec<View>,
        splices: &[Splice],
        template: &ViewTemplate,
        child_context: &ExecutionContext,
        length: usize,
    ) -> Result<()> {
        let mut removed: VecDeque<View> = VecDeque::new();
        let mut outcome = Ok(());
        'splices: for splice in splices {
            let start = splice.index.min(views.len());
            let end = (start + splice.removed.len()).min(views.len());
            for view in views.drain(start..end) {
                if self.options.recycle {
                    view.remove();
                    removed.push_back(view);
                } else {
                    view.dispose();
                }
            }
            for (offset, item) in splice.added.iter().enumerate() {
                let at = start + offset;
                let reference = views
                    .get(at)
                    .map_or_else(|| self.location.clone(), View::first_child);
                let view = match removed.pop_front() {
                    Some(view) => {
                        cov_mark::hit!(repeat_view_recycled);
                        view
                    }
                    None => match template.create() {
                        Ok(view) => view,
                        Err(err) => {
                            outcome = Err(err);
                            break 'splices;
                        }
                    },
                };
                let context = child_context.create_item_context(at, length);
                view.unbind();
                let bound = view.bind(item, &context);
                view.insert_before(&reference);
                views.insert(at, view);
                if let Err(err) = bound {
                    outcome = Err(err);
                    break 'splices;
                }
            }
        }
        for view in removed {
            view.dispose();
        }
        if self.options.positioning {
            let length = views.len();
            for (index, view) in views.iter().enumerate() {
                if let Some(context) = view.context() {
                    context.update_position(index, length);
                }
            }
        }
        outcome
    }
}

impl Subscriber for RepeatBehavior {
    fn handle_change(&self, args: &ChangeArgs) {
        let ChangeArgs::Splices(splices) = args else {
            return;
        };
        if let Err(err) = self.update_views(splices) {
            tracing::error!(%err, "repeat failed to apply splices");
        }
    }
}

impl Behavior for RepeatBehavior {
    fn bind(&self, source: &Value, context: &ExecutionContext) -> Result<()> {
        if self.state.borrow().source.is_some() {
            self.unbind();
        }
        {
            let mut state = self.state.borrow_mut();
            state.source = Some(source.clone());
            state.context = Some(context.clone());
            state.child_context = Some(context.create_child_context(source));
        }
        let items = as_items(self.items_observer.observe(source, context)?)?;
        let template = as_template(self.template_observer.observe(source, context)?)?;
        {
            let mut state = self.state.borrow_mut();
            state.items = items;
            state.template = template;
        }
        self.observe_items(true)?;
        self.refresh_all_views(false)
    }

    fn unbind(&self) {
        let (notifier, views) = {
            let mut state = self.state.borrow_mut();
            if state.source.take().is_none() {
                return;
            }
            state.context = None;
            state.child_context = None;
            state.items = None;
            (state.items_notifier.take(), state.views.clone())
        };
        if let Some(notifier) = notifier {
            notifier.unsubscribe(&self.subscriber(), None);
        }
        for view in views {
            view.unbind();
        }
        self.items_observer.dispose();
        self.template_observer.dispose();
    }
}

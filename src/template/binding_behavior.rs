//! Behaviors that apply a [`Binding`] to one aspect of one node.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::behavior::{Aspect, Behavior, HtmlDirective};
use super::binding::{Binding, BindingMode, TwoWayOptions};
use super::view::View;
use super::ViewTemplate;
use crate::context::{EventGuard, ExecutionContext};
use crate::dom::{self, Event, ListenerId, Node};
use crate::error::Result;
use crate::observation::{
    BindingObserver, ChangeArgs, Notifier, Subscriber, signal_notifier, untracked,
};
use crate::updates::{self, Updatable};
use crate::value::Value;

/// A binding aimed at one aspect of a node.
#[derive(Clone, Debug)]
pub struct BindingDirective {
    binding: Binding,
    aspect: Aspect,
}

impl BindingDirective {
    /// Direct `binding` at `aspect`.
    pub fn new(binding: Binding, aspect: Aspect) -> Self {
        Self { binding, aspect }
    }

    /// The binding.
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// The targeted aspect.
    pub fn aspect(&self) -> &Aspect {
        &self.aspect
    }
}

impl HtmlDirective for BindingDirective {
    fn create_behavior(&self, target: &Node) -> Result<Rc<dyn Behavior>> {
        Ok(match &self.aspect {
            Aspect::Event(event_type) => {
                EventBehavior::new(target.clone(), event_type.clone(), self.binding.clone())
            }
            aspect => BindingBehavior::new(target.clone(), aspect.clone(), self.binding.clone()),
        })
    }

    fn create_placeholder(&self) -> Node {
        Node::text("")
    }
}

struct Composed {
    view: View,
    template: ViewTemplate,
    is_composed: bool,
    needs_bind_only: bool,
}

struct Bound {
    source: Value,
    context: ExecutionContext,
}

/// Renders a binding's value into an attribute, property or content.
pub(crate) struct BindingBehavior {
    this: Weak<BindingBehavior>,
    target: Node,
    aspect: Aspect,
    binding: Binding,
    observer: RefCell<Option<BindingObserver>>,
    bound: RefCell<Option<Bound>>,
    composed: RefCell<Option<Composed>>,
    listener: Cell<Option<ListenerId>>,
    signal: RefCell<Option<Notifier>>,
    signal_needs_queue: Cell<bool>,
}

impl BindingBehavior {
    fn new(target: Node, aspect: Aspect, binding: Binding) -> Rc<dyn Behavior> {
        Rc::new_cyclic(|this: &Weak<BindingBehavior>| BindingBehavior {
            this: this.clone(),
            target,
            aspect,
            binding,
            observer: RefCell::new(None),
            bound: RefCell::new(None),
            composed: RefCell::new(None),
            listener: Cell::new(None),
            signal: RefCell::new(None),
            signal_needs_queue: Cell::new(true),
        })
    }

    fn bound(&self) -> Option<(Value, ExecutionContext)> {
        self.bound
            .borrow()
            .as_ref()
            .map(|b| (b.source.clone(), b.context.clone()))
    }

    fn observer(&self) -> BindingObserver {
        if let Some(observer) = self.observer.borrow().as_ref() {
            return observer.clone();
        }
        let this = self.this.clone();
        let observer = BindingObserver::new(
            self.binding.evaluator(),
            self.binding.is_volatile(),
            move || match this.upgrade() {
                Some(behavior) => behavior.refresh(),
                None => Ok(()),
            },
        );
        if self.binding.is_synchronous() {
            observer.set_mode(false);
        }
        *self.observer.borrow_mut() = Some(observer.clone());
        observer
    }

    fn refresh(&self) -> Result<()> {
        let Some((source, context)) = self.bound() else {
            return Ok(());
        };
        let value = self.observer().observe(&source, &context)?;
        self.apply(value, &source, &context)
    }

    fn apply(&self, value: Value, source: &Value, context: &ExecutionContext) -> Result<()> {
        let host = dom::host();
        match &self.aspect {
            Aspect::Content => return self.update_content(value, source, context),
            Aspect::Attribute(name) => {
                let text = (!value.is_null()).then(|| value.to_display_string());
                host.set_attribute(&self.target, name, text.as_deref());
            }
            Aspect::BooleanAttribute(name) => {
                host.set_boolean_attribute(&self.target, name, value.truthy());
            }
            Aspect::Property(name) => host.set_property(&self.target, name, value),
            Aspect::Event(_) => {}
        }
        Ok(())
    }

    fn update_content(&self, value: Value, source: &Value, context: &ExecutionContext) -> Result<()> {
        let host = dom::host();
        let Value::Template(template) = value else {
            if let Some(composed) = self.composed.borrow_mut().as_mut() {
                if composed.is_composed {
                    composed.is_composed = false;
                    composed.view.remove();
                    if composed.needs_bind_only {
                        composed.needs_bind_only = false;
                    } else {
                        composed.view.unbind();
                    }
                }
            }
            host.set_text(&self.target, &value.to_display_string());
            return Ok(());
        };

        host.set_text(&self.target, "");
        let mut slot = self.composed.borrow_mut().take();
        let reusable = slot
            .as_ref()
            .is_some_and(|composed| composed.template.ptr_eq(&template));
        if reusable {
            cov_mark::hit!(composed_view_reused);
        } else {
            if let Some(old) = slot.take() {
                if old.is_composed {
                    old.view.remove();
                    old.view.unbind();
                }
            }
            slot = Some(Composed {
                view: template.create()?,
                template,
                is_composed: false,
                needs_bind_only: false,
            });
        }

        let result = match slot.as_mut() {
            Some(composed) if !composed.is_composed => {
                composed.is_composed = true;
                composed.needs_bind_only = false;
                composed.view.insert_before(&self.target);
                composed.view.bind(source, context)
            }
            Some(composed) if composed.needs_bind_only => {
                composed.needs_bind_only = false;
                composed.view.bind(source, context)
            }
            _ => Ok(()),
        };
        *self.composed.borrow_mut() = slot;
        result
    }

    fn read_target(&self) -> Value {
        match &self.aspect {
            Aspect::Property(name) => self.target.get_property(name),
            Aspect::Attribute(name) => self.target.get_attribute(name).into(),
            Aspect::BooleanAttribute(name) => self.target.has_attribute(name).into(),
            Aspect::Content | Aspect::Event(_) => self.target.text_content().into(),
        }
    }

    fn listen_for_changes(&self, options: &TwoWayOptions) {
        let this = self.this.clone();
        let event_type = options.change_event.clone();
        let options = options.clone();
        let handler = Rc::new(move |_: &Event| {
            let Some(behavior) = this.upgrade() else {
                return;
            };
            let Some((source, context)) = behavior.bound() else {
                return;
            };
            let mut value = behavior.read_target();
            if let Some(convert) = &options.convert {
                value = convert(value);
            }
            if let Err(err) = (options.assign)(&source, value, &context) {
                tracing::error!(%err, aspect = %behavior.aspect, "two-way assignment failed");
            }
        });
        let id = dom::host().add_event_listener(&self.target, &event_type, handler, false);
        self.listener.set(Some(id));
    }
}

impl Behavior for BindingBehavior {
    fn bind(&self, source: &Value, context: &ExecutionContext) -> Result<()> {
        if self.bound.borrow().is_some() {
            self.unbind();
        }
        *self.bound.borrow_mut() = Some(Bound {
            source: source.clone(),
            context: context.clone(),
        });
        match self.binding.mode() {
            BindingMode::OneTime => {
                let value = untracked(|| self.binding.evaluate(source, context))?;
                self.apply(value, source, context)
            }
            BindingMode::OnChange => {
                let value = self.observer().observe(source, context)?;
                self.apply(value, source, context)
            }
            BindingMode::TwoWay(options) => {
                let value = self.observer().observe(source, context)?;
                self.apply(value, source, context)?;
                self.listen_for_changes(options);
                Ok(())
            }
            BindingMode::Signal(name) => {
                let value = untracked(|| self.binding.evaluate(source, context))?;
                self.apply(value, source, context)?;
                let notifier = signal_notifier(name);
                let subscriber: Weak<dyn Subscriber> = self.this.clone();
                notifier.subscribe(subscriber, Some(name));
                *self.signal.borrow_mut() = Some(notifier);
                Ok(())
            }
        }
    }

    fn unbind(&self) {
        if self.bound.borrow_mut().take().is_none() {
            return;
        }
        if let Some(observer) = self.observer.borrow().as_ref() {
            observer.dispose();
        }
        if let Some(id) = self.listener.take() {
            dom::host().remove_event_listener(&self.target, id);
        }
        if let (Some(notifier), BindingMode::Signal(name)) =
            (self.signal.borrow_mut().take(), self.binding.mode())
        {
            let subscriber: Weak<dyn Subscriber> = self.this.clone();
            notifier.unsubscribe(&subscriber, Some(name));
        }
        if let Some(composed) = self.composed.borrow_mut().as_mut() {
            if composed.is_composed {
                composed.view.unbind();
                composed.needs_bind_only = true;
            }
        }
    }
}

impl Subscriber for BindingBehavior {
    fn handle_change(&self, _args: &ChangeArgs) {
        if self.signal_needs_queue.replace(false) {
            if let Some(this) = self.this.upgrade() {
                updates::enqueue(this);
            }
        }
    }
}

impl Updatable for BindingBehavior {
    fn update(&self) -> Result<()> {
        self.signal_needs_queue.set(true);
        let Some((source, context)) = self.bound() else {
            return Ok(());
        };
        let value = untracked(|| self.binding.evaluate(&source, &context))?;
        self.apply(value, &source, &context)
    }
}

/// Invokes a binding as an event handler.
///
/// The event is visible through [`ExecutionContext::event`] while the handler
/// runs. Any result other than `true` prevents the event's default action.
pub(crate) struct EventBehavior {
    this: Weak<EventBehavior>,
    target: Node,
    event_type: Rc<str>,
    binding: Binding,
    bound: RefCell<Option<Bound>>,
    listener: Cell<Option<ListenerId>>,
}

impl EventBehavior {
    fn new(target: Node, event_type: Rc<str>, binding: Binding) -> Rc<dyn Behavior> {
        Rc::new_cyclic(|this: &Weak<EventBehavior>| EventBehavior {
            this: this.clone(),
            target,
            event_type,
            binding,
            bound: RefCell::new(None),
            listener: Cell::new(None),
        })
    }

    fn handle_event(&self, event: &Event) {
        let bound = self
            .bound
            .borrow()
            .as_ref()
            .map(|b| (b.source.clone(), b.context.clone()));
        let Some((source, context)) = bound else {
            return;
        };
        if matches!(self.binding.mode(), BindingMode::OneTime) {
            self.listener.set(None);
        }
        let _event = EventGuard::new(event.clone());
        match untracked(|| self.binding.evaluate(&source, &context)) {
            Ok(Value::Bool(true)) => {}
            Ok(_) => event.prevent_default(),
            Err(err) => {
                tracing::error!(%err, event = %self.event_type, "event handler failed");
            }
        }
    }
}

impl Behavior for EventBehavior {
    fn bind(&self, source: &Value, context: &ExecutionContext) -> Result<()> {
        if self.bound.borrow().is_some() {
            self.unbind();
        }
        *self.bound.borrow_mut() = Some(Bound {
            source: source.clone(),
            context: context.clone(),
        });
        let this = self.this.clone();
        let handler = Rc::new(move |event: &Event| {
            if let Some(behavior) = this.upgrade() {
                behavior.handle_event(event);
            }
        });
        let once = matches!(self.binding.mode(), BindingMode::OneTime);
        let id = dom::host().add_event_listener(&self.target, &self.event_type, handler, once);
        self.listener.set(Some(id));
        Ok(())
    }

    fn unbind(&self) {
        if self.bound.borrow_mut().take().is_none() {
            return;
        }
        if let Some(id) = self.listener.take() {
            dom::host().remove_event_listener(&self.target, id);
        }
    }
}

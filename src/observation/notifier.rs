//! Per-source subscriber registries.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::hash::FastIndexMap;
use crate::observation::Splice;

/// What changed, handed to every [`Subscriber`].
#[derive(Clone, Debug)]
pub enum ChangeArgs {
    /// A named property changed.
    Property(Rc<str>),
    /// An array was mutated; splices are in mutation order.
    Splices(Rc<[Splice]>),
    /// A named signal was sent.
    Signal(Rc<str>),
}

impl ChangeArgs {
    /// The key specific subscribers registered under, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ChangeArgs::Property(name) | ChangeArgs::Signal(name) => Some(name),
            ChangeArgs::Splices(_) => None,
        }
    }
}

/// Receives change notifications from a [`Notifier`].
pub trait Subscriber {
    /// Called synchronously from [`Notifier::notify`].
    fn handle_change(&self, args: &ChangeArgs);
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum SubscriptionKey {
    Any,
    Named(Rc<str>),
}

impl SubscriptionKey {
    fn from_name(name: Option<&str>) -> Self {
        name.map_or(SubscriptionKey::Any, |name| SubscriptionKey::Named(name.into()))
    }
}

/// Subscriber registry owned by one observable source.
///
/// Subscribers are held weakly: a notifier never keeps an observer alive, and
/// dropped subscribers are pruned the next time their key is notified.
#[derive(Clone, Default)]
pub struct Notifier {
    inner: Rc<RefCell<FastIndexMap<SubscriptionKey, Vec<Weak<dyn Subscriber>>>>>,
}

fn same_subscriber(a: &Weak<dyn Subscriber>, b: &Weak<dyn Subscriber>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl Notifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one property, or to every change when `name` is `None`.
    ///
    /// Subscribing the same subscriber twice under the same key is a no-op.
    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>, name: Option<&str>) {
        let mut map = self.inner.borrow_mut();
        let list = map.entry(SubscriptionKey::from_name(name)).or_default();
        if !list.iter().any(|s| same_subscriber(s, &subscriber)) {
            tracing::trace!(key = name.unwrap_or("*"), "subscribed");
            list.push(subscriber);
        }
    }

    /// Remove a subscription made with the same key.
    pub fn unsubscribe(&self, subscriber: &Weak<dyn Subscriber>, name: Option<&str>) {
        let mut map = self.inner.borrow_mut();
        if let Some(list) = map.get_mut(&SubscriptionKey::from_name(name)) {
            list.retain(|s| !same_subscriber(s, subscriber));
        }
    }

    /// Deliver `args` to the subscribers of its key, then to wildcard subscribers.
    ///
    /// The subscriber list is snapshotted first, so handlers may freely
    /// subscribe or unsubscribe while being notified.
    pub fn notify(&self, args: &ChangeArgs) {
        let targets: Vec<Rc<dyn Subscriber>> = {
            let mut map = self.inner.borrow_mut();
            let mut targets = Vec::new();
            let named = args.key().map(|key| SubscriptionKey::Named(key.into()));
            let any = SubscriptionKey::Any;
            for key in named.iter().chain(std::iter::once(&any)) {
                if let Some(list) = map.get_mut(key) {
                    list.retain(|s| s.strong_count() > 0);
                    targets.extend(list.iter().filter_map(Weak::upgrade));
                }
            }
            targets
        };
        for subscriber in targets {
            subscriber.handle_change(args);
        }
    }

    /// Live subscribers registered under `name` (`None` for wildcard).
    pub fn subscriber_count(&self, name: Option<&str>) -> usize {
        self.inner
            .borrow()
            .get(&SubscriptionKey::from_name(name))
            .map_or(0, |list| list.iter().filter(|s| s.strong_count() > 0).count())
    }

    /// Whether two handles refer to the same registry.
    pub fn ptr_eq(&self, other: &Notifier) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

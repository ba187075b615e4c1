//! Named signals: notifications not tied to any property.

use std::cell::RefCell;
use std::rc::Rc;

use super::notifier::{ChangeArgs, Notifier};
use crate::hash::FastHashMap;

thread_local! {
    static SIGNALS: RefCell<FastHashMap<Rc<str>, Notifier>> = RefCell::new(FastHashMap::default());
}

/// The notifier for signal `name`, created on first use.
pub fn signal_notifier(name: &str) -> Notifier {
    SIGNALS.with(|signals| {
        signals
            .borrow_mut()
            .entry(name.into())
            .or_default()
            .clone()
    })
}

/// Notify everything listening for signal `name`.
pub fn send_signal(name: &str) {
    let notifier = SIGNALS.with(|signals| signals.borrow().get(name).cloned());
    if let Some(notifier) = notifier {
        tracing::debug!(signal = name, "sending signal");
        notifier.notify(&ChangeArgs::Signal(name.into()));
    }
}

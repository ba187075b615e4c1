//! The thread-local "current watcher" slot that dependency tracking reads.

use std::cell::RefCell;
use std::rc::Rc;

use super::PropertySource;
use super::binding_observer::ObserverCore;

thread_local! {
    static CURRENT_WATCHER: RefCell<Option<Rc<ObserverCore>>> = const { RefCell::new(None) };
}

pub(crate) fn current_watcher() -> Option<Rc<ObserverCore>> {
    CURRENT_WATCHER.with(|c| c.borrow().clone())
}

fn set_current_watcher(watcher: Option<Rc<ObserverCore>>) -> Option<Rc<ObserverCore>> {
    CURRENT_WATCHER.with(|c| c.replace(watcher))
}

/// RAII guard that restores the previous watcher when dropped, even on panic.
pub(crate) struct WatcherGuard {
    previous: Option<Rc<ObserverCore>>,
}

impl WatcherGuard {
    pub(crate) fn new(watcher: Option<Rc<ObserverCore>>) -> Self {
        Self {
            previous: set_current_watcher(watcher),
        }
    }
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        set_current_watcher(self.previous.take());
    }
}

/// Record a read of `name` on `source` against the active observer.
///
/// Does nothing when no observer is evaluating.
pub fn track(source: impl Into<PropertySource>, name: &str) {
    if let Some(watcher) = current_watcher() {
        watcher.watch(source.into(), name);
    }
}

/// Mark the active observer's dependencies as data-dependent, forcing them to be
/// rediscovered on its next evaluation.
pub fn track_volatile() {
    if let Some(watcher) = current_watcher() {
        watcher.force_refresh();
    }
}

/// Whether an observer is currently recording reads.
pub fn is_tracking() -> bool {
    CURRENT_WATCHER.with(|c| c.borrow().is_some())
}

/// Run `f` without recording any of its reads.
///
/// ```ignore
/// let label = untracked(|| item.get("label"));
/// ```
pub fn untracked<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = WatcherGuard::new(None);
    f()
}

//! Observers that evaluate a binding and re-run a handler when its inputs change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::notifier::{ChangeArgs, Notifier, Subscriber};
use super::watcher::WatcherGuard;
use super::PropertySource;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::updates::{self, Updatable};
use crate::value::Value;

/// A binding expression: `(source, context) -> value`.
pub type BindingFn = Rc<dyn Fn(&Value, &ExecutionContext) -> Result<Value>>;

struct ObservationRecord {
    source: PropertySource,
    name: Rc<str>,
    notifier: Notifier,
}

/// Evaluates a binding while recording every observable read, subscribes to
/// each recorded dependency, and calls back when any of them changes.
///
/// In asynchronous mode (the default) bursts of changes coalesce into a
/// single queued callback. In synchronous mode every change calls back
/// immediately.
#[derive(Clone)]
pub struct BindingObserver {
    core: Rc<ObserverCore>,
}

pub(crate) struct ObserverCore {
    this: Weak<ObserverCore>,
    binding: BindingFn,
    is_volatile: bool,
    on_change: Box<dyn Fn() -> Result<()>>,
    records: RefCell<Vec<ObservationRecord>>,
    needs_refresh: Cell<bool>,
    needs_queue: Cell<bool>,
    is_async: Cell<bool>,
    deferred_error: RefCell<Option<Error>>,
}

impl BindingObserver {
    /// Create an observer for `binding`.
    ///
    /// A volatile observer rediscovers its dependencies on every evaluation.
    /// A stable one records them once and keeps them until disposed, unless a
    /// tracked read forces a refresh.
    pub fn new(
        binding: BindingFn,
        is_volatile: bool,
        on_change: impl Fn() -> Result<()> + 'static,
    ) -> Self {
        let core = Rc::new_cyclic(|this| ObserverCore {
            this: this.clone(),
            binding,
            is_volatile,
            on_change: Box::new(on_change),
            records: RefCell::new(Vec::new()),
            needs_refresh: Cell::new(true),
            needs_queue: Cell::new(true),
            is_async: Cell::new(true),
            deferred_error: RefCell::new(None),
        });
        Self { core }
    }

    /// Evaluate the binding against `source` and `context`, recording
    /// dependencies when they need (re)discovery.
    pub fn observe(&self, source: &Value, context: &ExecutionContext) -> Result<Value> {
        let core = &self.core;
        if core.needs_refresh.get() && !core.records.borrow().is_empty() {
            core.disconnect();
        }
        let watcher = core.needs_refresh.get().then(|| core.clone());
        core.needs_refresh.set(core.is_volatile);
        let result = {
            let _guard = WatcherGuard::new(watcher);
            (core.binding)(source, context)
        };
        if let Some(err) = core.deferred_error.borrow_mut().take() {
            return Err(err);
        }
        result
    }

    /// Switch between queued (`true`) and immediate (`false`) notification.
    pub fn set_mode(&self, is_async: bool) {
        self.core.is_async.set(is_async);
        self.core.needs_queue.set(is_async);
    }

    /// Whether change notifications are queued.
    pub fn is_async(&self) -> bool {
        self.core.is_async.get()
    }

    /// Unsubscribe from every dependency. Safe to call repeatedly; a queued
    /// callback for a disposed observer does nothing.
    pub fn dispose(&self) {
        self.core.disconnect();
        self.core.needs_refresh.set(true);
        self.core.needs_queue.set(self.core.is_async.get());
    }

    /// Names of the dependencies recorded by the last tracked evaluation.
    pub fn dependencies(&self) -> Vec<Rc<str>> {
        self.core
            .records
            .borrow()
            .iter()
            .map(|record| record.name.clone())
            .collect()
    }

    /// Whether the next evaluation will rediscover dependencies.
    pub fn needs_refresh(&self) -> bool {
        self.core.needs_refresh.get()
    }
}

impl fmt::Debug for BindingObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingObserver")
            .field("dependencies", &self.dependencies())
            .field("is_volatile", &self.core.is_volatile)
            .field("is_async", &self.core.is_async.get())
            .finish()
    }
}

impl ObserverCore {
    fn subscriber(&self) -> Weak<dyn Subscriber> {
        self.this.clone()
    }

    pub(crate) fn force_refresh(&self) {
        self.needs_refresh.set(true);
    }

    pub(crate) fn watch(&self, source: PropertySource, name: &str) {
        let notifier = match source.notifier() {
            Ok(notifier) => notifier,
            Err(err) => {
                self.deferred_error.borrow_mut().get_or_insert(err);
                return;
            }
        };
        notifier.subscribe(self.subscriber(), Some(name));

        let mut records = self.records.borrow_mut();
        if !self.needs_refresh.get() {
            if let Some(previous) = records.last() {
                // Reading through the value of the previous read means a chain
                // like `a.b.c`; when `a.b` is replaced the chain must be re-walked.
                let previous_value = previous.source.peek(&previous.name);
                if source.is(&previous_value) {
                    cov_mark::hit!(chained_read_forces_refresh);
                    tracing::trace!(name, "chained read, dependencies will be refreshed");
                    self.needs_refresh.set(true);
                }
            }
        }
        records.push(ObservationRecord {
            source,
            name: name.into(),
            notifier,
        });
    }

    fn disconnect(&self) {
        let records = std::mem::take(&mut *self.records.borrow_mut());
        let subscriber = self.subscriber();
        for record in records {
            record.notifier.unsubscribe(&subscriber, Some(&record.name));
        }
    }

    fn call(&self) -> Result<()> {
        if self.records.borrow().is_empty() {
            cov_mark::hit!(stale_observer_call_skipped);
            return Ok(());
        }
        self.needs_queue.set(self.is_async.get());
        (self.on_change)()
    }
}

impl Subscriber for ObserverCore {
    fn handle_change(&self, _args: &ChangeArgs) {
        if self.needs_queue.get() {
            self.needs_queue.set(false);
            if let Some(this) = self.this.upgrade() {
                updates::enqueue(this);
            }
        } else if !self.is_async.get() {
            if let Err(err) = self.call() {
                tracing::error!(%err, "synchronous binding update failed");
            }
        }
    }
}

impl Updatable for ObserverCore {
    fn update(&self) -> Result<()> {
        self.call()
    }
}

impl Drop for ObserverCore {
    fn drop(&mut self) {
        self.disconnect();
    }
}

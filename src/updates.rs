//! The update queue: deferred, deduplicated, FIFO execution of DOM updates.
//!
//! Observers do not touch the DOM when a dependency changes. They enqueue
//! themselves here, and everything queued is run together when the queue is
//! flushed. A task already in the queue is not queued twice, so a burst of
//! writes collapses into one update per observer.
//!
//! The queue is per thread. How a flush gets triggered depends on the
//! installed [`Scheduler`]:
//!
//! ```ignore
//! // Default: the embedder drives the queue.
//! item.set("name", "b");
//! updates::process();
//!
//! // Flush from a single-threaded futures executor.
//! let mut pool = LocalPool::new();
//! updates::configure()
//!     .scheduler(SpawnScheduler::new(pool.spawner()))
//!     .install();
//!
//! // Or apply every update immediately.
//! updates::configure().mode(UpdateMode::Sync).install();
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::error::{Error, Result};
use crate::hash::FastIndexMap;

/// A unit of deferred work.
pub trait Updatable {
    /// Run the update. Errors are logged and collected into the flush report.
    fn update(&self) -> Result<()>;
}

/// Whether queued work waits for a flush or runs immediately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
    /// Work is queued and run by the next flush.
    #[default]
    Async,
    /// Work runs as soon as it is queued.
    Sync,
}

/// Requests a future flush when the queue goes from empty to non-empty.
pub trait Scheduler {
    /// Arrange for [`process`] to be called soon.
    fn schedule(&self);
}

/// A scheduler that does nothing; the embedder calls [`process`] itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManualScheduler;

impl Scheduler for ManualScheduler {
    fn schedule(&self) {}
}

/// Flushes the queue from a task spawned on a single-threaded executor.
pub struct SpawnScheduler<S> {
    spawner: S,
}

impl<S: LocalSpawn> SpawnScheduler<S> {
    /// Wrap a local spawner, e.g. `LocalPool::spawner()`.
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }
}

impl<S: LocalSpawn> Scheduler for SpawnScheduler<S> {
    fn schedule(&self) {
        let flush = async {
            process();
        };
        if let Err(err) = self.spawner.spawn_local(flush) {
            tracing::error!(%err, "failed to spawn update flush");
        }
    }
}

/// Outcome of one or more flushes.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Number of tasks that ran.
    pub processed: usize,
    /// Errors returned by failing tasks, in execution order.
    pub errors: Vec<Error>,
}

impl FlushReport {
    /// Whether every task succeeded.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The number of tasks run, or [`Error::Flush`] if any failed.
    pub fn into_result(self) -> Result<usize> {
        if self.errors.is_empty() {
            Ok(self.processed)
        } else {
            Err(Error::Flush(self.errors))
        }
    }

    fn absorb(&mut self, other: FlushReport) {
        self.processed += other.processed;
        self.errors.extend(other.errors);
    }
}

struct UpdateQueue {
    tasks: FastIndexMap<usize, Rc<dyn Updatable>>,
    mode: UpdateMode,
    scheduler: Rc<dyn Scheduler>,
    flush_requested: bool,
    processing: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

impl UpdateQueue {
    fn new() -> Self {
        Self {
            tasks: FastIndexMap::default(),
            mode: UpdateMode::Async,
            scheduler: Rc::new(ManualScheduler),
            flush_requested: false,
            processing: false,
            waiters: Vec::new(),
        }
    }

    /// Returns the scheduler to invoke once the queue borrow is released.
    fn request_flush(&mut self) -> Option<Rc<dyn Scheduler>> {
        if self.mode == UpdateMode::Async && !self.flush_requested {
            self.flush_requested = true;
            Some(self.scheduler.clone())
        } else {
            None
        }
    }
}

thread_local! {
    static QUEUE: RefCell<UpdateQueue> = RefCell::new(UpdateQueue::new());
}

enum AfterEnqueue {
    Nothing,
    Schedule(Rc<dyn Scheduler>),
    RunNow,
}

/// Queue `task` for the next flush. Queuing a task that is already pending
/// does nothing.
pub fn enqueue(task: Rc<dyn Updatable>) {
    let key = Rc::as_ptr(&task).cast::<()>() as usize;
    let after = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.tasks.contains_key(&key) {
            cov_mark::hit!(duplicate_update_ignored);
            return AfterEnqueue::Nothing;
        }
        queue.tasks.insert(key, task);
        if queue.mode == UpdateMode::Sync {
            if queue.processing {
                AfterEnqueue::Nothing
            } else {
                AfterEnqueue::RunNow
            }
        } else {
            queue
                .request_flush()
                .map_or(AfterEnqueue::Nothing, AfterEnqueue::Schedule)
        }
    });
    match after {
        AfterEnqueue::Nothing => {}
        AfterEnqueue::Schedule(scheduler) => scheduler.schedule(),
        AfterEnqueue::RunNow => {
            let _ = settle();
        }
    }
}

struct ProcessingGuard {
    previous: bool,
}

impl ProcessingGuard {
    fn new() -> Self {
        let previous = QUEUE.with(|q| std::mem::replace(&mut q.borrow_mut().processing, true));
        Self { previous }
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        QUEUE.with(|q| q.borrow_mut().processing = self.previous);
    }
}

/// Run one flush: every task queued so far, in FIFO order.
///
/// Tasks queued while the flush runs are left for the next flush. Failing
/// tasks do not stop the flush; their errors are logged and reported.
pub fn process() -> FlushReport {
    let (batch, waiters) = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        queue.flush_requested = false;
        let batch: Vec<Rc<dyn Updatable>> = queue.tasks.drain(..).map(|(_, task)| task).collect();
        (batch, std::mem::take(&mut queue.waiters))
    });

    let mut report = FlushReport::default();
    if !batch.is_empty() {
        tracing::debug!(tasks = batch.len(), "flushing update queue");
        let _processing = ProcessingGuard::new();
        for task in batch {
            report.processed += 1;
            if let Err(err) = task.update() {
                tracing::error!(%err, "queued update failed");
                report.errors.push(err);
            }
        }
        tracing::debug!(
            processed = report.processed,
            failed = report.errors.len(),
            "update queue flushed"
        );
    }

    for waiter in waiters {
        let _ = waiter.send(());
    }

    let scheduler = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.tasks.is_empty() && queue.waiters.is_empty() {
            None
        } else {
            queue.request_flush()
        }
    });
    if let Some(scheduler) = scheduler {
        scheduler.schedule();
    }
    report
}

/// Flush repeatedly until nothing is left, including work queued by earlier
/// flushes.
pub fn settle() -> FlushReport {
    let mut total = process();
    while pending_count() > 0 {
        total.absorb(process());
    }
    total
}

/// A future that resolves once the next flush has completed.
pub fn next() -> impl Future<Output = ()> {
    let (sender, receiver) = oneshot::channel();
    let scheduler = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.mode == UpdateMode::Sync && !queue.processing {
            // Nothing is ever left pending in synchronous mode.
            let _ = sender.send(());
            None
        } else {
            queue.waiters.push(sender);
            queue.request_flush()
        }
    });
    if let Some(scheduler) = scheduler {
        scheduler.schedule();
    }
    async move {
        let _ = receiver.await;
    }
}

/// Number of tasks waiting for a flush.
pub fn pending_count() -> usize {
    QUEUE.with(|queue| queue.borrow().tasks.len())
}

/// Whether a flush has been requested from the scheduler and not yet run.
pub fn is_flush_requested() -> bool {
    QUEUE.with(|queue| queue.borrow().flush_requested)
}

/// The current mode.
pub fn mode() -> UpdateMode {
    QUEUE.with(|queue| queue.borrow().mode)
}

/// Switch modes. Switching to [`UpdateMode::Sync`] runs anything pending.
pub fn set_mode(mode: UpdateMode) {
    QUEUE.with(|queue| queue.borrow_mut().mode = mode);
    if mode == UpdateMode::Sync {
        let _ = settle();
    }
}

/// Start configuring this thread's update queue.
pub fn configure() -> UpdateConfig {
    UpdateConfig::new()
}

/// Builder for the update queue's mode and scheduler.
pub struct UpdateConfig {
    mode: UpdateMode,
    scheduler: Rc<dyn Scheduler>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateConfig {
    /// Defaults: asynchronous mode with a [`ManualScheduler`].
    pub fn new() -> Self {
        Self {
            mode: UpdateMode::Async,
            scheduler: Rc::new(ManualScheduler),
        }
    }

    /// Set the mode.
    pub fn mode(mut self, mode: UpdateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the scheduler used in asynchronous mode.
    pub fn scheduler(mut self, scheduler: impl Scheduler + 'static) -> Self {
        self.scheduler = Rc::new(scheduler);
        self
    }

    /// Apply the configuration to this thread's queue.
    pub fn install(self) {
        let scheduler = QUEUE.with(|queue| {
            let mut queue = queue.borrow_mut();
            queue.scheduler = self.scheduler;
            queue.flush_requested = false;
            if queue.tasks.is_empty() && queue.waiters.is_empty() {
                None
            } else {
                queue.request_flush()
            }
        });
        set_mode(self.mode);
        if let Some(scheduler) = scheduler {
            scheduler.schedule();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use std::cell::{Cell, RefCell};

    struct Task {
        name: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        fail: bool,
    }

    impl Updatable for Task {
        fn update(&self) -> Result<()> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                Err(Error::binding(self.name))
            } else {
                Ok(())
            }
        }
    }

    fn task(name: &'static str, log: &Rc<RefCell<Vec<&'static str>>>) -> Rc<Task> {
        Rc::new(Task {
            name,
            log: log.clone(),
            fail: false,
        })
    }

    #[test]
    fn runs_in_fifo_order_once() {
        cov_mark::check!(duplicate_update_ignored);
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = task("a", &log);
        let b = task("b", &log);
        enqueue(a.clone());
        enqueue(b);
        enqueue(a);
        assert_eq!(pending_count(), 2);
        let report = process();
        assert_eq!(report.processed, 2);
        assert_eq!(*log.borrow(), ["a", "b"]);
    }

    #[test]
    fn failures_do_not_stop_the_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));
        enqueue(Rc::new(Task {
            name: "bad",
            log: log.clone(),
            fail: true,
        }));
        enqueue(task("good", &log));
        let report = process();
        assert_eq!(*log.borrow(), ["bad", "good"]);
        assert!(matches!(report.into_result(), Err(Error::Flush(errors)) if errors.len() == 1));
    }

    struct Requeue {
        inner: Rc<Task>,
        requeued: Cell<bool>,
    }

    impl Updatable for Requeue {
        fn update(&self) -> Result<()> {
            if !self.requeued.replace(true) {
                enqueue(self.inner.clone());
            }
            Ok(())
        }
    }

    #[test]
    fn work_queued_during_a_flush_waits() {
        let log = Rc::new(RefCell::new(Vec::new()));
        enqueue(Rc::new(Requeue {
            inner: task("later", &log),
            requeued: Cell::new(false),
        }));
        process();
        assert!(log.borrow().is_empty());
        assert_eq!(pending_count(), 1);
        process();
        assert_eq!(*log.borrow(), ["later"]);
    }

    #[test]
    fn sync_mode_runs_immediately() {
        set_mode(UpdateMode::Sync);
        let log = Rc::new(RefCell::new(Vec::new()));
        enqueue(task("now", &log));
        assert_eq!(*log.borrow(), ["now"]);
        assert_eq!(pending_count(), 0);
        set_mode(UpdateMode::Async);
    }

    #[test]
    fn spawn_scheduler_flushes_on_the_pool() {
        let mut pool = LocalPool::new();
        configure()
            .scheduler(SpawnScheduler::new(pool.spawner()))
            .install();
        let log = Rc::new(RefCell::new(Vec::new()));
        enqueue(task("spawned", &log));
        assert!(is_flush_requested());
        pool.run_until_stalled();
        assert_eq!(*log.borrow(), ["spawned"]);
        configure().install();
    }

    #[test]
    fn next_resolves_after_the_flush() {
        let mut pool = LocalPool::new();
        configure()
            .scheduler(SpawnScheduler::new(pool.spawner()))
            .install();
        let log = Rc::new(RefCell::new(Vec::new()));
        enqueue(task("flushed", &log));
        let seen = log.clone();
        pool.run_until(async move {
            next().await;
            assert_eq!(*seen.borrow(), ["flushed"]);
        });
        configure().install();
    }
}

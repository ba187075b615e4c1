//! Observable arrays and splice recording.

use std::cell::{Cell, OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::{Rc, Weak};

use super::notifier::{ChangeArgs, Notifier};
use super::watcher::track;
use crate::error::{Error, Result};
use crate::updates::{self, Updatable};
use crate::value::Value;

/// One contiguous change to an array: at `index`, `removed` was taken out and
/// `added` put in. A sequence of splices is applied in order, each against the
/// result of the previous one.
#[derive(Clone, Debug, PartialEq)]
pub struct Splice {
    /// Position of the change.
    pub index: usize,
    /// Items that were removed.
    pub removed: Vec<Value>,
    /// Items that were inserted.
    pub added: Vec<Value>,
}

impl Splice {
    /// A splice that replaces the whole array.
    pub fn reset(removed: Vec<Value>, added: Vec<Value>) -> Self {
        Self {
            index: 0,
            removed,
            added,
        }
    }
}

/// Collects splices for one array and publishes them through its notifier.
pub trait ArrayObserver {
    /// The notifier subscribers attach to.
    fn notifier(&self) -> Notifier;
    /// Record one mutation.
    fn add_splice(&self, splice: Splice);
    /// Deliver everything recorded so far, now.
    fn flush(&self);
}

/// Builds the observer attached to an array the first time it is observed.
pub type ArrayObserverFactory = fn() -> Rc<dyn ArrayObserver>;

thread_local! {
    static OBSERVER_FACTORY: Cell<Option<ArrayObserverFactory>> = const { Cell::new(None) };
}

/// Register (or clear) the factory used to observe arrays on this thread.
pub fn set_array_observer_factory(factory: Option<ArrayObserverFactory>) {
    OBSERVER_FACTORY.with(|f| f.set(factory));
}

/// Register the built-in [`SpliceObserver`].
pub fn enable_array_observation() {
    set_array_observer_factory(Some(SpliceObserver::create));
}

/// Whether arrays can be observed on this thread.
pub fn array_observation_enabled() -> bool {
    OBSERVER_FACTORY.with(|f| f.get().is_some())
}

/// The default array observer.
///
/// Splices are buffered and published together from the update queue,
/// followed by a `length` property notification.
pub struct SpliceObserver {
    this: Weak<SpliceObserver>,
    notifier: Notifier,
    pending: RefCell<Vec<Splice>>,
    needs_queue: Cell<bool>,
}

impl SpliceObserver {
    /// Create a new observer.
    pub fn create() -> Rc<dyn ArrayObserver> {
        Rc::new_cyclic(|this: &Weak<SpliceObserver>| SpliceObserver {
            this: this.clone(),
            notifier: Notifier::new(),
            pending: RefCell::new(Vec::new()),
            needs_queue: Cell::new(true),
        })
    }
}

impl ArrayObserver for SpliceObserver {
    fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    fn add_splice(&self, splice: Splice) {
        {
            let mut pending = self.pending.borrow_mut();
            match pending.last_mut() {
                Some(last)
                    if splice.removed.is_empty()
                        && splice.index == last.index + last.added.len() =>
                {
                    cov_mark::hit!(adjacent_splices_merged);
                    last.added.extend(splice.added);
                }
                _ => pending.push(splice),
            }
        }
        if self.needs_queue.replace(false) {
            if let Some(this) = self.this.upgrade() {
                updates::enqueue(this);
            }
        }
    }

    fn flush(&self) {
        self.needs_queue.set(true);
        let splices = std::mem::take(&mut *self.pending.borrow_mut());
        if splices.is_empty() {
            return;
        }
        tracing::trace!(splices = splices.len(), "publishing array splices");
        self.notifier.notify(&ChangeArgs::Splices(splices.into()));
        self.notifier.notify(&ChangeArgs::Property("length".into()));
    }
}

impl Updatable for SpliceObserver {
    fn update(&self) -> Result<()> {
        self.flush();
        Ok(())
    }
}

/// A shared, observable list of values.
///
/// Mutations are recorded as [`Splice`]s once the array has been observed;
/// until then they cost nothing extra.
#[derive(Clone, Default)]
pub struct ObservableArray {
    inner: Rc<ArrayInner>,
}

#[derive(Default)]
struct ArrayInner {
    items: RefCell<Vec<Value>>,
    observer: OnceCell<Rc<dyn ArrayObserver>>,
}

impl ObservableArray {
    /// An empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// An array holding `items`.
    pub fn from_values<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        items.into_iter().map(Into::into).collect()
    }

    /// Number of items, untracked. See [`length_of`] for a tracked read.
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The item at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// A snapshot of the items.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// Iterate over a snapshot of the items.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Append one item.
    pub fn push(&self, value: impl Into<Value>) {
        let index = self.len();
        self.splice(index, 0, [value.into()]);
    }

    /// Remove and return the last item.
    pub fn pop(&self) -> Option<Value> {
        let index = self.len().checked_sub(1)?;
        self.splice(index, 1, std::iter::empty()).pop()
    }

    /// Remove and return the first item.
    pub fn shift(&self) -> Option<Value> {
        self.remove(0)
    }

    /// Prepend one item.
    pub fn unshift(&self, value: impl Into<Value>) {
        self.splice(0, 0, [value.into()]);
    }

    /// Insert at `index`, clamped to the length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        self.splice(index, 0, [value.into()]);
    }

    /// Remove and return the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, std::iter::empty()).pop()
    }

    /// Replace the item at `index`, returning the previous one. Out of range
    /// indices leave the array untouched.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Option<Value> {
        if index >= self.len() {
            return None;
        }
        self.splice(index, 1, [value.into()]).pop()
    }

    /// Remove `delete_count` items at `index` and insert `items` in their place.
    /// Both the index and the count are clamped to the array.
    pub fn splice(
        &self,
        index: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = Value>,
    ) -> Vec<Value> {
        let added: Vec<Value> = items.into_iter().collect();
        let (index, removed) = {
            let mut current = self.inner.items.borrow_mut();
            let index = index.min(current.len());
            let end = index.saturating_add(delete_count).min(current.len());
            let removed: Vec<Value> = current.splice(index..end, added.iter().cloned()).collect();
            (index, removed)
        };
        if !removed.is_empty() || !added.is_empty() {
            self.record(Splice {
                index,
                removed: removed.clone(),
                added,
            });
        }
        removed
    }

    /// Remove every item.
    pub fn clear(&self) {
        self.splice(0, self.len(), std::iter::empty());
    }

    /// Replace the whole contents.
    pub fn replace_all<T: Into<Value>>(&self, items: impl IntoIterator<Item = T>) {
        let added: Vec<Value> = items.into_iter().map(Into::into).collect();
        let removed = std::mem::replace(&mut *self.inner.items.borrow_mut(), added.clone());
        self.record(Splice::reset(removed, added));
    }

    /// Reverse in place.
    pub fn reverse(&self) {
        self.reorder(|items| items.reverse());
    }

    /// Sort in place with a comparator.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) {
        self.reorder(|items| items.sort_by(|a, b| compare(a, b)));
    }

    fn reorder(&self, f: impl FnOnce(&mut Vec<Value>)) {
        let (removed, added) = {
            let mut items = self.inner.items.borrow_mut();
            let removed = items.clone();
            f(&mut items);
            (removed, items.clone())
        };
        if !removed.is_empty() {
            self.record(Splice::reset(removed, added));
        }
    }

    fn record(&self, splice: Splice) {
        if let Some(observer) = self.inner.observer.get() {
            observer.add_splice(splice);
        }
    }

    /// The array's notifier, attaching an observer on first use.
    ///
    /// Fails with [`Error::ArrayObservationDisabled`] when no observer factory
    /// is registered on this thread.
    pub fn notifier(&self) -> Result<Notifier> {
        if let Some(observer) = self.inner.observer.get() {
            return Ok(observer.notifier());
        }
        let factory = OBSERVER_FACTORY
            .with(Cell::get)
            .ok_or(Error::ArrayObservationDisabled)?;
        Ok(self.inner.observer.get_or_init(factory).notifier())
    }

    /// Publish pending splices immediately instead of waiting for the queue.
    pub fn flush_splices(&self) {
        if let Some(observer) = self.inner.observer.get() {
            observer.flush();
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ObservableArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl FromIterator<Value> for ObservableArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(iter.into_iter().collect()),
                observer: OnceCell::new(),
            }),
        }
    }
}

impl fmt::Debug for ObservableArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter()).finish()
    }
}

/// Tracked read of an array's length.
pub fn length_of(array: &ObservableArray) -> usize {
    track(array.clone(), "length");
    array.len()
}

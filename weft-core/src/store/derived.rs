//! DerivedStore Implementation
//!
//! A DerivedStore is a cell computed from one or more source stores via an
//! aggregate closure.
//!
//! # How DerivedStores Work
//!
//! 1. While nobody subscribes, the store is *disconnected*: it holds no
//!    source subscriptions, and every `value()` read recomputes the
//!    aggregate fresh (cost proportional to the number of sources, paid
//!    only by inactive stores). The cache is never touched in this state.
//!
//! 2. The first subscriber *connects* it: the aggregate is computed and
//!    cached, and the store subscribes to every source.
//!
//! 3. On a source change the aggregate is recomputed and compared against
//!    the cache; subscribers are notified only when it actually changed,
//!    pruning redundant downstream notifications.
//!
//! 4. When the last subscriber leaves, the store *disconnects* again,
//!    dropping all source subscriptions. This is what prevents unobserved
//!    derived stores from pinning their sources (and the subscription
//!    closures from forming reference cycles that outlive their use).
//!
//! # Failure Semantics
//!
//! A panic in the aggregate closure propagates synchronously to whoever
//! performed the source mutation. The engine does no isolation between
//! sibling subscribers: a panicking aggregate prevents notification of
//! subscribers registered after it on the same source. This is a documented
//! limitation, not a silent one.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::subscribers::SubscriberList;
use super::{ChangeCallback, Source, Store, Unsubscribe};

/// A cell computed from other stores, with lazy source subscription.
///
/// The aggregate closure reads the source stores directly; the `sources`
/// list exists so the store knows what to subscribe to while connected.
///
/// # Example
///
/// ```rust,ignore
/// let a = AtomStore::new(2);
/// let b = AtomStore::new(3);
///
/// let (a2, b2) = (a.clone(), b.clone());
/// let sum = derive(vec![a.as_source(), b.as_source()], move || {
///     a2.value() + b2.value()
/// });
///
/// assert_eq!(sum.value(), 5);
/// ```
pub struct DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    sources: Arc<Vec<Arc<dyn Source>>>,
    aggregate: Arc<dyn Fn() -> T + Send + Sync>,
    cache: Arc<RwLock<Option<T>>>,
    connections: Arc<Mutex<Vec<Unsubscribe>>>,
    connected: Arc<AtomicBool>,
    subscribers: SubscriberList<T>,
}

/// Create a derived store. Mirrors [`DerivedStore::new`].
pub fn derive<T, F>(sources: Vec<Arc<dyn Source>>, aggregate: F) -> DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    DerivedStore::new(sources, aggregate)
}

impl<T> DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new derived store over the given sources.
    ///
    /// Nothing is computed or subscribed until the first subscriber arrives.
    pub fn new<F>(sources: Vec<Arc<dyn Source>>, aggregate: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            sources: Arc::new(sources),
            aggregate: Arc::new(aggregate),
            cache: Arc::new(RwLock::new(None)),
            connections: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            subscribers: SubscriberList::new(),
        }
    }

    /// Whether the store currently holds live source subscriptions.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Type-erased handle for use as a source of a further derived store.
    pub fn as_source(&self) -> Arc<dyn Source> {
        Arc::new(self.clone())
    }

    fn connect(&self) {
        let initial = (self.aggregate)();
        *self.cache.write() = Some(initial);

        let mut connections = Vec::with_capacity(self.sources.len());
        for source in self.sources.iter() {
            let this = self.clone();
            connections.push(source.subscribe_source(Arc::new(move || this.recompute())));
        }
        *self.connections.lock() = connections;
        self.connected.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        let connections = std::mem::take(&mut *self.connections.lock());
        for unsubscribe in connections {
            unsubscribe();
        }
        *self.cache.write() = None;
        self.connected.store(false, Ordering::SeqCst);
    }

    fn recompute(&self) {
        let next = (self.aggregate)();
        let previous = {
            let mut cache = self.cache.write();
            std::mem::replace(&mut *cache, Some(next.clone()))
        };

        match previous {
            Some(previous) if previous == next => {}
            Some(previous) => self.subscribers.notify(&next, &previous),
            // A ping can only arrive while connected, but guard anyway.
            None => {}
        }
    }
}

impl<T> Store<T> for DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// The cache is served only while connected; disconnected reads
    /// recompute fresh and leave the cache untouched.
    fn value(&self) -> T {
        if self.connected.load(Ordering::SeqCst) {
            if let Some(cached) = self.cache.read().clone() {
                return cached;
            }
        }
        (self.aggregate)()
    }

    fn subscribe(&self, on_change: ChangeCallback<T>) -> Unsubscribe {
        if !self.connected.load(Ordering::SeqCst) {
            self.connect();
        }

        let remove = self.subscribers.add(on_change);
        let this = self.clone();
        Box::new(move || {
            remove();
            if this.subscribers.is_empty() {
                this.disconnect();
            }
        })
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Source for DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe_source(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Unsubscribe {
        self.subscribe(Arc::new(move |_, _| on_change()))
    }
}

impl<T> Clone for DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            aggregate: Arc::clone(&self.aggregate),
            cache: Arc::clone(&self.cache),
            connections: Arc::clone(&self.connections),
            connected: Arc::clone(&self.connected),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Debug for DerivedStore<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedStore")
            .field("connected", &self.is_connected())
            .field("value", &self.value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AtomStore;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn doubled(source: &AtomStore<i32>) -> DerivedStore<i32> {
        let read = source.clone();
        derive(vec![source.as_source()], move || read.value() * 2)
    }

    #[test]
    fn disconnected_reads_recompute_fresh() {
        let source = AtomStore::new(10);
        let store = doubled(&source);

        assert!(!store.is_connected());
        assert_eq!(store.value(), 20);

        source.set(15);
        assert_eq!(store.value(), 30);
        assert!(!store.is_connected());
    }

    #[test]
    fn connects_on_first_subscriber_and_disconnects_on_last() {
        let source = AtomStore::new(1);
        let store = doubled(&source);

        assert_eq!(source.subscriber_count(), 0);

        let first = store.subscribe(Arc::new(|_, _| {}));
        assert!(store.is_connected());
        assert_eq!(source.subscriber_count(), 1);

        let second = store.subscribe(Arc::new(|_, _| {}));
        assert_eq!(source.subscriber_count(), 1);

        first();
        assert!(store.is_connected());

        second();
        assert!(!store.is_connected());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn notifies_only_when_aggregate_changes() {
        let source = AtomStore::new(1);
        let read = source.clone();
        let parity = derive(vec![source.as_source()], move || read.value() % 2);

        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = Arc::clone(&calls);
        let _keep = parity.subscribe(Arc::new(move |_, _| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        source.set(3); // parity unchanged
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        source.set(4); // parity flips
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn propagates_through_chained_derived_stores() {
        let source = AtomStore::new(5);
        let twice = doubled(&source);

        let read = twice.clone();
        let plus_ten = derive(vec![twice.as_source()], move || read.value() + 10);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _keep = plus_ten.subscribe(Arc::new(move |next, previous| {
            seen_clone.lock().push((previous.copied(), *next));
        }));

        assert_eq!(plus_ten.value(), 20);

        source.set(6);
        assert_eq!(plus_ten.value(), 22);
        assert_eq!(*seen.lock(), vec![(Some(20), 22)]);
    }

    #[test]
    fn chained_unsubscribe_releases_everything() {
        let source = AtomStore::new(5);
        let twice = doubled(&source);
        let read = twice.clone();
        let plus_ten = derive(vec![twice.as_source()], move || read.value() + 10);

        let unsubscribe = plus_ten.subscribe(Arc::new(|_, _| {}));
        assert!(twice.is_connected());
        assert_eq!(source.subscriber_count(), 1);

        unsubscribe();
        assert!(!twice.is_connected());
        assert!(!plus_ten.is_connected());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn value_matches_aggregate_whether_connected_or_not() {
        let a = AtomStore::new(2);
        let b = AtomStore::new(3);
        let (ra, rb) = (a.clone(), b.clone());
        let sum = derive(vec![a.as_source(), b.as_source()], move || {
            ra.value() + rb.value()
        });

        assert_eq!(sum.value(), 5);

        let unsubscribe = sum.subscribe(Arc::new(|_, _| {}));
        a.set(10);
        assert_eq!(sum.value(), 13);

        unsubscribe();
        b.set(30);
        assert_eq!(sum.value(), 40);
    }

    #[test]
    fn multi_source_aggregate_sees_all_changes() {
        let a = AtomStore::new(1);
        let b = AtomStore::new(2);
        let (ra, rb) = (a.clone(), b.clone());
        let max = derive(vec![a.as_source(), b.as_source()], move || {
            ra.value().max(rb.value())
        });

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _keep = max.subscribe(Arc::new(move |next, _| {
            seen_clone.lock().push(*next);
        }));

        a.set(5);
        b.set(3); // max unchanged, pruned
        b.set(9);

        assert_eq!(*seen.lock(), vec![5, 9]);
    }
}

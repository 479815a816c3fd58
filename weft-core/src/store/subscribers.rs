//! Subscriber bookkeeping shared by every store implementation.
//!
//! A [`SubscriberList`] holds `(id, callback)` pairs in subscription order.
//! Notification clones the list out of the lock before iterating, so
//! callbacks that subscribe or unsubscribe during a pass cannot skew the
//! pass that is currently running.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::{ChangeCallback, Unsubscribe};

/// Unique identifier for a single subscription.
///
/// Uses an atomic counter to ensure uniqueness across threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Generate a new unique subscription ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

// Most stores have a handful of subscribers at most; keep them inline.
type Entries<T> = SmallVec<[(SubscriptionId, ChangeCallback<T>); 2]>;

/// Ordered list of subscribers with snapshot notification.
pub struct SubscriberList<T> {
    entries: Arc<RwLock<Entries<T>>>,
}

// The disposer returned by `add` captures the entries table in a boxed
// `'static` closure, so `T` must outlive it.
impl<T: 'static> SubscriberList<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(SmallVec::new())),
        }
    }

    /// Append a callback and return its single-shot removal function.
    ///
    /// Removal is idempotent with respect to the list: it retains every
    /// entry except the one carrying this subscription's id.
    pub fn add(&self, on_change: ChangeCallback<T>) -> Unsubscribe {
        let id = SubscriptionId::new();
        self.entries.write().push((id, on_change));

        let entries = Arc::clone(&self.entries);
        Box::new(move || {
            entries.write().retain(|(it, _)| *it != id);
        })
    }

    /// Call every current subscriber with `(next, Some(previous))`.
    ///
    /// The list is snapshotted before iterating; mutations performed by the
    /// callbacks apply to subsequent passes only.
    pub fn notify(&self, next: &T, previous: &T) {
        let snapshot: Entries<T> = self.entries.read().clone();
        for (_, on_change) in snapshot.iter() {
            on_change(next, Some(previous));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<T> Clone for SubscriberList<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: 'static> Default for SubscriberList<T> {
    fn default() -> Self {
        Self::new()
    }
}

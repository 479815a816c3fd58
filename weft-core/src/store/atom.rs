//! AtomStore Implementation
//!
//! An AtomStore is the fundamental reactive primitive: an externally
//! settable cell and the root of all reactivity.
//!
//! # How AtomStores Work
//!
//! 1. `set` replaces the stored value and synchronously notifies every
//!    subscriber with the (next, previous) pair.
//!
//! 2. A write whose value compares equal (`PartialEq`) to the current one
//!    performs no notification at all. Equality is whatever the stored
//!    type's own equality does; the store never deep-compares beyond that.
//!
//! 3. Handles are cheap clones sharing the same state; the cell is dropped
//!    when the last handle goes away.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::subscribers::SubscriberList;
use super::{ChangeCallback, Source, Store, Unsubscribe};

/// A directly settable reactive cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = AtomStore::new(0);
///
/// let unsubscribe = count.subscribe(Arc::new(|next, previous| {
///     println!("{previous:?} -> {next}");
/// }));
///
/// count.set(5); // notifies
/// count.set(5); // equal value, notifies nobody
/// ```
pub struct AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    stored: Arc<RwLock<T>>,
    subscribers: SubscriberList<T>,
}

impl<T> AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new store with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            stored: Arc::new(RwLock::new(value)),
            subscribers: SubscriberList::new(),
        }
    }

    /// Replace the value and notify subscribers.
    ///
    /// Writing a value equal to the current one is a no-op.
    pub fn set(&self, next: T) {
        let previous = {
            let mut stored = self.stored.write();
            if *stored == next {
                return;
            }
            std::mem::replace(&mut *stored, next.clone())
        };

        // The lock is released before callbacks run; a subscriber may read
        // or even write this store without deadlocking.
        self.subscribers.notify(&next, &previous);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let stored = self.stored.read();
            f(&stored)
        };
        self.set(next);
    }

    /// Type-erased handle for use as a derived-store source.
    pub fn as_source(&self) -> Arc<dyn Source> {
        Arc::new(self.clone())
    }
}

impl<T> Store<T> for AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn value(&self) -> T {
        self.stored.read().clone()
    }

    fn subscribe(&self, on_change: ChangeCallback<T>) -> Unsubscribe {
        self.subscribers.add(on_change)
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Source for AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscribe_source(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Unsubscribe {
        self.subscribers.add(Arc::new(move |_, _| on_change()))
    }
}

impl<T> Clone for AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            stored: Arc::clone(&self.stored),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Debug for AtomStore<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomStore")
            .field("value", &*self.stored.read())
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

//! Reactive Stores
//!
//! This module implements the reactive dependency engine: atomic stores,
//! derived stores, and the settle-once promise cell consumed by the async
//! boundary directive.
//!
//! # Concepts
//!
//! ## AtomStore
//!
//! An [`AtomStore`] is a container for mutable state and the root of all
//! reactivity. Writing a new value synchronously notifies every subscriber
//! with the (next, previous) pair, in subscription order. Writing a value
//! equal to the current one notifies nobody.
//!
//! ## DerivedStore
//!
//! A [`DerivedStore`] computes its value from one or more source stores via
//! an aggregate closure. It is lazily connected: it holds live subscriptions
//! to its sources only while it has subscribers of its own, so an unobserved
//! derived store can never leak source subscriptions or serve a stale cache.
//!
//! ## Promise
//!
//! A [`Promise`] is a settle-once cell with identity equality, modeling a
//! value that arrives on a future turn of the host's task queue.
//!
//! # Implementation Notes
//!
//! Subscriber lists are snapshotted before every notification pass, so a
//! callback that subscribes or unsubscribes mid-notification cannot affect
//! the pass that is currently running.

mod atom;
mod derived;
mod promise;
mod subscribers;

pub use atom::AtomStore;
pub use derived::{derive, DerivedStore};
pub use promise::{Promise, SettleCallback};
pub use subscribers::{SubscriberList, SubscriptionId};

use std::sync::Arc;

/// Callback invoked with `(next, previous)` when a store's value changes.
///
/// `previous` is `None` only for the immediate call made by [`Store::watch`];
/// change notifications always carry `Some(previous)`.
pub type ChangeCallback<T> = Arc<dyn Fn(&T, Option<&T>) + Send + Sync>;

/// Single-shot removal function returned by [`Store::subscribe`].
///
/// Removal is keyed by subscription id, so a disposer that outlives a
/// reconnect cycle removes nothing it does not own.
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// An observable single-value cell.
///
/// Notification order is subscription order, and all notification is
/// synchronous: by the time a mutating call returns, every downstream
/// recomputation and directive reaction has completed.
pub trait Store<T>: Send + Sync {
    /// Get a clone of the current value.
    fn value(&self) -> T;

    /// Register a change callback. Does not invoke it immediately.
    fn subscribe(&self, on_change: ChangeCallback<T>) -> Unsubscribe;

    /// Invoke the callback once with the current value (previous = `None`),
    /// then subscribe it for changes.
    fn watch(&self, on_value: ChangeCallback<T>) -> Unsubscribe {
        on_value(&self.value(), None);
        self.subscribe(on_value)
    }

    /// Number of currently registered subscribers.
    ///
    /// This is the observation point the leak tests use: a mount/unmount
    /// round trip must return every touched store to its baseline count.
    fn subscriber_count(&self) -> usize;
}

/// Shared handle to a type-erased store.
pub type SharedStore<T> = Arc<dyn Store<T>>;

/// Type-erased "something changed" subscription surface.
///
/// [`DerivedStore`] sources and the keyed-remount directive only need change
/// pings, not typed payloads, so every store also exposes this erased form.
pub trait Source: Send + Sync {
    /// Subscribe for change pings. Same ordering and snapshot guarantees as
    /// [`Store::subscribe`].
    fn subscribe_source(&self, on_change: Arc<dyn Fn() + Send + Sync>) -> Unsubscribe;
}

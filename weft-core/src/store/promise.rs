//! Promise Implementation
//!
//! A Promise is a settle-once cell: it is created pending and settles
//! exactly once with a success value or a rejection reason. The async
//! boundary directive consumes it to drive its pending/settled/error
//! sub-trees.
//!
//! # Semantics
//!
//! - First settlement wins; later `resolve`/`reject` calls are ignored.
//! - `on_settle` on an already-settled promise invokes the callback
//!   synchronously. The runtime is single-threaded cooperative: "a future
//!   turn of the host's task queue" is modeled by whoever owns the promise
//!   calling `resolve`/`reject` on a later turn.
//! - Equality is *identity* of the shared state, not content. A store of
//!   promises therefore notifies exactly when a different promise is
//!   assigned, which is what the async boundary's last-write-wins logic
//!   keys off.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked once with the settled outcome.
pub type SettleCallback<T, E> = Box<dyn FnOnce(&Result<T, E>) + Send>;

struct PromiseInner<T, E> {
    outcome: Option<Result<T, E>>,
    waiters: Vec<SettleCallback<T, E>>,
}

/// A settle-once asynchronous cell with identity equality.
pub struct Promise<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<PromiseInner<T, E>>>,
}

impl<T, E> Promise<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a promise that has not settled yet.
    pub fn pending() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PromiseInner {
                outcome: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// Create an already-resolved promise.
    pub fn resolved(value: T) -> Self {
        let promise = Self::pending();
        promise.resolve(value);
        promise
    }

    /// Create an already-rejected promise.
    pub fn rejected(reason: E) -> Self {
        let promise = Self::pending();
        promise.reject(reason);
        promise
    }

    /// Settle with a success value. No-op if already settled.
    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Settle with a rejection reason. No-op if already settled.
    pub fn reject(&self, reason: E) {
        self.settle(Err(reason));
    }

    pub fn is_settled(&self) -> bool {
        self.inner.lock().outcome.is_some()
    }

    /// Register a callback for settlement.
    ///
    /// Invoked synchronously right away if the promise already settled.
    pub fn on_settle(&self, callback: SettleCallback<T, E>) {
        let settled = {
            let mut inner = self.inner.lock();
            match &inner.outcome {
                Some(outcome) => Some(outcome.clone()),
                None => {
                    inner.waiters.push(callback);
                    return;
                }
            }
        };
        if let Some(outcome) = settled {
            callback(&outcome);
        }
    }

    fn settle(&self, outcome: Result<T, E>) {
        let waiters = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() {
                return;
            }
            inner.outcome = Some(outcome.clone());
            std::mem::take(&mut inner.waiters)
        };

        // Callbacks run with the lock released; they may inspect or clone
        // the promise freely.
        for waiter in waiters {
            waiter(&outcome);
        }
    }
}

impl<T, E> Clone for Promise<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Identity equality: two handles are equal iff they share the same cell.
impl<T, E> PartialEq for Promise<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T, E> Debug for Promise<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn settles_once() {
        let promise: Promise<i32, String> = Promise::pending();
        assert!(!promise.is_settled());

        promise.resolve(1);
        promise.resolve(2);
        promise.reject("late".into());

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        promise.on_settle(Box::new(move |outcome| {
            *seen_clone.lock() = Some(outcome.clone());
        }));

        assert_eq!(*seen.lock(), Some(Ok(1)));
    }

    #[test]
    fn waiters_run_on_settlement_in_order() {
        let promise: Promise<i32, String> = Promise::pending();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            promise.on_settle(Box::new(move |_| order.lock().push(tag)));
        }
        assert!(order.lock().is_empty());

        promise.resolve(0);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn on_settle_after_settlement_is_synchronous() {
        let promise: Promise<i32, String> = Promise::rejected("boom".into());
        let calls = Arc::new(AtomicI32::new(0));

        let calls_clone = Arc::clone(&calls);
        promise.on_settle(Box::new(move |outcome| {
            assert_eq!(outcome.as_ref().unwrap_err(), "boom");
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn equality_is_identity_not_content() {
        let a: Promise<i32, String> = Promise::resolved(1);
        let b: Promise<i32, String> = Promise::resolved(1);
        let a2 = a.clone();

        assert_ne!(a, b);
        assert_eq!(a, a2);
    }
}

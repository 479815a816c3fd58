//! Async Boundary Directive
//!
//! Projects the lifecycle of a [`Promise`] (or a store of promises) as a
//! pending/settled/error sub-tree. At most one of the three is mounted at
//! any time.
//!
//! # Last-Write-Wins
//!
//! When the promise source is store-backed, each newly assigned promise
//! restarts the pending sequence and supersedes the previous promise. Every
//! restart bumps a generation counter, and each settle continuation carries
//! the generation it was created under: a continuation whose generation no
//! longer matches does nothing. Unmount bumps the generation too, so a
//! continuation that fires after unmount cannot touch host state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::host::{NodeRef, SharedHost};
use crate::store::{Promise, SharedStore, Store};

use super::renderable::{Disposables, MountPoint, RenderResult, Renderable};

enum PromiseSource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Literal(Promise<T, E>),
    Reactive(SharedStore<Promise<T, E>>),
}

type RenderOutcome<V> = Arc<dyn Fn(&V) -> Arc<dyn Renderable> + Send + Sync>;

struct AwaitInner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    source: PromiseSource<T, E>,
    pending: RwLock<Option<Arc<dyn Renderable>>>,
    on_resolve: RwLock<Option<RenderOutcome<T>>>,
    on_reject: RwLock<Option<RenderOutcome<E>>>,
    point: Mutex<Option<MountPoint>>,
    visible: Mutex<Option<Arc<dyn Renderable>>>,
    generation: AtomicU64,
    disposables: Disposables,
}

/// Pending/settled/error rendering over a promise.
///
/// # Example
///
/// ```rust,ignore
/// let view = Await::new(load_user())
///     .pending(Text::literal("loading..."))
///     .then(|user: &User| Text::literal(user.name.clone()))
///     .catch(|err: &String| Text::literal(format!("failed: {err}")));
/// ```
pub struct Await<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    inner: Arc<AwaitInner<T, E>>,
}

impl<T, E> Await<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Await a single promise.
    pub fn new(promise: Promise<T, E>) -> Self {
        Self::with_source(PromiseSource::Literal(promise))
    }

    /// Await a store of promises; each newly assigned promise restarts the
    /// pending sequence and supersedes the previous one.
    pub fn watching(promises: impl Store<Promise<T, E>> + 'static) -> Self {
        Self::with_source(PromiseSource::Reactive(Arc::new(promises)))
    }

    fn with_source(source: PromiseSource<T, E>) -> Self {
        Self {
            inner: Arc::new(AwaitInner {
                source,
                pending: RwLock::new(None),
                on_resolve: RwLock::new(None),
                on_reject: RwLock::new(None),
                point: Mutex::new(None),
                visible: Mutex::new(None),
                generation: AtomicU64::new(0),
                disposables: Disposables::new(),
            }),
        }
    }

    /// Renderable shown between (re)start and settlement.
    pub fn pending(self, renderable: impl Renderable + 'static) -> Self {
        *self.inner.pending.write() = Some(Arc::new(renderable));
        self
    }

    /// Build the settled sub-tree from the resolved value.
    pub fn then<R, F>(self, build: F) -> Self
    where
        R: Renderable + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        *self.inner.on_resolve.write() =
            Some(Arc::new(move |value| Arc::new(build(value)) as Arc<dyn Renderable>));
        self
    }

    /// Build the error sub-tree from the rejection reason.
    pub fn catch<R, F>(self, build: F) -> Self
    where
        R: Renderable + 'static,
        F: Fn(&E) -> R + Send + Sync + 'static,
    {
        *self.inner.on_reject.write() =
            Some(Arc::new(move |reason| Arc::new(build(reason)) as Arc<dyn Renderable>));
        self
    }

    fn current_promise(&self) -> Promise<T, E> {
        match &self.inner.source {
            PromiseSource::Literal(promise) => promise.clone(),
            PromiseSource::Reactive(store) => store.value(),
        }
    }

    /// Begin (or restart) waiting on `promise`.
    fn start(inner: &Arc<AwaitInner<T, E>>, promise: Promise<T, E>) -> RenderResult<()> {
        let point = match inner.point.lock().clone() {
            Some(point) => point,
            None => return Ok(()),
        };

        // Bumping first makes any earlier continuation stale before we
        // touch the host.
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = inner.visible.lock().take();
        if let Some(previous) = previous {
            previous.unmount();
        }

        let pending = inner.pending.read().clone();
        if let Some(pending) = pending {
            pending.mount(&point.host, point.parent, Some(point.marker))?;
            *inner.visible.lock() = Some(pending);
        }

        let settle_inner = Arc::clone(inner);
        promise.on_settle(Box::new(move |outcome| {
            Self::settle(&settle_inner, generation, outcome);
        }));
        Ok(())
    }

    /// Continuation: swap in the settled or error sub-tree, unless this
    /// promise has been superseded.
    fn settle(inner: &Arc<AwaitInner<T, E>>, generation: u64, outcome: &Result<T, E>) {
        if inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("superseded promise settled; ignoring");
            return;
        }
        let point = match inner.point.lock().clone() {
            Some(point) => point,
            None => return,
        };

        let built = match outcome {
            Ok(value) => inner.on_resolve.read().clone().map(|build| build(value)),
            Err(reason) => inner.on_reject.read().clone().map(|build| build(reason)),
        };
        // No continuation registered for this outcome: whatever is visible
        // (usually the pending branch) stays.
        let Some(renderable) = built else {
            return;
        };

        let previous = inner.visible.lock().take();
        if let Some(previous) = previous {
            previous.unmount();
        }
        if let Err(err) = renderable.mount(&point.host, point.parent, Some(point.marker)) {
            tracing::error!(%err, "async branch mount failed");
            return;
        }
        *inner.visible.lock() = Some(renderable);
    }
}

impl<T, E> Renderable for Await<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.inner.disposables.reset();
        *self.inner.point.lock() = Some(MountPoint::place(host, parent, anchor));

        if let PromiseSource::Reactive(store) = &self.inner.source {
            let inner = Arc::clone(&self.inner);
            self.inner
                .disposables
                .push(store.subscribe(Arc::new(move |next, _| {
                    if let Err(err) = Await::start(&inner, next.clone()) {
                        tracing::error!(%err, "async pending mount failed");
                    }
                })));
        }

        Self::start(&self.inner, self.current_promise())
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let marker = {
            let mut point = self.inner.point.lock();
            let Some(point) = point.as_mut() else {
                tracing::warn!("move_to on unmounted async boundary");
                return None;
            };
            point.host.insert_before(parent, point.marker, anchor);
            point.parent = parent;
            point.marker
        };

        let visible = self.inner.visible.lock().as_ref().map(Arc::clone);
        let first = visible.and_then(|renderable| renderable.move_to(parent, Some(marker)));
        Some(first.unwrap_or(marker))
    }

    fn unmount(&self) {
        // Stale continuations must become inert before any teardown.
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.disposables.dispose();

        let visible = self.inner.visible.lock().take();
        if let Some(visible) = visible {
            visible.unmount();
        }

        let point = self.inner.point.lock().take();
        if let Some(point) = point {
            point.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::render::fragment::Text;
    use crate::store::AtomStore;

    type TestPromise = Promise<String, String>;

    fn fixture() -> (Arc<MemoryHost>, SharedHost) {
        let host = Arc::new(MemoryHost::new());
        let shared: SharedHost = host.clone();
        (host, shared)
    }

    fn decorate(view: Await<String, String>) -> Await<String, String> {
        view.pending(Text::literal("pending"))
            .then(|value: &String| Text::literal(format!("ok:{value}")))
            .catch(|reason: &String| Text::literal(format!("err:{reason}")))
    }

    #[test]
    fn pending_then_resolved() {
        let (host, shared) = fixture();
        let promise = TestPromise::pending();

        let view = decorate(Await::new(promise.clone()));
        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(host.visible_texts(host.root()), vec!["pending"]);

        promise.resolve("done".into());
        assert_eq!(host.visible_texts(host.root()), vec!["ok:done"]);
    }

    #[test]
    fn rejection_mounts_the_error_branch() {
        let (host, shared) = fixture();
        let promise = TestPromise::pending();

        let view = decorate(Await::new(promise.clone()));
        view.mount(&shared, host.root(), None).unwrap();

        promise.reject("boom".into());
        assert_eq!(host.visible_texts(host.root()), vec!["err:boom"]);
    }

    #[test]
    fn already_settled_promise_skips_straight_to_settled() {
        let (host, shared) = fixture();
        let view = decorate(Await::new(TestPromise::resolved("fast".into())));

        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(host.visible_texts(host.root()), vec!["ok:fast"]);
    }

    #[test]
    fn superseded_promise_settlement_is_ignored() {
        let (host, shared) = fixture();
        let first = TestPromise::pending();
        let promises = AtomStore::new(first.clone());

        let view = decorate(Await::watching(promises.clone()));
        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(host.visible_texts(host.root()), vec!["pending"]);

        let second = TestPromise::pending();
        promises.set(second.clone());
        second.resolve("second".into());
        assert_eq!(host.visible_texts(host.root()), vec!["ok:second"]);

        // The superseded promise settles late; the visible branch must not
        // change.
        first.resolve("first".into());
        assert_eq!(host.visible_texts(host.root()), vec!["ok:second"]);
    }

    #[test]
    fn new_promise_restarts_the_pending_sequence() {
        let (host, shared) = fixture();
        let first = TestPromise::resolved("first".into());
        let promises = AtomStore::new(first);

        let view = decorate(Await::watching(promises.clone()));
        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(host.visible_texts(host.root()), vec!["ok:first"]);

        let second = TestPromise::pending();
        promises.set(second.clone());
        assert_eq!(host.visible_texts(host.root()), vec!["pending"]);

        second.resolve("second".into());
        assert_eq!(host.visible_texts(host.root()), vec!["ok:second"]);
    }

    #[test]
    fn settlement_after_unmount_touches_nothing() {
        let (host, shared) = fixture();
        let promise = TestPromise::pending();

        let view = decorate(Await::new(promise.clone()));
        view.mount(&shared, host.root(), None).unwrap();
        view.unmount();
        assert_eq!(host.attached_count(), 0);

        promise.resolve("late".into());
        assert_eq!(host.attached_count(), 0);
    }

    #[test]
    fn unmount_round_trip_releases_everything() {
        let (host, shared) = fixture();
        let promises = AtomStore::new(TestPromise::pending());

        let view = decorate(Await::watching(promises.clone()));
        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(promises.subscriber_count(), 1);

        view.unmount();
        view.unmount();
        assert_eq!(host.attached_count(), 0);
        assert_eq!(promises.subscriber_count(), 0);
    }
}

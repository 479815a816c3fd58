//! List Directive (each)
//!
//! Projects a `Store<Vec<T>>` as a run of renderables keyed by entry
//! *identity* (value equality, not index). The registry maps each entry to
//! its mounted renderable:
//!
//! 1. Entries missing from the registry are rendered and mounted.
//! 2. Registry entries absent from the new list are unmounted and dropped.
//! 3. Host order is reconciled by walking the new list last-to-first and
//!    moving each entry's renderable to just before the previously
//!    positioned node, starting from the trailing marker. Nothing is
//!    cleared and re-created.
//!
//! Reordering an unchanged set of entries therefore destroys nothing, and
//! duplicate identities collapse to a single rendered instance.
//!
//! An optional empty-state renderable is mounted while the list is empty.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};

use crate::host::{NodeRef, SharedHost};
use crate::store::{SharedStore, Store};

use super::renderable::{Disposables, MountPoint, RenderResult, Renderable};

type RenderEntry<T> = Box<dyn Fn(&T) -> Arc<dyn Renderable> + Send + Sync>;

struct EachInner<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    entries: SharedStore<Vec<T>>,
    render: RenderEntry<T>,
    empty: RwLock<Option<Arc<dyn Renderable>>>,
    point: Mutex<Option<MountPoint>>,
    registry: Mutex<IndexMap<T, Arc<dyn Renderable>>>,
    order: Mutex<Vec<T>>,
    empty_visible: Mutex<Option<Arc<dyn Renderable>>>,
    disposables: Disposables,
}

/// Identity-keyed list rendering.
///
/// # Example
///
/// ```rust,ignore
/// let items = AtomStore::new(vec!["a".to_string(), "b".to_string()]);
///
/// let view = Each::new(items.clone(), |item: &String| Text::literal(item.clone()))
///     .when_empty(Text::literal("nothing here"));
/// ```
pub struct Each<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    inner: Arc<EachInner<T>>,
}

impl<T> Each<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new<R, F>(entries: impl Store<Vec<T>> + 'static, render: F) -> Self
    where
        R: Renderable + 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EachInner {
                entries: Arc::new(entries),
                render: Box::new(move |entry| Arc::new(render(entry))),
                empty: RwLock::new(None),
                point: Mutex::new(None),
                registry: Mutex::new(IndexMap::new()),
                order: Mutex::new(Vec::new()),
                empty_visible: Mutex::new(None),
                disposables: Disposables::new(),
            }),
        }
    }

    /// Renderable shown while the list has no entries.
    pub fn when_empty(self, renderable: impl Renderable + 'static) -> Self {
        *self.inner.empty.write() = Some(Arc::new(renderable));
        self
    }

    /// Reconcile the mounted run against `next`.
    fn apply(inner: &Arc<EachInner<T>>, next: &[T]) -> RenderResult<()> {
        let point = match inner.point.lock().clone() {
            Some(point) => point,
            None => return Ok(()),
        };

        // Duplicate identities collapse before any host work: one rendered
        // instance per identity, positioned at its first occurrence. The
        // reconcile walk below must never see the same renderable twice,
        // or it would use a node as its own insertion anchor.
        let entries: IndexSet<T> = next.iter().cloned().collect();

        // Empty-state fallback swaps in and out before entry work so the
        // two never coexist.
        if entries.is_empty() {
            let fallback = inner.empty.read().clone();
            if let Some(fallback) = fallback {
                let already = inner.empty_visible.lock().is_some();
                if !already {
                    fallback.mount(&point.host, point.parent, Some(point.marker))?;
                    *inner.empty_visible.lock() = Some(fallback);
                }
            }
        } else {
            let fallback = inner.empty_visible.lock().take();
            if let Some(fallback) = fallback {
                fallback.unmount();
            }
        }

        {
            let mut registry = inner.registry.lock();

            // Render additions.
            for entry in &entries {
                if !registry.contains_key(entry) {
                    let renderable = (inner.render)(entry);
                    renderable.mount(&point.host, point.parent, Some(point.marker))?;
                    registry.insert(entry.clone(), renderable);
                }
            }

            // Tear down removals, by identity.
            let stale: Vec<T> = registry
                .keys()
                .filter(|key| !entries.contains(*key))
                .cloned()
                .collect();
            for key in &stale {
                if let Some(renderable) = registry.shift_remove(key) {
                    renderable.unmount();
                }
            }

            // Reconcile host order, last entry first, threading the anchor
            // chain back from the trailing marker.
            let mut last = point.marker;
            for entry in entries.iter().rev() {
                if let Some(renderable) = registry.get(entry) {
                    if let Some(first) = renderable.move_to(point.parent, Some(last)) {
                        last = first;
                    }
                }
            }
        }

        *inner.order.lock() = entries.iter().cloned().collect();
        tracing::debug!(entries = entries.len(), "list reconciled");
        Ok(())
    }
}

impl<T> Renderable for Each<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.inner.disposables.reset();
        self.inner.registry.lock().clear();
        self.inner.order.lock().clear();
        *self.inner.point.lock() = Some(MountPoint::place(host, parent, anchor));

        Self::apply(&self.inner, &self.inner.entries.value())?;

        let inner = Arc::clone(&self.inner);
        self.inner
            .disposables
            .push(self.inner.entries.subscribe(Arc::new(move |next, _| {
                if let Err(err) = Each::apply(&inner, next) {
                    tracing::error!(%err, "list entry mount failed");
                }
            })));
        Ok(())
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let marker = {
            let mut point = self.inner.point.lock();
            let Some(point) = point.as_mut() else {
                tracing::warn!("move_to on unmounted list");
                return None;
            };
            point.host.insert_before(parent, point.marker, anchor);
            point.parent = parent;
            point.marker
        };

        let mut last = marker;
        {
            let order = self.inner.order.lock();
            let registry = self.inner.registry.lock();
            for entry in order.iter().rev() {
                if let Some(renderable) = registry.get(entry) {
                    if let Some(first) = renderable.move_to(parent, Some(last)) {
                        last = first;
                    }
                }
            }
        }

        let fallback = self
            .inner
            .empty_visible
            .lock()
            .as_ref()
            .map(Arc::clone);
        if let Some(fallback) = fallback {
            if let Some(first) = fallback.move_to(parent, Some(last)) {
                last = first;
            }
        }
        Some(last)
    }

    fn unmount(&self) {
        self.inner.disposables.dispose();

        let drained: Vec<(T, Arc<dyn Renderable>)> =
            self.inner.registry.lock().drain(..).collect();
        for (_, renderable) in drained {
            renderable.unmount();
        }
        self.inner.order.lock().clear();

        let fallback = self.inner.empty_visible.lock().take();
        if let Some(fallback) = fallback {
            fallback.unmount();
        }

        let point = self.inner.point.lock().take();
        if let Some(point) = point {
            point.clear();
        }
    }
}

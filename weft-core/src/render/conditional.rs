//! Conditional Directive (if / else-if / else)
//!
//! A first-true-wins chain of `(condition, renderable)` pairs plus an
//! optional fallback. Exactly one chain entry or the fallback is mounted at
//! any time; switching branches fully unmounts the old branch before
//! mounting the new one at the directive's marker.
//!
//! # Dead-Branch Elimination
//!
//! Conditions are a closed variant: a literal boolean or a boolean store.
//! Chain entries strictly after the first literal `true` are unreachable,
//! so their store-backed conditions are never subscribed to. Re-selecting
//! the branch that is already visible is a no-op (no remount).

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::host::{NodeRef, SharedHost};
use crate::store::{SharedStore, Store};

use super::renderable::{Disposables, MountPoint, RenderResult, Renderable};

/// A branch condition, decided at construction time.
pub enum Condition {
    Literal(bool),
    Reactive(SharedStore<bool>),
}

impl Condition {
    pub fn literal(value: bool) -> Self {
        Self::Literal(value)
    }

    pub fn store(store: impl Store<bool> + 'static) -> Self {
        Self::Reactive(Arc::new(store))
    }

    fn current(&self) -> bool {
        match self {
            Self::Literal(value) => *value,
            Self::Reactive(store) => store.value(),
        }
    }
}

/// Which branch is selected. Branch identity, not content, decides whether
/// a change re-mounts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Branch(usize),
    Fallback,
}

struct ConditionalInner {
    chain: RwLock<Vec<(Condition, Arc<dyn Renderable>)>>,
    fallback: RwLock<Option<Arc<dyn Renderable>>>,
    point: Mutex<Option<MountPoint>>,
    visible: Mutex<Option<(Selection, Arc<dyn Renderable>)>>,
    disposables: Disposables,
}

/// First-true-wins conditional rendering.
///
/// # Example
///
/// ```rust,ignore
/// let on = AtomStore::new(false);
///
/// let view = Conditional::when(Condition::store(on.clone()), Text::literal("on"))
///     .or_else(Text::literal("off"));
/// ```
pub struct Conditional {
    inner: Arc<ConditionalInner>,
}

impl Conditional {
    pub fn when(condition: Condition, renderable: impl Renderable + 'static) -> Self {
        Self {
            inner: Arc::new(ConditionalInner {
                chain: RwLock::new(vec![(condition, Arc::new(renderable))]),
                fallback: RwLock::new(None),
                point: Mutex::new(None),
                visible: Mutex::new(None),
                disposables: Disposables::new(),
            }),
        }
    }

    /// Append a further branch, evaluated only if everything before it is
    /// false.
    pub fn else_when(self, condition: Condition, renderable: impl Renderable + 'static) -> Self {
        self.inner
            .chain
            .write()
            .push((condition, Arc::new(renderable)));
        self
    }

    /// Set the branch mounted when no condition holds.
    pub fn or_else(self, renderable: impl Renderable + 'static) -> Self {
        *self.inner.fallback.write() = Some(Arc::new(renderable));
        self
    }

    fn select(inner: &ConditionalInner) -> Option<(Selection, Arc<dyn Renderable>)> {
        let chain = inner.chain.read();
        for (index, (condition, renderable)) in chain.iter().enumerate() {
            if condition.current() {
                return Some((Selection::Branch(index), Arc::clone(renderable)));
            }
        }
        inner
            .fallback
            .read()
            .clone()
            .map(|renderable| (Selection::Fallback, renderable))
    }

    /// Re-evaluate the chain and swap branches if the selection changed.
    fn apply(inner: &Arc<ConditionalInner>) -> RenderResult<()> {
        let point = match inner.point.lock().clone() {
            Some(point) => point,
            // Stale callback after unmount; subscriptions are severed on
            // unmount so this is only reachable mid-teardown.
            None => return Ok(()),
        };

        let next = Self::select(inner);
        let previous = {
            let mut visible = inner.visible.lock();
            let same = match (&*visible, &next) {
                (Some((current, _)), Some((selected, _))) => current == selected,
                (None, None) => true,
                _ => false,
            };
            if same {
                return Ok(());
            }
            visible.take()
        };

        if let Some((_, renderable)) = previous {
            renderable.unmount();
        }
        if let Some((selection, renderable)) = next {
            renderable.mount(&point.host, point.parent, Some(point.marker))?;
            tracing::debug!(?selection, "conditional switched branch");
            *inner.visible.lock() = Some((selection, renderable));
        }
        Ok(())
    }
}

impl Renderable for Conditional {
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.inner.disposables.reset();
        *self.inner.point.lock() = Some(MountPoint::place(host, parent, anchor));

        // Subscribe only to reachable store-backed conditions: everything
        // after the first literal `true` is dead.
        {
            let chain = self.inner.chain.read();
            for (condition, _) in chain.iter() {
                match condition {
                    Condition::Reactive(store) => {
                        let inner = Arc::clone(&self.inner);
                        self.inner
                            .disposables
                            .push(store.subscribe(Arc::new(move |_, _| {
                                if let Err(err) = Conditional::apply(&inner) {
                                    tracing::error!(%err, "conditional branch mount failed");
                                }
                            })));
                    }
                    Condition::Literal(true) => break,
                    Condition::Literal(false) => {}
                }
            }
        }

        Self::apply(&self.inner)
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let marker = {
            let mut point = self.inner.point.lock();
            let Some(point) = point.as_mut() else {
                tracing::warn!("move_to on unmounted conditional");
                return None;
            };
            point.host.insert_before(parent, point.marker, anchor);
            point.parent = parent;
            point.marker
        };

        let visible = self
            .inner
            .visible
            .lock()
            .as_ref()
            .map(|(_, renderable)| Arc::clone(renderable));
        let first = visible.and_then(|renderable| renderable.move_to(parent, Some(marker)));
        Some(first.unwrap_or(marker))
    }

    fn unmount(&self) {
        self.inner.disposables.dispose();

        let visible = self.inner.visible.lock().take();
        if let Some((_, renderable)) = visible {
            renderable.unmount();
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

    fn fixture() -> (Arc<MemoryHost>, SharedHost) {
        let host = Arc::new(MemoryHost::new());
        let shared: SharedHost = host.clone();
        (host, shared)
    }

    #[test]
    fn first_true_condition_wins() {
        let (host, shared) = fixture();
        let first = AtomStore::new(false);
        let second = AtomStore::new(true);

        let view = Conditional::when(Condition::store(first.clone()), Text::literal("A"))
            .else_when(Condition::store(second.clone()), Text::literal("B"))
            .or_else(Text::literal("C"));

        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(host.visible_texts(host.root()), vec!["B"]);
    }

    #[test]
    fn falls_back_when_no_condition_holds() {
        let (host, shared) = fixture();
        let first = AtomStore::new(false);
        let second = AtomStore::new(true);

        let view = Conditional::when(Condition::store(first.clone()), Text::literal("A"))
            .else_when(Condition::store(second.clone()), Text::literal("B"))
            .or_else(Text::literal("C"));
        view.mount(&shared, host.root(), None).unwrap();

        second.set(false);
        assert_eq!(host.visible_texts(host.root()), vec!["C"]);
    }

    #[test]
    fn nothing_is_mounted_without_match_or_fallback() {
        let (host, shared) = fixture();
        let condition = AtomStore::new(false);

        let view = Conditional::when(Condition::store(condition.clone()), Text::literal("A"));
        view.mount(&shared, host.root(), None).unwrap();

        // Only the marker.
        assert!(host.visible_texts(host.root()).is_empty());

        condition.set(true);
        assert_eq!(host.visible_texts(host.root()), vec!["A"]);
    }

    #[test]
    fn same_branch_reselection_does_not_remount() {
        let (host, shared) = fixture();
        let first = AtomStore::new(true);
        let second = AtomStore::new(false);

        let view = Conditional::when(Condition::store(first.clone()), Text::literal("A"))
            .else_when(Condition::store(second.clone()), Text::literal("B"));
        view.mount(&shared, host.root(), None).unwrap();
        let nodes_before = host.children_of(host.root());

        // Second condition flips but the first still wins.
        second.set(true);
        assert_eq!(host.children_of(host.root()), nodes_before);
    }

    #[test]
    fn branches_after_literal_true_are_never_subscribed() {
        let (host, shared) = fixture();
        let reachable = AtomStore::new(false);
        let dead = AtomStore::new(false);

        let view = Conditional::when(Condition::store(reachable.clone()), Text::literal("A"))
            .else_when(Condition::literal(true), Text::literal("B"))
            .else_when(Condition::store(dead.clone()), Text::literal("C"));
        view.mount(&shared, host.root(), None).unwrap();

        assert_eq!(host.visible_texts(host.root()), vec!["B"]);
        assert_eq!(reachable.subscriber_count(), 1);
        assert_eq!(dead.subscriber_count(), 0);

        view.unmount();
        assert_eq!(reachable.subscriber_count(), 0);
    }

    #[test]
    fn switch_unmounts_old_branch_before_mounting_new() {
        let (host, shared) = fixture();
        let condition = AtomStore::new(true);
        let inner = AtomStore::new(String::from("live"));

        let view = Conditional::when(
            Condition::store(condition.clone()),
            Text::reactive(inner.clone()),
        )
        .or_else(Text::literal("off"));
        view.mount(&shared, host.root(), None).unwrap();
        assert_eq!(inner.subscriber_count(), 1);

        condition.set(false);
        assert_eq!(host.visible_texts(host.root()), vec!["off"]);
        assert_eq!(inner.subscriber_count(), 0);

        condition.set(true);
        assert_eq!(host.visible_texts(host.root()), vec!["live"]);
        assert_eq!(inner.subscriber_count(), 1);
    }

    #[test]
    fn unmount_round_trip_releases_everything() {
        let (host, shared) = fixture();
        let condition = AtomStore::new(true);

        let view = Conditional::when(Condition::store(condition.clone()), Text::literal("A"));
        view.mount(&shared, host.root(), None).unwrap();
        view.unmount();
        view.unmount();

        assert_eq!(host.attached_count(), 0);
        assert_eq!(condition.subscriber_count(), 0);

        // Changing the store after unmount touches nothing.
        condition.set(false);
        assert_eq!(host.attached_count(), 0);
    }

    #[test]
    fn remounts_after_unmount() {
        let (host, shared) = fixture();
        let condition = AtomStore::new(true);

        let view = Conditional::when(Condition::store(condition.clone()), Text::literal("A"));
        view.mount(&shared, host.root(), None).unwrap();
        view.unmount();
        view.mount(&shared, host.root(), None).unwrap();

        assert_eq!(host.visible_texts(host.root()), vec!["A"]);
        assert_eq!(condition.subscriber_count(), 1);
    }
}

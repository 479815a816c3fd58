//! Keyed-Remount Directive
//!
//! Wraps one renderable and a key store. Any key change unconditionally
//! unmounts and remounts the child at the marker, even if the key is
//! logically "the same" child. This is the explicit force-re-create escape
//! hatch, in contrast to the list directive's identity-preserving reuse:
//! use it when non-reactive state inside the child must be reset.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::{NodeRef, SharedHost};
use crate::store::Source;

use super::renderable::{Disposables, MountPoint, RenderResult, Renderable};

struct KeyedInner {
    key: Arc<dyn Source>,
    child: Arc<dyn Renderable>,
    point: Mutex<Option<MountPoint>>,
    disposables: Disposables,
}

/// Re-create-on-key-change wrapper.
///
/// The key's *value identity* drives teardown: the stores already gate
/// notification on inequality, so every ping received here means the key
/// really changed.
pub struct Keyed {
    inner: Arc<KeyedInner>,
}

impl Keyed {
    pub fn new(key: impl Source + 'static, child: impl Renderable + 'static) -> Self {
        Self {
            inner: Arc::new(KeyedInner {
                key: Arc::new(key),
                child: Arc::new(child),
                point: Mutex::new(None),
                disposables: Disposables::new(),
            }),
        }
    }
}

impl Renderable for Keyed {
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.inner.disposables.reset();
        let point = MountPoint::place(host, parent, anchor);
        *self.inner.point.lock() = Some(point.clone());

        let inner = Arc::clone(&self.inner);
        self.inner
            .disposables
            .push(self.inner.key.subscribe_source(Arc::new(move || {
                let point = match inner.point.lock().clone() {
                    Some(point) => point,
                    None => return,
                };
                tracing::debug!("key changed; recreating child");
                inner.child.unmount();
                if let Err(err) = inner
                    .child
                    .mount(&point.host, point.parent, Some(point.marker))
                {
                    tracing::error!(%err, "keyed remount failed");
                }
            })));

        self.inner
            .child
            .mount(&point.host, point.parent, Some(point.marker))
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let marker = {
            let mut point = self.inner.point.lock();
            let Some(point) = point.as_mut() else {
                tracing::warn!("move_to on unmounted keyed directive");
                return None;
            };
            point.host.insert_before(parent, point.marker, anchor);
            point.parent = parent;
            point.marker
        };

        let first = self.inner.child.move_to(parent, Some(marker));
        Some(first.unwrap_or(marker))
    }

    fn unmount(&self) {
        self.inner.disposables.dispose();
        self.inner.child.unmount();

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
    use crate::store::{AtomStore, Store};

    fn fixture() -> (Arc<MemoryHost>, SharedHost) {
        let host = Arc::new(MemoryHost::new());
        let shared: SharedHost = host.clone();
        (host, shared)
    }

    #[test]
    fn key_change_recreates_the_child() {
        let (host, shared) = fixture();
        let key = AtomStore::new(1);
        // The child renders the key's value at mount time only; a plain
        // subscriber would never see it change.
        let label = key.clone();
        let keyed = Keyed::new(
            key.clone(),
            Text::reactive(crate::store::derive(
                vec![key.as_source()],
                move || label.value().to_string(),
            )),
        );

        keyed.mount(&shared, host.root(), None).unwrap();
        let node_before = host.children_of(host.root())[0];
        assert_eq!(host.visible_texts(host.root()), vec!["1"]);

        key.set(2);
        assert_eq!(host.visible_texts(host.root()), vec!["2"]);
        let node_after = host.children_of(host.root())[0];
        assert_ne!(node_before, node_after);
    }

    #[test]
    fn equal_key_write_does_not_remount() {
        let (host, shared) = fixture();
        let key = AtomStore::new(1);
        let keyed = Keyed::new(key.clone(), Text::literal("child"));

        keyed.mount(&shared, host.root(), None).unwrap();
        let nodes_before = host.children_of(host.root());

        key.set(1);
        assert_eq!(host.children_of(host.root()), nodes_before);
    }

    #[test]
    fn unmount_round_trip_releases_everything() {
        let (host, shared) = fixture();
        let key = AtomStore::new(1);
        let keyed = Keyed::new(key.clone(), Text::literal("child"));

        keyed.mount(&shared, host.root(), None).unwrap();
        assert_eq!(key.subscriber_count(), 1);

        keyed.unmount();
        keyed.unmount();

        assert_eq!(host.attached_count(), 0);
        assert_eq!(key.subscriber_count(), 0);

        key.set(2);
        assert_eq!(host.attached_count(), 0);
    }
}

//! Renderable Lifecycle
//!
//! A Renderable is a unit with a three-phase lifecycle projecting reactive
//! state into a host tree:
//!
//! ```text
//! unmounted -[mount]-> mounted -[move_to]-> mounted -[unmount]-> unmounted
//! ```
//!
//! # The Contract
//!
//! - `mount` resets the disposal list, performs all host insertion and
//!   subscription wiring, and records every subscription or resource it
//!   creates into the instance's [`Disposables`].
//!
//! - `move_to` relocates already-created host nodes without re-running
//!   construction. It returns the node a *preceding* sibling must use as
//!   its insertion anchor (the first node of this renderable's span), or
//!   `None` when the renderable occupies no host nodes. Siblings are
//!   repositioned last-to-first, threading this anchor between them.
//!
//! - `unmount` runs the disposables in recorded order, removes host nodes,
//!   and severs all subscriptions. It must be safe when the instance was
//!   never mounted or only partially mounted (a failed mount), and double
//!   unmount is a no-op.
//!
//! Calling `move_to` before any mount is a precondition violation: it is
//! reported via `tracing::warn!` and returns `None` rather than failing
//! hard. `unmount` before mount is the required no-op.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::host::{NodeRef, SharedHost};

/// Cleanup callback recorded during mount and run during unmount.
pub type Disposable = Box<dyn FnOnce() + Send>;

/// Errors surfaced by the renderable engine.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A renderable failed while mounting. Propagates to whoever owns the
    /// mount call chain unless a `Boundary` intercepts it.
    #[error("mount failed: {0}")]
    Mount(String),
}

impl RenderError {
    pub fn mount(reason: impl Into<String>) -> Self {
        Self::Mount(reason.into())
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

/// A unit with mount/move/unmount lifecycle projecting into a host tree.
pub trait Renderable: Send + Sync {
    /// Insert this renderable into `parent`, just before `anchor`.
    fn mount(&self, host: &SharedHost, parent: NodeRef, anchor: Option<NodeRef>)
        -> RenderResult<()>;

    /// Reposition already-created host nodes. Returns the anchor a
    /// preceding sibling should insert before.
    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef>;

    /// Tear down host nodes and subscriptions. Safe to call repeatedly.
    fn unmount(&self);
}

/// Ordered list of cleanup callbacks owned by a renderable.
///
/// Mount resets the list; unmount drains it and runs every entry in the
/// order recorded.
#[derive(Clone, Default)]
pub struct Disposables {
    items: Arc<Mutex<Vec<Disposable>>>,
}

impl Disposables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any previously recorded entries without running them.
    pub fn reset(&self) {
        self.items.lock().clear();
    }

    pub fn push(&self, disposable: Disposable) {
        self.items.lock().push(disposable);
    }

    /// Drain and run every entry in recorded order.
    pub fn dispose(&self) {
        let drained = std::mem::take(&mut *self.items.lock());
        for disposable in drained {
            disposable();
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Where a directive is anchored in the host tree.
///
/// Every structural directive owns one empty text node as a stable
/// *trailing* anchor: children mount before the marker, and a
/// whole-directive move repositions the marker first. The directive
/// exclusively owns its marker; children never hold a reference back.
#[derive(Clone)]
pub(crate) struct MountPoint {
    pub host: SharedHost,
    pub parent: NodeRef,
    pub marker: NodeRef,
}

impl MountPoint {
    /// Create the marker node and anchor it at the mount position.
    pub fn place(host: &SharedHost, parent: NodeRef, anchor: Option<NodeRef>) -> Self {
        let marker = host.create_text("");
        host.insert_before(parent, marker, anchor);
        Self {
            host: Arc::clone(host),
            parent,
            marker,
        }
    }

    /// Remove the marker from the host tree.
    pub fn clear(&self) {
        self.host.remove(self.parent, self.marker);
    }
}

//! Error Boundary
//!
//! Wraps a child renderable; if the child's mount fails, the failure is
//! contained here instead of propagating to the caller. The boundary swaps
//! in a fallback renderable so the rest of the tree mounts normally.
//!
//! The boundary owns no marker of its own: whichever of the two renderables
//! is active manages its own span, and `move_to`/`unmount` delegate to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::host::{NodeRef, SharedHost};

use super::renderable::{RenderResult, Renderable};

/// Contains a child's mount failure behind a fallback renderable.
pub struct Boundary {
    child: Arc<dyn Renderable>,
    fallback: Arc<dyn Renderable>,
    failed: AtomicBool,
}

impl Boundary {
    pub fn new(child: impl Renderable + 'static, fallback: impl Renderable + 'static) -> Self {
        Self {
            child: Arc::new(child),
            fallback: Arc::new(fallback),
            failed: AtomicBool::new(false),
        }
    }

    fn active(&self) -> &Arc<dyn Renderable> {
        if self.failed.load(Ordering::SeqCst) {
            &self.fallback
        } else {
            &self.child
        }
    }
}

impl Renderable for Boundary {
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.failed.store(false, Ordering::SeqCst);
        match self.child.mount(host, parent, anchor) {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(%err, "child mount failed; showing fallback");
                // The child may have attached part of itself before the
                // failure.
                self.child.unmount();
                self.failed.store(true, Ordering::SeqCst);
                self.fallback.mount(host, parent, anchor)
            }
        }
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        self.active().move_to(parent, anchor)
    }

    fn unmount(&self) {
        self.active().unmount();
    }
}

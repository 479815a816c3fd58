//! Text and Fragment Renderables
//!
//! The leaf building blocks of a render tree. A [`Text`] projects a single
//! host text node, either static or driven by a string store. A
//! [`Fragment`] is an ordered sequence of children behind one trailing
//! marker.
//!
//! Children arrive as a closed [`Child`] variant decided at construction
//! time (literal text, reactive text, or a nested renderable); there is no
//! runtime type sniffing.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::host::{NodeRef, SharedHost};
use crate::store::{SharedStore, Store};

use super::renderable::{Disposables, MountPoint, RenderResult, Renderable};

/// A child of a fragment, tagged at construction time.
pub enum Child {
    /// Static text.
    Literal(String),
    /// Text driven by a store; rewritten in place on change.
    Reactive(SharedStore<String>),
    /// A nested renderable.
    Node(Arc<dyn Renderable>),
}

impl Child {
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    pub fn reactive(store: impl Store<String> + 'static) -> Self {
        Self::Reactive(Arc::new(store))
    }

    pub fn node(renderable: impl Renderable + 'static) -> Self {
        Self::Node(Arc::new(renderable))
    }
}

enum TextContent {
    Literal(String),
    Reactive(SharedStore<String>),
}

struct TextState {
    host: SharedHost,
    parent: NodeRef,
    node: NodeRef,
}

/// A single host text node, optionally store-driven.
pub struct Text {
    content: TextContent,
    state: Mutex<Option<TextState>>,
    disposables: Disposables,
}

impl Text {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            content: TextContent::Literal(text.into()),
            state: Mutex::new(None),
            disposables: Disposables::new(),
        }
    }

    pub fn reactive(store: impl Store<String> + 'static) -> Self {
        Self::reactive_shared(Arc::new(store))
    }

    fn reactive_shared(store: SharedStore<String>) -> Self {
        Self {
            content: TextContent::Reactive(store),
            state: Mutex::new(None),
            disposables: Disposables::new(),
        }
    }
}

impl Renderable for Text {
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        self.disposables.reset();

        let initial = match &self.content {
            TextContent::Literal(text) => text.clone(),
            TextContent::Reactive(store) => store.value(),
        };
        let node = host.create_text(&initial);
        host.insert_before(parent, node, anchor);
        *self.state.lock() = Some(TextState {
            host: Arc::clone(host),
            parent,
            node,
        });

        if let TextContent::Reactive(store) = &self.content {
            let host = Arc::clone(host);
            self.disposables.push(store.subscribe(Arc::new(move |next, _| {
                host.set_text(node, next);
            })));
        }

        Ok(())
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let mut state = self.state.lock();
        let Some(state) = state.as_mut() else {
            tracing::warn!("move_to on unmounted text");
            return None;
        };
        state.host.insert_before(parent, state.node, anchor);
        state.parent = parent;
        Some(state.node)
    }

    fn unmount(&self) {
        self.disposables.dispose();
        let state = self.state.lock().take();
        if let Some(state) = state {
            state.host.remove(state.parent, state.node);
        }
    }
}

/// An ordered sequence of children behind one trailing marker.
pub struct Fragment {
    children: Vec<Arc<dyn Renderable>>,
    point: Mutex<Option<MountPoint>>,
}

impl Fragment {
    pub fn new(children: Vec<Child>) -> Self {
        let children = children
            .into_iter()
            .map(|child| match child {
                Child::Literal(text) => Arc::new(Text::literal(text)) as Arc<dyn Renderable>,
                Child::Reactive(store) => {
                    Arc::new(Text::reactive_shared(store)) as Arc<dyn Renderable>
                }
                Child::Node(renderable) => renderable,
            })
            .collect();
        Self {
            children,
            point: Mutex::new(None),
        }
    }
}

impl Renderable for Fragment {
    fn mount(
        &self,
        host: &SharedHost,
        parent: NodeRef,
        anchor: Option<NodeRef>,
    ) -> RenderResult<()> {
        let point = MountPoint::place(host, parent, anchor);
        let marker = point.marker;
        // Record the point before mounting children so a partial failure
        // still unmounts cleanly.
        *self.point.lock() = Some(point);

        for child in &self.children {
            child.mount(host, parent, Some(marker))?;
        }
        Ok(())
    }

    fn move_to(&self, parent: NodeRef, anchor: Option<NodeRef>) -> Option<NodeRef> {
        let mut point = self.point.lock();
        let Some(point) = point.as_mut() else {
            tracing::warn!("move_to on unmounted fragment");
            return None;
        };
        point.host.insert_before(parent, point.marker, anchor);
        point.parent = parent;

        let mut last = point.marker;
        for child in self.children.iter().rev() {
            if let Some(first) = child.move_to(parent, Some(last)) {
                last = first;
            }
        }
        Some(last)
    }

    fn unmount(&self) {
        let point = self.point.lock().take();
        let Some(point) = point else {
            return;
        };
        for child in &self.children {
            child.unmount();
        }
        point.clear();
    }
}

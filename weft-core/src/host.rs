//! Host Tree Interface
//!
//! The renderable engine never touches a concrete document directly. It
//! consumes the small set of primitives below, and adapter crates map them
//! onto a real host (browser DOM, terminal scene graph, ...).
//!
//! Structural mutation is limited to `insert_before` and `remove`;
//! `set_text` rewrites a text node's content in place and is the only
//! non-structural write the core performs.
//!
//! [`MemoryHost`] is the in-crate reference implementation: an ordered
//! in-memory tree used by the test suite and for headless rendering.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Opaque handle to a node owned by a host.
///
/// The host assigns raw ids; the core only stores and passes them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(u64);

impl NodeRef {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The boundary contract between the core and a concrete document tree.
///
/// Inserting a node that is already attached detaches it from its old
/// position first (move semantics, matching DOM `insertBefore`). An anchor
/// of `None` appends at the end of the parent's children.
pub trait Host: Send + Sync {
    /// Create a detached text node.
    fn create_text(&self, content: &str) -> NodeRef;

    /// Insert `node` into `parent` just before `anchor` (append if `None`).
    fn insert_before(&self, parent: NodeRef, node: NodeRef, anchor: Option<NodeRef>);

    /// Detach `node` from `parent`.
    fn remove(&self, parent: NodeRef, node: NodeRef);

    /// Rewrite a text node's content. Non-structural.
    fn set_text(&self, node: NodeRef, content: &str);
}

/// Shared handle to a host.
pub type SharedHost = Arc<dyn Host>;

#[derive(Debug)]
struct NodeData {
    text: String,
    parent: Option<NodeRef>,
    children: Vec<NodeRef>,
}

/// Ordered in-memory host tree.
///
/// Misuse (unknown nodes, an anchor that is not a child of the target
/// parent) panics: this host exists to catch engine bugs, not to tolerate
/// them.
pub struct MemoryHost {
    nodes: RwLock<HashMap<NodeRef, NodeData>>,
    next_id: AtomicU64,
}

impl MemoryHost {
    const ROOT: NodeRef = NodeRef(0);

    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            Self::ROOT,
            NodeData {
                text: String::new(),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            next_id: AtomicU64::new(1),
        }
    }

    /// The mount point every test tree hangs off.
    pub fn root(&self) -> NodeRef {
        Self::ROOT
    }

    /// Direct children of `parent`, in document order.
    pub fn children_of(&self, parent: NodeRef) -> Vec<NodeRef> {
        self.nodes.read()[&parent].children.clone()
    }

    /// Current content of a text node.
    pub fn text_of(&self, node: NodeRef) -> String {
        self.nodes.read()[&node].text.clone()
    }

    /// Contents of `parent`'s direct children, in document order.
    /// Empty marker nodes show up as empty strings.
    pub fn child_texts(&self, parent: NodeRef) -> Vec<String> {
        let nodes = self.nodes.read();
        nodes[&parent]
            .children
            .iter()
            .map(|child| nodes[child].text.clone())
            .collect()
    }

    /// Contents of `parent`'s non-empty direct children, in document order.
    pub fn visible_texts(&self, parent: NodeRef) -> Vec<String> {
        self.child_texts(parent)
            .into_iter()
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// Whether `node` is reachable from the root.
    pub fn is_attached(&self, node: NodeRef) -> bool {
        let nodes = self.nodes.read();
        let mut current = node;
        loop {
            if current == Self::ROOT {
                return true;
            }
            match nodes.get(&current).and_then(|data| data.parent) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Number of nodes attached below the root.
    pub fn attached_count(&self) -> usize {
        let nodes = self.nodes.read();
        let mut count = 0;
        let mut stack = vec![Self::ROOT];
        while let Some(node) = stack.pop() {
            let data = &nodes[&node];
            count += data.children.len();
            stack.extend(data.children.iter().copied());
        }
        count
    }

    fn detach(nodes: &mut HashMap<NodeRef, NodeData>, node: NodeRef) {
        let parent = nodes
            .get_mut(&node)
            .expect("unknown node")
            .parent
            .take();
        if let Some(parent) = parent {
            let siblings = &mut nodes.get_mut(&parent).expect("unknown parent").children;
            siblings.retain(|it| *it != node);
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn create_text(&self, content: &str) -> NodeRef {
        let node = NodeRef(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.write().insert(
            node,
            NodeData {
                text: content.to_string(),
                parent: None,
                children: Vec::new(),
            },
        );
        node
    }

    fn insert_before(&self, parent: NodeRef, node: NodeRef, anchor: Option<NodeRef>) {
        let mut nodes = self.nodes.write();
        Self::detach(&mut nodes, node);

        nodes.get_mut(&node).expect("unknown node").parent = Some(parent);
        let siblings = &mut nodes.get_mut(&parent).expect("unknown parent").children;
        let index = match anchor {
            Some(anchor) => siblings
                .iter()
                .position(|it| *it == anchor)
                .expect("anchor is not a child of the target parent"),
            None => siblings.len(),
        };
        siblings.insert(index, node);
    }

    fn remove(&self, parent: NodeRef, node: NodeRef) {
        let mut nodes = self.nodes.write();
        debug_assert_eq!(nodes[&node].parent, Some(parent));
        Self::detach(&mut nodes, node);
    }

    fn set_text(&self, node: NodeRef, content: &str) {
        self.nodes.write().get_mut(&node).expect("unknown node").text = content.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_appends_without_anchor() {
        let host = MemoryHost::new();
        let a = host.create_text("a");
        let b = host.create_text("b");

        host.insert_before(host.root(), a, None);
        host.insert_before(host.root(), b, None);

        assert_eq!(host.child_texts(host.root()), vec!["a", "b"]);
    }

    #[test]
    fn insert_before_anchor_places_node_ahead() {
        let host = MemoryHost::new();
        let a = host.create_text("a");
        let b = host.create_text("b");

        host.insert_before(host.root(), a, None);
        host.insert_before(host.root(), b, Some(a));

        assert_eq!(host.child_texts(host.root()), vec!["b", "a"]);
    }

    #[test]
    fn reinsert_moves_instead_of_duplicating() {
        let host = MemoryHost::new();
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");
        for node in [a, b, c] {
            host.insert_before(host.root(), node, None);
        }

        host.insert_before(host.root(), c, Some(a));

        assert_eq!(host.child_texts(host.root()), vec!["c", "a", "b"]);
        assert_eq!(host.attached_count(), 3);
    }

    #[test]
    fn remove_detaches_subtree() {
        let host = MemoryHost::new();
        let a = host.create_text("a");
        let b = host.create_text("b");
        host.insert_before(host.root(), a, None);
        host.insert_before(a, b, None);

        assert!(host.is_attached(b));
        host.remove(host.root(), a);

        assert!(!host.is_attached(a));
        assert!(!host.is_attached(b));
        assert_eq!(host.attached_count(), 0);
    }

    #[test]
    fn set_text_rewrites_in_place() {
        let host = MemoryHost::new();
        let a = host.create_text("before");
        host.insert_before(host.root(), a, None);

        host.set_text(a, "after");
        assert_eq!(host.text_of(a), "after");
        assert_eq!(host.child_texts(host.root()), vec!["after"]);
    }
}

//! The UI-facing tree projection.
//!
//! `TreeMirror` is a strict structural projection of the visible part of
//! the domain tree: a slotmap arena of entries under a hidden synthetic
//! root, each entry holding a back-reference to its domain node, ordered
//! child keys, and a dirty flag for the re-render pass. The mirror holds
//! no structural state of its own; the synchronizer keeps it equal to the
//! filtered, sorted domain tree at all times.
//!
//! All structural mutation must happen on the dispatch thread; mutating
//! methods assert this in debug builds.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use cloudscape_core::DispatchAffinity;

use crate::logging::targets;
use crate::model::{Node, NodeId};

new_key_type! {
    /// Key of one mirror entry.
    ///
    /// This is what the host widget reports back for pointer hits; the
    /// session resolves it to the domain node through the mirror.
    pub struct MirrorKey;
}

/// Comparator deciding sibling order in the mirror.
pub type SortComparator = Arc<dyn Fn(&Node, &Node) -> Ordering + Send + Sync>;

/// The default sibling order: `(priority, label)` ascending.
pub fn default_comparator() -> SortComparator {
    Arc::new(|a, b| {
        a.priority()
            .cmp(&b.priority())
            .then_with(|| a.label().cmp(&b.label()))
    })
}

/// One entry of the mirror.
struct MirrorEntry {
    /// Domain node back-reference; `None` only for the hidden root.
    node: Option<Arc<Node>>,
    parent: Option<MirrorKey>,
    /// Comparator-ordered child keys.
    children: Vec<MirrorKey>,
    dirty: bool,
}

/// The projected tree.
///
/// A hidden synthetic root lets multiple independent top-level roots
/// (favorites, app-centric view, resource modules) live under one widget.
pub struct TreeMirror {
    arena: SlotMap<MirrorKey, MirrorEntry>,
    by_node: HashMap<NodeId, MirrorKey>,
    root: MirrorKey,
    affinity: DispatchAffinity,
}

impl TreeMirror {
    /// Create an empty mirror bound to the current thread.
    ///
    /// Must be called on the dispatch thread; all later structural
    /// mutation is checked against that thread.
    pub fn new() -> Self {
        let mut arena = SlotMap::with_key();
        let root = arena.insert(MirrorEntry {
            node: None,
            parent: None,
            children: Vec::new(),
            dirty: false,
        });
        Self {
            arena,
            by_node: HashMap::new(),
            root,
            affinity: DispatchAffinity::current(),
        }
    }

    /// The hidden synthetic root.
    pub fn root(&self) -> MirrorKey {
        self.root
    }

    /// Number of entries, excluding the hidden root.
    pub fn len(&self) -> usize {
        self.arena.len() - 1
    }

    /// Whether the mirror holds no entries besides the hidden root.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The domain node behind an entry. `None` for the hidden root and for
    /// keys already detached.
    pub fn node_at(&self, key: MirrorKey) -> Option<Arc<Node>> {
        self.arena.get(key).and_then(|entry| entry.node.clone())
    }

    /// Resolve a domain node to its mirror entry.
    pub fn find(&self, node_id: NodeId) -> Option<MirrorKey> {
        self.by_node.get(&node_id).copied()
    }

    /// The parent key of an entry.
    pub fn parent_of(&self, key: MirrorKey) -> Option<MirrorKey> {
        self.arena.get(key).and_then(|entry| entry.parent)
    }

    /// Ordered child keys of an entry.
    pub fn children_of(&self, key: MirrorKey) -> Vec<MirrorKey> {
        self.arena
            .get(key)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    /// Insert a node under a parent entry at its comparator position.
    ///
    /// Equal elements keep insertion order (stable among ties).
    pub fn insert_child(
        &mut self,
        parent: MirrorKey,
        node: Arc<Node>,
        comparator: &SortComparator,
    ) -> MirrorKey {
        self.affinity.debug_assert_on_thread();
        debug_assert!(
            !self.by_node.contains_key(&node.id()),
            "node already mirrored"
        );

        let node_id = node.id();
        let key = self.arena.insert(MirrorEntry {
            node: Some(node.clone()),
            parent: Some(parent),
            children: Vec::new(),
            dirty: false,
        });
        self.by_node.insert(node_id, key);

        let siblings = &self.arena[parent].children;
        let position = siblings
            .iter()
            .position(|&sibling_key| {
                let sibling = self.arena[sibling_key]
                    .node
                    .as_ref()
                    .expect("sibling entry has a node");
                comparator(&node, sibling) == Ordering::Less
            })
            .unwrap_or(siblings.len());
        self.arena[parent].children.insert(position, key);

        key
    }

    /// Detach a whole subtree from the arena and the lookup table.
    ///
    /// Returns the `NodeId`s of every removed entry (the subtree root
    /// first). Detaching the hidden root is not allowed.
    pub fn detach(&mut self, key: MirrorKey) -> Vec<NodeId> {
        self.affinity.debug_assert_on_thread();
        debug_assert_ne!(key, self.root, "cannot detach the hidden root");

        let Some(parent) = self.parent_of(key) else {
            tracing::debug!(target: targets::MIRROR, "detach of unknown mirror key ignored");
            return Vec::new();
        };
        self.arena[parent].children.retain(|&child| child != key);

        let mut removed = Vec::new();
        self.remove_subtree(key, &mut removed);
        removed
    }

    fn remove_subtree(&mut self, key: MirrorKey, removed: &mut Vec<NodeId>) {
        let Some(entry) = self.arena.remove(key) else {
            return;
        };
        if let Some(node) = entry.node {
            self.by_node.remove(&node.id());
            removed.push(node.id());
        }
        for child in entry.children {
            self.remove_subtree(child, removed);
        }
    }

    /// Mark an entry as needing re-render.
    pub fn mark_dirty(&mut self, key: MirrorKey) {
        self.affinity.debug_assert_on_thread();
        if let Some(entry) = self.arena.get_mut(key) {
            entry.dirty = true;
        }
    }

    /// Whether an entry is marked dirty.
    pub fn is_dirty(&self, key: MirrorKey) -> bool {
        self.arena.get(key).is_some_and(|entry| entry.dirty)
    }

    /// Collect and clear all dirty marks (the re-render pass).
    pub fn take_dirty(&mut self) -> Vec<MirrorKey> {
        self.affinity.debug_assert_on_thread();
        let mut dirty = Vec::new();
        for (key, entry) in self.arena.iter_mut() {
            if entry.dirty {
                entry.dirty = false;
                dirty.push(key);
            }
        }
        dirty
    }
}

impl Default for TreeMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn node(name: &str, priority: i32) -> Arc<Node> {
        Node::builder(name).priority(priority).build()
    }

    fn labels(mirror: &TreeMirror, parent: MirrorKey) -> Vec<String> {
        mirror
            .children_of(parent)
            .into_iter()
            .map(|key| mirror.node_at(key).unwrap().label())
            .collect()
    }

    #[test]
    fn test_sorted_insertion() {
        let mut mirror = TreeMirror::new();
        let cmp = default_comparator();
        let root = mirror.root();

        mirror.insert_child(root, node("zeta", 0), &cmp);
        mirror.insert_child(root, node("alpha", 0), &cmp);
        mirror.insert_child(root, node("first", -1), &cmp);
        mirror.insert_child(root, node("last", 9), &cmp);

        assert_eq!(labels(&mirror, root), vec!["first", "alpha", "zeta", "last"]);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut mirror = TreeMirror::new();
        let cmp: SortComparator = Arc::new(|a, b| a.priority().cmp(&b.priority()));
        let root = mirror.root();

        mirror.insert_child(root, node("one", 0), &cmp);
        mirror.insert_child(root, node("two", 0), &cmp);
        mirror.insert_child(root, node("three", 0), &cmp);

        assert_eq!(labels(&mirror, root), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_hidden_root_holds_multiple_top_levels() {
        let mut mirror = TreeMirror::new();
        let cmp = default_comparator();
        let root = mirror.root();

        let favorites = mirror.insert_child(root, node("favorites", -10), &cmp);
        let resources = mirror.insert_child(root, node("resources", 0), &cmp);

        assert!(mirror.node_at(root).is_none());
        assert_eq!(mirror.parent_of(favorites), Some(root));
        assert_eq!(mirror.parent_of(resources), Some(root));
        assert_eq!(mirror.len(), 2);
    }

    #[test]
    fn test_find_resolves_node() {
        let mut mirror = TreeMirror::new();
        let cmp = default_comparator();
        let n = node("target", 0);
        let key = mirror.insert_child(mirror.root(), n.clone(), &cmp);

        assert_eq!(mirror.find(n.id()), Some(key));
        assert_eq!(mirror.node_at(key).unwrap().id(), n.id());
    }

    #[test]
    fn test_detach_removes_subtree_and_index() {
        let mut mirror = TreeMirror::new();
        let cmp = default_comparator();
        let root = mirror.root();

        let top = node("top", 0);
        let mid = node("mid", 0);
        let leaf = node("leaf", 0);
        let top_key = mirror.insert_child(root, top.clone(), &cmp);
        let mid_key = mirror.insert_child(top_key, mid.clone(), &cmp);
        mirror.insert_child(mid_key, leaf.clone(), &cmp);
        let keep_key = mirror.insert_child(root, node("keep", 0), &cmp);

        let removed = mirror.detach(top_key);

        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0], top.id());
        assert!(mirror.find(top.id()).is_none());
        assert!(mirror.find(mid.id()).is_none());
        assert!(mirror.find(leaf.id()).is_none());
        assert_eq!(mirror.children_of(root), vec![keep_key]);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_dirty_marks() {
        let mut mirror = TreeMirror::new();
        let cmp = default_comparator();
        let key = mirror.insert_child(mirror.root(), node("n", 0), &cmp);

        assert!(!mirror.is_dirty(key));
        mirror.mark_dirty(key);
        assert!(mirror.is_dirty(key));

        let dirty = mirror.take_dirty();
        assert_eq!(dirty, vec![key]);
        assert!(!mirror.is_dirty(key));
        assert!(mirror.take_dirty().is_empty());
    }
}

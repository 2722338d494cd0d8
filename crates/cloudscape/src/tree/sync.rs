//! Keeps the mirror equal to the visible domain tree.
//!
//! The synchronizer binds each visible node's children list (and property
//! signal) to its mirror entry. Binding happens exactly once per node;
//! attaching a node that already carries pre-populated descendants builds
//! the whole subtree recursively. Unbinding is symmetric: listeners come
//! off and the mirror subtree is detached in one pass.
//!
//! Change events may be emitted from any thread (loads complete on the
//! pool). Off-thread events are marshaled to the dispatch thread through
//! the blocking [`Dispatcher::invoke`] hand-off, so events from one list
//! apply in emission order and the emitter resumes only after the mirror
//! reflects its mutation.
//!
//! After each applied event the affected parent entry is marked dirty and
//! [`on_render_requested`](Synchronizer::on_render_requested) fires exactly
//! once, bounding render cost to one pass per event.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use cloudscape_core::{ConnectionId, DispatchResult, Dispatcher, Signal};

use crate::logging::targets;
use crate::model::{ChangeEvent, ChangeKind, LoadState, Node, NodeId};
use crate::tree::mirror::{MirrorKey, SortComparator, TreeMirror};

/// Decides which domain nodes are projected into the mirror.
pub type VisibilityPredicate = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// The default predicate: hide nodes carrying the legacy flag.
pub fn default_predicate() -> VisibilityPredicate {
    Arc::new(|node| !node.is_legacy())
}

/// Listener registrations for one bound node.
struct Binding {
    key: MirrorKey,
    node: Weak<Node>,
    children_conn: ConnectionId,
    changed_conn: ConnectionId,
}

/// Binds domain nodes to mirror entries and applies change events.
///
/// # Thread Safety
///
/// The synchronizer is shared freely (`Arc<Synchronizer>`); all mirror
/// mutation happens on the dispatch thread.
pub struct Synchronizer {
    dispatcher: Arc<Dispatcher>,
    mirror: Mutex<TreeMirror>,
    bindings: Mutex<HashMap<NodeId, Binding>>,
    predicate: VisibilityPredicate,
    comparator: SortComparator,
    /// Fires once per applied change event with the affected parent entry.
    render_requested: Signal<MirrorKey>,
}

impl Synchronizer {
    /// Create a synchronizer whose mirror lives on the dispatcher's thread.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        predicate: VisibilityPredicate,
        comparator: SortComparator,
    ) -> DispatchResult<Arc<Self>> {
        let mirror = dispatcher.invoke(TreeMirror::new)?;
        Ok(Arc::new(Self {
            dispatcher,
            mirror: Mutex::new(mirror),
            bindings: Mutex::new(HashMap::new()),
            predicate,
            comparator,
            render_requested: Signal::new(),
        }))
    }

    /// The dispatcher owning the mirror.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Fires once per applied change event.
    pub fn on_render_requested(&self) -> &Signal<MirrorKey> {
        &self.render_requested
    }

    /// Read-only access to the mirror.
    pub fn with_mirror<R>(&self, f: impl FnOnce(&TreeMirror) -> R) -> R {
        f(&self.mirror.lock())
    }

    /// Mutable access to the mirror (render pass bookkeeping).
    ///
    /// Structural mutation still asserts dispatch-thread affinity inside
    /// the mirror itself.
    pub fn with_mirror_mut<R>(&self, f: impl FnOnce(&mut TreeMirror) -> R) -> R {
        f(&mut self.mirror.lock())
    }

    /// Resolve a domain node to its mirror entry.
    pub fn find(&self, node_id: NodeId) -> Option<MirrorKey> {
        self.mirror.lock().find(node_id)
    }

    /// The domain node behind a mirror entry.
    pub fn node_at(&self, key: MirrorKey) -> Option<Arc<Node>> {
        self.mirror.lock().node_at(key)
    }

    /// Number of currently bound nodes.
    pub fn binding_count(&self) -> usize {
        self.bindings.lock().len()
    }

    /// Bind a top-level root under the hidden root.
    ///
    /// Returns `Ok(None)` when the visibility predicate rejects the node.
    /// Pre-populated descendants (grandchildren included) are built
    /// immediately.
    pub fn attach_root(self: &Arc<Self>, node: Arc<Node>) -> DispatchResult<Option<MirrorKey>> {
        let this = Arc::clone(self);
        self.dispatcher.invoke(move || {
            let root = this.mirror.lock().root();
            this.bind(node, root)
        })
    }

    /// Unbind a node and detach its mirror subtree.
    ///
    /// Returns `Ok(false)` when the node was not bound.
    pub fn detach(self: &Arc<Self>, node_id: NodeId) -> DispatchResult<bool> {
        let this = Arc::clone(self);
        self.dispatcher.invoke(move || this.unbind(node_id))
    }

    /// Bind one node under a parent entry and recurse into its children.
    ///
    /// Runs on the dispatch thread. Binding is idempotent: a node that is
    /// already bound keeps its existing entry. This also absorbs the window
    /// between connecting the children listener and snapshotting the list,
    /// where a load completing mid-attach queues an `Added` event for items
    /// the snapshot loop binds as well.
    fn bind(self: &Arc<Self>, node: Arc<Node>, parent_key: MirrorKey) -> Option<MirrorKey> {
        if let Some(existing) = self.bindings.lock().get(&node.id()).map(|b| b.key) {
            tracing::trace!(
                target: targets::SYNC,
                node = %node.name(),
                "node already bound"
            );
            return Some(existing);
        }
        if !(self.predicate)(&node) {
            tracing::trace!(
                target: targets::SYNC,
                node = %node.name(),
                "predicate rejected node"
            );
            return None;
        }

        let key = self
            .mirror
            .lock()
            .insert_child(parent_key, node.clone(), &self.comparator);
        let node_id = node.id();

        let this = Arc::downgrade(self);
        let children_conn = node.children().on_changed().connect(move |event| {
            if let Some(sync) = this.upgrade() {
                sync.on_children_changed(node_id, event.clone());
            }
        });
        let this = Arc::downgrade(self);
        let changed_conn = node.on_changed().connect(move |_| {
            if let Some(sync) = this.upgrade() {
                sync.on_node_changed(node_id);
            }
        });

        self.bindings.lock().insert(
            node_id,
            Binding {
                key,
                node: Arc::downgrade(&node),
                children_conn,
                changed_conn,
            },
        );

        for child in node.children().items() {
            self.bind(child, key);
        }
        Some(key)
    }

    /// Remove a binding, its listeners, and its mirror subtree.
    ///
    /// Runs on the dispatch thread.
    fn unbind(self: &Arc<Self>, node_id: NodeId) -> bool {
        let Some(binding) = self.bindings.lock().remove(&node_id) else {
            tracing::debug!(target: targets::SYNC, "stale unbind ignored");
            return false;
        };
        Self::disconnect_binding(&binding);

        let removed = self.mirror.lock().detach(binding.key);
        for descendant in removed {
            if descendant == node_id {
                continue;
            }
            if let Some(b) = self.bindings.lock().remove(&descendant) {
                Self::disconnect_binding(&b);
            }
        }
        true
    }

    fn disconnect_binding(binding: &Binding) {
        if let Some(node) = binding.node.upgrade() {
            node.children().on_changed().disconnect(binding.children_conn);
            node.on_changed().disconnect(binding.changed_conn);
        }
    }

    /// Children change listener: marshal to the dispatch thread, then apply.
    fn on_children_changed(self: &Arc<Self>, node_id: NodeId, event: ChangeEvent<Arc<Node>>) {
        if self.dispatcher.is_dispatch_thread() {
            self.apply_children_changed(node_id, event);
            return;
        }
        let this = Arc::clone(self);
        if let Err(err) = self
            .dispatcher
            .invoke(move || this.apply_children_changed(node_id, event))
        {
            tracing::warn!(
                target: targets::SYNC,
                error = %err,
                "dropping change event, dispatch context unavailable"
            );
        }
    }

    /// Apply one children change event. Runs on the dispatch thread.
    fn apply_children_changed(self: &Arc<Self>, node_id: NodeId, event: ChangeEvent<Arc<Node>>) {
        let Some(parent_key) = self.bindings.lock().get(&node_id).map(|b| b.key) else {
            tracing::debug!(
                target: targets::SYNC,
                "dropping change event for unbound node"
            );
            return;
        };

        match event.kind {
            ChangeKind::Added => {
                for child in event.items {
                    self.bind(child, parent_key);
                }
            }
            ChangeKind::Removed => {
                for child in &event.items {
                    self.unbind(child.id());
                }
            }
        }

        self.mirror.lock().mark_dirty(parent_key);
        self.render_requested.emit(parent_key);
    }

    /// Property change listener: repaint a single entry.
    fn on_node_changed(self: &Arc<Self>, node_id: NodeId) {
        if self.dispatcher.is_dispatch_thread() {
            self.apply_node_changed(node_id);
            return;
        }
        let this = Arc::clone(self);
        if let Err(err) = self.dispatcher.invoke(move || this.apply_node_changed(node_id)) {
            tracing::warn!(
                target: targets::SYNC,
                error = %err,
                "dropping property change, dispatch context unavailable"
            );
        }
    }

    fn apply_node_changed(self: &Arc<Self>, node_id: NodeId) {
        let Some((key, node)) = self
            .bindings
            .lock()
            .get(&node_id)
            .map(|b| (b.key, b.node.clone()))
        else {
            return;
        };

        // A destroyed node announces its terminal state through the same
        // signal; its subtree must leave the mirror even when no parent
        // list emits a removal (parentless attached roots).
        let destroyed = node
            .upgrade()
            .is_none_or(|n| n.load_state() == LoadState::Destroyed);
        if destroyed {
            let parent = self.mirror.lock().parent_of(key);
            self.unbind(node_id);
            if let Some(parent) = parent {
                self.mirror.lock().mark_dirty(parent);
                self.render_requested.emit(parent);
            }
            return;
        }

        self.mirror.lock().mark_dirty(key);
        self.render_requested.emit(key);
    }
}

//! The resource node model.
//!
//! A `Node` is one entry in the domain tree: a subscription, a service
//! module, a resource, or a grouping folder. Nodes own their children
//! through an [`ObservableList`], load them lazily through an externally
//! supplied [`ChildrenSupplier`], and carry the action set that drives the
//! context menu.
//!
//! # Key Types
//!
//! - [`Node`] / [`NodeBuilder`] - the tree entry and its constructor
//! - [`NodeId`] - process-unique identity for lookup tables
//! - [`LoadState`] - the children-loading state machine
//! - [`ChildrenSupplier`] / [`NodeFactory`] - the host integration contracts
//!
//! # Load State Machine
//!
//! ```text
//! NotLoaded ──load──> Loading ──ok──> Loaded
//!                        │                │
//!                        └──err──> Error ─┘ (load(true) retries)
//!
//! any state ──destroy──> Destroyed (terminal)
//! ```
//!
//! Loads run on the background pool; completions for a superseded load
//! epoch or a destroyed node are discarded.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use cloudscape_core::{CancellationToken, LoadPool, Signal};

use crate::action::ActionSet;
use crate::error::LoadError;
use crate::logging::targets;
use crate::model::observable::ObservableList;

/// Counter for unique node IDs.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity.
///
/// Names are only unique among siblings; lookup tables (mirror index, bus
/// payloads) key on `NodeId` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Children-loading state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Children have never been fetched.
    NotLoaded,
    /// A fetch is in flight.
    Loading,
    /// Children reflect the last successful fetch.
    Loaded,
    /// The last fetch failed; the node stays visible with the message.
    Error,
    /// The node has been destroyed. Terminal.
    Destroyed,
}

/// Reference to an icon in the host's icon registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconRef(String);

impl IconRef {
    /// Create an icon reference from a registry path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The registry path.
    pub fn path(&self) -> &str {
        &self.0
    }
}

/// Host-supplied children fetch.
///
/// Runs on the background load pool; must check the token during long
/// fetches. Failures surface as the node's `Error` state.
pub type ChildrenSupplier =
    Arc<dyn Fn(&CancellationToken) -> Result<Vec<Arc<Node>>, LoadError> + Send + Sync>;

/// Host-supplied construction of a node for a piece of domain data.
///
/// Returning `None` means the datum has no tree representation. A factory
/// must not mutate other nodes.
pub trait NodeFactory: Send + Sync {
    /// Build a node for `resource` as a child of `parent`.
    fn create_node(&self, parent: &Arc<Node>, resource: &dyn Any) -> Option<Arc<Node>>;
}

/// Mutable per-node state behind one lock.
struct NodeState {
    label: String,
    icon: Option<IconRef>,
    tooltip: Option<String>,
    load: LoadState,
    error: Option<String>,
    /// Bumped on every load start and on destroy; completions carrying an
    /// older epoch are stale.
    epoch: u64,
    /// Token for the in-flight load, if any.
    cancel: Option<CancellationToken>,
}

/// One entry in the domain tree.
///
/// Nodes are always handled as `Arc<Node>`; construction goes through
/// [`Node::builder`].
///
/// # Thread Safety
///
/// `Node` is `Send + Sync`. Children mutations announce themselves through
/// the children list's change signal; metadata and state changes through
/// [`on_changed`](Self::on_changed).
pub struct Node {
    id: NodeId,
    /// Sibling-unique name, fixed at construction.
    name: String,
    /// Sort key, orthogonal to structure.
    priority: i32,
    /// Capability flag: legacy nodes are hidden by the default visibility
    /// predicate.
    legacy: bool,
    state: RwLock<NodeState>,
    parent: RwLock<Weak<Node>>,
    children: ObservableList<Arc<Node>>,
    actions: ActionSet,
    supplier: Option<ChildrenSupplier>,
    /// Property-change notification (label, icon, load state).
    changed: Signal<()>,
}

impl Node {
    /// Start building a node with the given sibling-unique name.
    pub fn builder(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(name)
    }

    /// Process-unique identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Sibling-unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label.
    pub fn label(&self) -> String {
        self.state.read().label.clone()
    }

    /// Update the display label and notify listeners.
    pub fn set_label(&self, label: impl Into<String>) {
        self.state.write().label = label.into();
        self.changed.emit(());
    }

    /// Display icon.
    pub fn icon(&self) -> Option<IconRef> {
        self.state.read().icon.clone()
    }

    /// Update the display icon and notify listeners.
    pub fn set_icon(&self, icon: Option<IconRef>) {
        self.state.write().icon = icon;
        self.changed.emit(());
    }

    /// Tooltip text.
    pub fn tooltip(&self) -> Option<String> {
        self.state.read().tooltip.clone()
    }

    /// Update the tooltip and notify listeners.
    pub fn set_tooltip(&self, tooltip: Option<String>) {
        self.state.write().tooltip = tooltip;
        self.changed.emit(());
    }

    /// Sort priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether this node carries the legacy capability flag.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Current load state.
    pub fn load_state(&self) -> LoadState {
        self.state.read().load
    }

    /// Whether a fetch is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.load_state() == LoadState::Loading
    }

    /// The failure message from the last fetch, if the node is in `Error`.
    pub fn error_message(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    /// The parent node, if still alive.
    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.read().upgrade()
    }

    /// The children list. Mutated by loads and [`add_child`](Self::add_child).
    pub fn children(&self) -> &ObservableList<Arc<Node>> {
        &self.children
    }

    /// The node's action set.
    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    /// Property-change signal (label, icon, tooltip, load state).
    pub fn on_changed(&self) -> &Signal<()> {
        &self.changed
    }

    /// Attach a statically constructed child.
    ///
    /// Rejects children whose name collides with an existing sibling and
    /// any mutation of a destroyed node. Returns `true` if attached.
    pub fn add_child(self: &Arc<Self>, child: Arc<Node>) -> bool {
        if self.load_state() == LoadState::Destroyed {
            tracing::debug!(
                target: targets::MODEL,
                node = %self.name,
                "ignoring add_child on destroyed node"
            );
            return false;
        }
        if self
            .children
            .items()
            .iter()
            .any(|existing| existing.name == child.name)
        {
            tracing::warn!(
                target: targets::MODEL,
                node = %self.name,
                child = %child.name,
                "rejecting child with duplicate sibling name"
            );
            return false;
        }
        *child.parent.write() = Arc::downgrade(self);
        self.children.add(child);
        true
    }

    /// Start a children fetch on the background pool.
    ///
    /// Without `force` this is idempotent: a node that is `Loaded`, in
    /// `Error`, or already `Loading` does nothing. With `force` a `Loaded`
    /// or `Error` node refetches; a node that is already `Loading` still
    /// does nothing (exactly one fetch in flight per node). Destroyed nodes
    /// and nodes without a supplier never load.
    pub fn load(self: &Arc<Self>, force: bool) {
        let Some(supplier) = self.supplier.clone() else {
            return;
        };

        let (epoch, token) = {
            let mut st = self.state.write();
            let proceed = match st.load {
                LoadState::NotLoaded => true,
                LoadState::Loaded | LoadState::Error => force,
                LoadState::Loading | LoadState::Destroyed => false,
            };
            if !proceed {
                return;
            }
            st.load = LoadState::Loading;
            st.error = None;
            st.epoch += 1;
            let token = CancellationToken::new();
            st.cancel = Some(token.clone());
            (st.epoch, token)
        };
        self.changed.emit(());

        tracing::debug!(
            target: targets::MODEL,
            node = %self.name,
            epoch,
            "starting children load"
        );

        let node = Arc::clone(self);
        LoadPool::global().spawn(move || {
            let result = supplier(&token);
            node.apply_load_result(epoch, result);
        });
    }

    /// Apply a load completion, unless it is stale.
    fn apply_load_result(self: &Arc<Self>, epoch: u64, result: Result<Vec<Arc<Node>>, LoadError>) {
        {
            let mut st = self.state.write();
            if st.load == LoadState::Destroyed || st.epoch != epoch {
                tracing::debug!(
                    target: targets::MODEL,
                    node = %self.name,
                    epoch,
                    current_epoch = st.epoch,
                    "dropping stale load completion"
                );
                return;
            }
            st.cancel = None;
            match &result {
                Ok(_) => {
                    st.load = LoadState::Loaded;
                    st.error = None;
                }
                Err(err) => {
                    st.load = LoadState::Error;
                    st.error = Some(err.to_string());
                }
            }
        }

        match result {
            Ok(children) => {
                let children = dedupe_by_name(&self.name, children);
                for child in &children {
                    *child.parent.write() = Arc::downgrade(self);
                }
                self.children.replace_all(children);
            }
            Err(err) => {
                tracing::warn!(
                    target: targets::MODEL,
                    node = %self.name,
                    error = %err,
                    "children load failed"
                );
            }
        }
        self.changed.emit(());
    }

    /// Destroy this node and its whole subtree.
    ///
    /// Marks every node `Destroyed`, cancels in-flight loads, unregisters
    /// every listener, then detaches from the parent's children list. The
    /// detach emits the single `Removed` event that tears the mirror
    /// subtree down. Idempotent.
    pub fn destroy(self: &Arc<Self>) {
        let parent = self.parent();
        if !self.tear_down() {
            return;
        }
        if let Some(parent) = parent {
            let id = self.id;
            parent.children.remove_if(|child| child.id == id);
        }
    }

    /// Mark destroyed and silence the subtree.
    ///
    /// The terminal state is announced through `changed` before listeners
    /// come off, so bound observers can release their projections even when
    /// no parent list emits a removal. Children are dropped after the
    /// listeners, so the inner removals fire no events. Returns `false`
    /// when already destroyed.
    fn tear_down(self: &Arc<Self>) -> bool {
        {
            let mut st = self.state.write();
            if st.load == LoadState::Destroyed {
                return false;
            }
            st.load = LoadState::Destroyed;
            st.epoch += 1;
            if let Some(token) = st.cancel.take() {
                token.cancel();
            }
        }
        self.changed.emit(());
        self.changed.disconnect_all();
        self.children.remove_all_listeners();
        for child in self.children.items() {
            child.tear_down();
        }
        self.children.clear();
        true
    }
}

/// Drop children whose name collides with an earlier sibling.
fn dedupe_by_name(parent_name: &str, children: Vec<Arc<Node>>) -> Vec<Arc<Node>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if seen.insert(child.name.clone()) {
            out.push(child);
        } else {
            tracing::warn!(
                target: targets::MODEL,
                node = parent_name,
                child = %child.name,
                "dropping supplied child with duplicate sibling name"
            );
        }
    }
    out
}

/// Builder for [`Node`].
pub struct NodeBuilder {
    name: String,
    label: Option<String>,
    icon: Option<IconRef>,
    tooltip: Option<String>,
    priority: i32,
    legacy: bool,
    actions: ActionSet,
    supplier: Option<ChildrenSupplier>,
}

impl NodeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            icon: None,
            tooltip: None,
            priority: 0,
            legacy: false,
            actions: ActionSet::new(),
            supplier: None,
        }
    }

    /// Display label. Defaults to the name.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Display icon.
    pub fn icon(mut self, icon: IconRef) -> Self {
        self.icon = Some(icon);
        self
    }

    /// Tooltip text.
    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    /// Sort priority. Defaults to 0.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark the node as legacy (hidden by the default predicate).
    pub fn legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    /// The node's action set.
    pub fn actions(mut self, actions: ActionSet) -> Self {
        self.actions = actions;
        self
    }

    /// Children supplier. Nodes without one never load.
    pub fn supplier(mut self, supplier: ChildrenSupplier) -> Self {
        self.supplier = Some(supplier);
        self
    }

    /// Build the node.
    pub fn build(self) -> Arc<Node> {
        let label = self.label.unwrap_or_else(|| self.name.clone());
        Arc::new(Node {
            id: NodeId::next(),
            name: self.name,
            priority: self.priority,
            legacy: self.legacy,
            state: RwLock::new(NodeState {
                label,
                icon: self.icon,
                tooltip: self.tooltip,
                load: LoadState::NotLoaded,
                error: None,
                epoch: 0,
                cancel: None,
            }),
            parent: RwLock::new(Weak::new()),
            children: ObservableList::new(),
            actions: self.actions,
            supplier: self.supplier,
            changed: Signal::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::observable::ChangeKind;
    use crossbeam_channel::{Receiver, bounded, unbounded};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_supplier(
        counter: Arc<AtomicUsize>,
        children: Vec<Arc<Node>>,
    ) -> ChildrenSupplier {
        Arc::new(move |_token| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(children.clone())
        })
    }

    /// Channel that fires once per change event on the node's children list.
    fn children_events(node: &Arc<Node>) -> Receiver<ChangeKind> {
        let (tx, rx) = unbounded();
        node.children().on_changed().connect(move |event| {
            let _ = tx.send(event.kind);
        });
        rx
    }

    #[test]
    fn test_builder_defaults() {
        let node = Node::builder("storage").build();
        assert_eq!(node.name(), "storage");
        assert_eq!(node.label(), "storage");
        assert_eq!(node.priority(), 0);
        assert!(!node.is_legacy());
        assert_eq!(node.load_state(), LoadState::NotLoaded);
        assert!(node.parent().is_none());
        assert!(node.children().is_empty());
    }

    #[test]
    fn test_ids_unique() {
        let a = Node::builder("a").build();
        let b = Node::builder("a").build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_add_child_sets_parent() {
        let parent = Node::builder("parent").build();
        let child = Node::builder("child").build();

        assert!(parent.add_child(child.clone()));
        assert_eq!(child.parent().map(|p| p.id()), Some(parent.id()));
        assert_eq!(parent.children().len(), 1);
    }

    #[test]
    fn test_add_child_rejects_duplicate_name() {
        let parent = Node::builder("parent").build();
        assert!(parent.add_child(Node::builder("dup").build()));
        assert!(!parent.add_child(Node::builder("dup").build()));
        assert_eq!(parent.children().len(), 1);
    }

    #[test]
    fn test_load_populates_children() {
        let counter = Arc::new(AtomicUsize::new(0));
        let child = Node::builder("vm-01").build();
        let node = Node::builder("compute")
            .supplier(counting_supplier(counter.clone(), vec![child.clone()]))
            .build();
        let events = children_events(&node);

        node.load(false);
        assert_eq!(
            events.recv_timeout(Duration::from_secs(2)),
            Ok(ChangeKind::Added)
        );
        assert_eq!(node.load_state(), LoadState::Loaded);
        assert_eq!(node.children().len(), 1);
        assert_eq!(child.parent().map(|p| p.id()), Some(node.id()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_idempotent_without_force() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = Node::builder("compute")
            .supplier(counting_supplier(counter.clone(), vec![]))
            .build();
        let changed = unbounded();
        let tx = changed.0.clone();
        node.on_changed().connect(move |_| {
            let _ = tx.send(());
        });

        node.load(false);
        // Loading -> Loaded emits two property changes
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(node.load_state(), LoadState::Loaded);

        node.load(false); // no-op: already loaded
        assert!(changed.1.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        node.load(true); // forced refresh fetches again
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_one_fetch_while_loading() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let node = Node::builder("slow")
            .supplier(Arc::new(move |_token| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                let _ = gate_rx.recv();
                Ok(vec![])
            }))
            .build();

        node.load(false);
        // A second load while the first is in flight must not fetch again,
        // even when forced.
        node.load(false);
        node.load(true);

        gate_tx.send(()).unwrap();
        // Wait for the completion to land.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while node.load_state() == LoadState::Loading && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(node.load_state(), LoadState::Loaded);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_failure_sets_error_state() {
        let node = Node::builder("broken")
            .supplier(Arc::new(|_token| {
                Err(LoadError::Fetch("503 from backend".into()))
            }))
            .build();
        let changed = unbounded();
        let tx = changed.0.clone();
        node.on_changed().connect(move |_| {
            let _ = tx.send(());
        });

        node.load(false);
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();
        changed.1.recv_timeout(Duration::from_secs(2)).unwrap();

        assert_eq!(node.load_state(), LoadState::Error);
        let message = node.error_message().unwrap();
        assert!(message.contains("503 from backend"));
        assert!(node.children().is_empty());

        // Plain load does not retry out of Error; force does.
        node.load(false);
        assert!(changed.1.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_stale_completion_dropped_after_destroy() {
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let parent = Node::builder("root").build();
        let node = Node::builder("doomed")
            .supplier(Arc::new(move |_token| {
                let _ = gate_rx.recv();
                Ok(vec![Node::builder("late-child").build()])
            }))
            .build();
        parent.add_child(node.clone());

        node.load(false);
        node.destroy();
        assert_eq!(node.load_state(), LoadState::Destroyed);

        // Release the in-flight load; its completion must be discarded.
        gate_tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(node.load_state(), LoadState::Destroyed);
        assert!(node.children().is_empty());
        assert!(parent.children().is_empty());
    }

    #[test]
    fn test_destroy_emits_single_remove_and_recurses() {
        let root = Node::builder("root").build();
        let middle = Node::builder("middle").build();
        let leaf = Node::builder("leaf").build();
        root.add_child(middle.clone());
        middle.add_child(leaf.clone());

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        root.children().on_changed().connect(move |event| {
            events_clone
                .lock()
                .push((event.kind, event.items.len()));
        });
        // Listener on the destroyed subtree must never observe teardown.
        let inner_fired = Arc::new(AtomicUsize::new(0));
        let inner_clone = inner_fired.clone();
        middle.children().on_changed().connect(move |_| {
            inner_clone.fetch_add(1, Ordering::SeqCst);
        });

        middle.destroy();

        assert_eq!(*events.lock(), vec![(ChangeKind::Removed, 1)]);
        assert_eq!(inner_fired.load(Ordering::SeqCst), 0);
        assert_eq!(middle.load_state(), LoadState::Destroyed);
        assert_eq!(leaf.load_state(), LoadState::Destroyed);
        assert_eq!(middle.on_changed().connection_count(), 0);
        assert_eq!(middle.children().on_changed().connection_count(), 0);

        // Idempotent
        middle.destroy();
        assert_eq!(events.lock().len(), 1);
    }

    #[test]
    fn test_set_label_notifies() {
        let node = Node::builder("n").build();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        node.on_changed().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        node.set_label("Virtual Machines (3)");
        assert_eq!(node.label(), "Virtual Machines (3)");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_supplier_duplicates_dropped() {
        let node = Node::builder("dupes")
            .supplier(Arc::new(|_token| {
                Ok(vec![
                    Node::builder("same").build(),
                    Node::builder("same").build(),
                    Node::builder("other").build(),
                ])
            }))
            .build();
        let events = children_events(&node);

        node.load(false);
        events.recv_timeout(Duration::from_secs(2)).unwrap();

        let names: Vec<String> = node
            .children()
            .items()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["same", "other"]);
    }

    #[test]
    fn test_node_factory_contract() {
        struct VmFactory;
        impl NodeFactory for VmFactory {
            fn create_node(&self, _parent: &Arc<Node>, resource: &dyn Any) -> Option<Arc<Node>> {
                let name = resource.downcast_ref::<String>()?;
                if name.is_empty() {
                    return None;
                }
                Some(Node::builder(name.clone()).build())
            }
        }

        let parent = Node::builder("vms").build();
        let factory = VmFactory;

        let created = factory.create_node(&parent, &"vm-01".to_string());
        assert_eq!(created.map(|n| n.name().to_string()), Some("vm-01".into()));
        assert!(factory.create_node(&parent, &String::new()).is_none());
        assert!(factory.create_node(&parent, &42i32).is_none());
    }
}

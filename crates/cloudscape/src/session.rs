//! Explorer sessions and the session registry.
//!
//! One [`ExplorerSession`] corresponds to one open explorer view (one IDE
//! project window). It owns the synchronizer for that view, the attached
//! top-level roots, and the bus subscriptions that let distant components
//! focus or refresh resources without structural knowledge of the tree.
//! The host keeps sessions in a [`SessionRegistry`] keyed by [`SessionId`]
//! so that a window close tears down exactly its own session.
//!
//! # Key Types
//!
//! - [`ExplorerSession`] / [`SessionBuilder`] - one view and its constructor
//! - [`SessionId`] - registry key
//! - [`SessionRegistry`] - the per-process session table
//!
//! # Input Handling
//!
//! Pointer input arrives as [`MirrorKey`]s from the host widget. The
//! session resolves them to domain nodes and applies the activation rules:
//! double click fires the primary action or triggers the first lazy load,
//! right click builds the context menu through [`MenuBuilder`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use cloudscape_core::{DispatchResult, Dispatcher, EventBus, Signal, SubscriptionId, topics};

use crate::action::{MenuBuilder, MenuItem};
use crate::logging::targets;
use crate::model::{LoadState, Node, NodeId};
use crate::tree::{
    MirrorKey, SortComparator, Synchronizer, VisibilityPredicate, default_comparator,
    default_predicate,
};

/// Counter for unique session IDs.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Builder for [`ExplorerSession`].
pub struct SessionBuilder {
    dispatcher: Arc<Dispatcher>,
    bus: Arc<EventBus>,
    predicate: VisibilityPredicate,
    comparator: SortComparator,
}

impl SessionBuilder {
    /// Override the visibility predicate. Defaults to hiding legacy nodes.
    pub fn predicate(mut self, predicate: VisibilityPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Override the sibling sort order. Defaults to `(priority, label)`.
    pub fn comparator(mut self, comparator: SortComparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Build the session and register its bus subscriptions.
    pub fn build(self) -> DispatchResult<Arc<ExplorerSession>> {
        let synchronizer =
            Synchronizer::new(self.dispatcher.clone(), self.predicate, self.comparator)?;
        let session = Arc::new(ExplorerSession {
            id: SessionId::next(),
            bus: self.bus,
            synchronizer,
            roots: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            reveal_requested: Signal::new(),
            closed: AtomicBool::new(false),
        });
        session.subscribe_bus();
        tracing::debug!(
            target: targets::SESSION,
            session = session.id.as_u64(),
            "session opened"
        );
        Ok(session)
    }
}

/// One open explorer view.
///
/// # Thread Safety
///
/// `ExplorerSession` is `Send + Sync`. Input entry points may be called
/// from any thread; tree mutation is marshaled through the session's
/// dispatcher.
pub struct ExplorerSession {
    id: SessionId,
    bus: Arc<EventBus>,
    synchronizer: Arc<Synchronizer>,
    roots: Mutex<Vec<Arc<Node>>>,
    /// `(topic, id)` pairs to unsubscribe on close.
    subscriptions: Mutex<Vec<(&'static str, SubscriptionId)>>,
    /// Asks the host widget to select and scroll an entry into view.
    reveal_requested: Signal<MirrorKey>,
    closed: AtomicBool,
}

impl ExplorerSession {
    /// Start building a session on the given dispatcher and bus.
    pub fn builder(dispatcher: Arc<Dispatcher>, bus: Arc<EventBus>) -> SessionBuilder {
        SessionBuilder {
            dispatcher,
            bus,
            predicate: default_predicate(),
            comparator: default_comparator(),
        }
    }

    /// Process-unique identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The synchronizer owning this view's mirror.
    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fires when a bus event asks for an entry to be brought into view.
    pub fn on_reveal_requested(&self) -> &Signal<MirrorKey> {
        &self.reveal_requested
    }

    fn subscribe_bus(self: &Arc<Self>) {
        let mut subs = self.subscriptions.lock();
        for topic in [topics::FOCUS_RESOURCE, topics::HIGHLIGHT_RESOURCE] {
            let this = Arc::downgrade(self);
            let id = self.bus.subscribe(topic, move |payload| {
                let Some(session) = this.upgrade() else {
                    return;
                };
                if let Some(node_id) = payload.downcast_ref::<NodeId>() {
                    session.reveal(*node_id);
                }
            });
            subs.push((topic, id));
        }

        // A resource created elsewhere: refetch its parent, then reveal it.
        let this = Arc::downgrade(self);
        let id = self.bus.subscribe(topics::RESOURCE_CREATED, move |payload| {
            let Some(session) = this.upgrade() else {
                return;
            };
            if let Some(parent_id) = payload.downcast_ref::<NodeId>() {
                if let Some(key) = session.synchronizer.find(*parent_id) {
                    if let Some(parent) = session.synchronizer.node_at(key) {
                        parent.load(true);
                    }
                    session.reveal(*parent_id);
                }
            }
        });
        subs.push((topics::RESOURCE_CREATED, id));

        let this = Arc::downgrade(self);
        let id = self.bus.subscribe(topics::REFRESH, move |_| {
            if let Some(session) = this.upgrade() {
                session.refresh_all();
            }
        });
        subs.push((topics::REFRESH, id));
    }

    fn reveal(&self, node_id: NodeId) {
        match self.synchronizer.find(node_id) {
            Some(key) => self.reveal_requested.emit(key),
            None => tracing::debug!(
                target: targets::SESSION,
                session = self.id.as_u64(),
                node = node_id.as_u64(),
                "reveal request for a node not in this view"
            ),
        }
    }

    /// Attach a top-level root to this view.
    ///
    /// Returns `Ok(None)` when the visibility predicate rejects the node or
    /// the session is closed.
    pub fn attach_root(self: &Arc<Self>, node: Arc<Node>) -> DispatchResult<Option<MirrorKey>> {
        if self.is_closed() {
            return Ok(None);
        }
        let key = self.synchronizer.attach_root(node.clone())?;
        if key.is_some() {
            self.roots.lock().push(node);
        }
        Ok(key)
    }

    /// Force-refetch every attached root.
    pub fn refresh_all(&self) {
        for root in self.roots.lock().iter() {
            root.load(true);
        }
    }

    /// The domain node behind a mirror entry.
    pub fn node_at(&self, key: MirrorKey) -> Option<Arc<Node>> {
        self.synchronizer.node_at(key)
    }

    /// Resolve a domain node to its mirror entry.
    pub fn find(&self, node_id: NodeId) -> Option<MirrorKey> {
        self.synchronizer.find(node_id)
    }

    /// Primary activation (double click) of an entry.
    ///
    /// Fires the node's primary action when one is declared. Otherwise a
    /// `NotLoaded` node starts its first lazy load. Activation is ignored
    /// while a load is in flight.
    pub fn on_primary_activate(&self, key: MirrorKey) {
        let Some(node) = self.synchronizer.node_at(key) else {
            return;
        };
        if node.load_state() == LoadState::Loading {
            tracing::trace!(
                target: targets::SESSION,
                node = %node.name(),
                "ignoring activation while loading"
            );
            return;
        }
        if let Some(primary) = node.actions().primary() {
            primary.fire();
            return;
        }
        if node.load_state() == LoadState::NotLoaded {
            node.load(false);
        }
    }

    /// Whether right click on an entry should show a menu at all.
    pub fn has_context_actions(&self, key: MirrorKey) -> bool {
        self.synchronizer
            .node_at(key)
            .is_some_and(|node| node.actions().has_actions())
    }

    /// Build the context menu for an entry.
    ///
    /// Empty when the entry has no actions or is no longer mirrored.
    pub fn context_menu(&self, key: MirrorKey) -> Vec<MenuItem> {
        match self.synchronizer.node_at(key) {
            Some(node) => MenuBuilder::build(node.actions().actions()),
            None => Vec::new(),
        }
    }

    /// Close the session: unsubscribe from the bus, detach and destroy
    /// every root. Idempotent.
    pub fn close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for (topic, id) in self.subscriptions.lock().drain(..) {
            self.bus.unsubscribe(topic, id);
        }
        let roots: Vec<Arc<Node>> = self.roots.lock().drain(..).collect();
        for root in roots {
            if let Err(err) = self.synchronizer.detach(root.id()) {
                tracing::warn!(
                    target: targets::SESSION,
                    session = self.id.as_u64(),
                    error = %err,
                    "detach during close skipped, dispatch context unavailable"
                );
            }
            root.destroy();
        }
        tracing::debug!(
            target: targets::SESSION,
            session = self.id.as_u64(),
            "session closed"
        );
    }
}

/// The per-process table of open sessions.
///
/// # Thread Safety
///
/// `SessionRegistry` is `Send + Sync`; windows open and close from
/// arbitrary threads.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<ExplorerSession>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own ID.
    pub fn insert(&self, session: Arc<ExplorerSession>) -> SessionId {
        let id = session.id();
        self.sessions.write().insert(id, session);
        id
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<Arc<ExplorerSession>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Remove a session from the registry, returning it for teardown.
    pub fn remove(&self, id: SessionId) -> Option<Arc<ExplorerSession>> {
        self.sessions.write().remove(&id)
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

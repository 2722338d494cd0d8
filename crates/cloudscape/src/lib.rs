//! Cloudscape - tree synchronization and action dispatch for an IDE-hosted
//! cloud-resource explorer.
//!
//! The crate splits the explorer into a UI-agnostic domain model and a
//! UI-facing projection:
//!
//! - [`model`]: [`Node`](model::Node) trees with lazy children loading and
//!   change-announcing [`ObservableList`](model::ObservableList)s
//! - [`tree`]: the [`TreeMirror`](tree::TreeMirror) projection and the
//!   [`Synchronizer`](tree::Synchronizer) keeping it equal to the domain
//! - [`action`]: per-node actions and deterministic context-menu layout
//! - [`session`]: one [`ExplorerSession`](session::ExplorerSession) per
//!   open view, with bus integration and input handling
//!
//! Threading plumbing (signals, the dispatch thread, the load pool, the
//! event bus) lives in the `cloudscape-core` crate and is re-exported here.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cloudscape::{Dispatcher, EventBus, ExplorerSession, Node};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = Arc::new(Dispatcher::spawn("explorer"));
//!     let bus = Arc::new(EventBus::new());
//!
//!     let session = ExplorerSession::builder(dispatcher.clone(), bus).build()?;
//!     session.attach_root(Node::builder("subscriptions").build())?;
//!
//!     // Hand session mirror keys to the host widget...
//!     session.close();
//!     dispatcher.stop_and_join();
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;
pub mod tree;

pub use cloudscape_core::{
    CancellationToken, ConnectionGuard, ConnectionId, CoreError, CoreResult, DispatchAffinity,
    DispatchError, DispatchResult, Dispatcher, EventBus, LoadPool, Payload, Signal,
    SubscriptionId, topics,
};

pub use action::{ActionSet, MenuBuilder, MenuItem, NodeAction};
pub use error::{ExplorerError, ExplorerResult, LoadError};
pub use model::{
    ChangeEvent, ChangeKind, ChildrenSupplier, IconRef, LoadState, Node, NodeBuilder, NodeFactory,
    NodeId, ObservableList,
};
pub use session::{ExplorerSession, SessionBuilder, SessionId, SessionRegistry};
pub use tree::{
    MirrorKey, SortComparator, Synchronizer, TreeMirror, VisibilityPredicate, default_comparator,
    default_predicate,
};

//! The resource domain model.
//!
//! Two building blocks:
//!
//! - [`ObservableList`]: the ordered, change-announcing container holding a
//!   node's children
//! - [`Node`]: one entry in the domain tree, with lazy children loading and
//!   lifecycle management
//!
//! The model is UI-agnostic; the UI-facing projection lives in
//! [`crate::tree`].

pub mod node;
pub mod observable;

pub use node::{
    ChildrenSupplier, IconRef, LoadState, Node, NodeBuilder, NodeFactory, NodeId,
};
pub use observable::{ChangeEvent, ChangeKind, ObservableList};

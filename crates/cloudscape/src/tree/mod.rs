//! The UI-facing tree projection and its synchronization.
//!
//! - [`TreeMirror`]: the slotmap-backed projection the host widget renders
//! - [`Synchronizer`]: keeps the mirror equal to the filtered, sorted
//!   domain tree, marshaling off-thread change events onto the dispatch
//!   thread

pub mod mirror;
pub mod sync;

pub use mirror::{MirrorKey, SortComparator, TreeMirror, default_comparator};
pub use sync::{Synchronizer, VisibilityPredicate, default_predicate};

//! Error types for the explorer engine.

use thiserror::Error;

use cloudscape_core::DispatchError;

/// Errors surfaced by a children supplier.
///
/// A load failure never propagates as an unhandled fault: the owning node
/// transitions to the `Error` state and stays visible carrying the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The backing service could not produce the children.
    #[error("failed to fetch children: {0}")]
    Fetch(String),

    /// The load was cancelled before completion.
    #[error("load cancelled")]
    Cancelled,
}

/// Errors that can occur in the explorer engine.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// The dispatch context rejected or lost an operation.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A children load failed.
    #[error("load error: {0}")]
    Load(#[from] LoadError),
}

/// Result type for explorer operations.
pub type ExplorerResult<T> = Result<T, ExplorerError>;

//! Error types for the core crate.

use thiserror::Error;

/// Errors produced by the dispatch context.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher has been stopped and no longer accepts work.
    #[error("dispatcher has been stopped")]
    Stopped,

    /// A closure submitted via `invoke` panicked on the dispatch thread.
    ///
    /// The panic is contained on the dispatch thread; the blocked caller
    /// receives this error instead of the closure's return value.
    #[error("dispatched task panicked")]
    TaskPanicked,
}

/// Errors that can occur in the core systems.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Dispatch context failure.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

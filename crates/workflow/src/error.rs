//! Workflow error types.

use cart::{CartError, CartId};
use journal::JournalError;
use thiserror::Error;

/// Errors returned by runtime operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No process with this ID is known to the runtime.
    #[error("Cart process not found: {0}")]
    NotFound(CartId),

    /// A process with this ID already exists.
    #[error("Cart process already started: {0}")]
    AlreadyStarted(CartId),

    /// The process has checked out and accepts no more signals.
    #[error("Cart process is closed: {0}")]
    ProcessClosed(CartId),

    /// The worker task for this process is gone.
    #[error("Cart process stopped: {0}")]
    Stopped(CartId),

    /// The signal body could not be decoded.
    #[error("Invalid signal: {0}")]
    InvalidSignal(CartError),

    /// The process rejected an internal transition.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// An error occurred in the journal.
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;

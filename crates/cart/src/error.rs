//! Cart error types.

use thiserror::Error;

use crate::{ProcessStatus, ProductId};

/// Errors produced when a cart process rejects a signal or timer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The signal body could not be decoded.
    #[error("Invalid signal payload: {0}")]
    InvalidSignalPayload(String),

    /// Product is not in the catalog (strict product policy only).
    #[error("Invalid product: {0}")]
    InvalidProduct(ProductId),

    /// Quantity is zero or negative.
    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(i64),

    /// The process is not in a status that accepts the action.
    #[error("Invalid transition: cannot {action} while {status}")]
    InvalidTransition {
        status: ProcessStatus,
        action: &'static str,
    },

    /// The process has already been opened.
    #[error("Cart process already opened")]
    AlreadyOpened,

    /// The charge total does not fit in the amount type.
    #[error("Charge amount overflow")]
    AmountOverflow,
}

impl CartError {
    /// Returns true for errors caused by a malformed signal rather than by
    /// the status of the process.
    pub fn is_invalid_payload(&self) -> bool {
        matches!(
            self,
            CartError::InvalidSignalPayload(_)
                | CartError::InvalidQuantity(_)
                | CartError::InvalidProduct(_)
        )
    }
}

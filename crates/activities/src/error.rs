//! Task error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while charging a payment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The charge was refused. Retrying will not help.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or answered with a transient error.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// Retries did not produce an outcome within the time budget.
    #[error("Payment timed out after {0:?}")]
    TimedOut(Duration),
}

/// Errors that can occur while sending a notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// The provider refused the message.
    #[error("Notice rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// Classifies an error as worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for PaymentError {
    fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Unavailable(_))
    }
}

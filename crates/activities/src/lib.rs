//! Side-effecting tasks for cart processes.
//!
//! A cart process charges a payment when it checks out and sends a notice
//! when a cart is abandoned. Both are modelled as traits so the process can
//! be tested against in-memory implementations:
//!
//! - [`PaymentGateway`] with [`InMemoryPaymentGateway`]
//! - [`Notifier`] with [`InMemoryNotifier`]
//!
//! [`RetryPolicy`] runs a task with exponential backoff until it succeeds,
//! fails permanently, or runs out of time.

pub mod error;
pub mod notify;
pub mod payment;
pub mod retry;

pub use error::{NotifyError, PaymentError, Transient};
pub use notify::{AbandonmentNotice, InMemoryNotifier, Notifier};
pub use payment::{InMemoryPaymentGateway, PaymentGateway, Receipt, charge_with_retry};
pub use retry::{RetryError, RetryPolicy};

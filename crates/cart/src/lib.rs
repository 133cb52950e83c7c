//! Cart process state machine.
//!
//! This crate holds the pure core of a shopping-cart process:
//! - [`Catalog`] of purchasable products
//! - [`CartState`] with its add/remove semantics
//! - [`CartSignal`] mutation signals and [`CartEvent`] history events
//! - [`CartProcess`], which decides events from signals and timers and folds
//!   them back into state
//!
//! Nothing here performs I/O. Hosting a process, journalling its events and
//! running side effects is the job of the `workflow` crate.

pub mod aggregate;
pub mod catalog;
pub mod charge;
pub mod error;
pub mod events;
pub mod process;
pub mod signals;
pub mod state;
pub mod value_objects;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{Catalog, Product};
pub use charge::{CURRENCY_USD, ChargeRequest};
pub use common::CartId;
pub use error::CartError;
pub use events::CartEvent;
pub use process::{CartProcess, CartRules, ChargeOutcome, ProductPolicy};
pub use signals::{CartSignal, EmailPayload, ItemPayload};
pub use state::{CartItem, CartState, ProcessStatus};
pub use value_objects::{Money, ProductId};

//! Shared types for the cart process engine.

mod types;

pub use types::CartId;

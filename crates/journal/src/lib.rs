//! Append-only journal holding the history of every cart process.
//!
//! Each process owns one stream, identified by its [`CartId`]. Entries in a
//! stream carry a gapless sequence number starting at 1, and appends are
//! guarded by an expected sequence so two writers can never interleave.

pub mod entry;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::CartId;
pub use entry::{EntryId, JournalEntry, JournalEntryBuilder, Sequence};
pub use error::{JournalError, Result};
pub use memory::InMemoryJournal;
pub use postgres::PostgresJournal;
pub use store::{AppendOptions, Journal};

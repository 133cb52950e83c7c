use thiserror::Error;

use crate::{CartId, Sequence};

/// Errors that can occur when reading or writing the journal.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Another writer advanced the stream since it was last read.
    #[error(
        "Sequence conflict on stream {stream_id}: expected sequence {expected}, found {actual}"
    )]
    SequenceConflict {
        stream_id: CartId,
        expected: Sequence,
        actual: Sequence,
    },

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;

use async_trait::async_trait;

use crate::{CartId, JournalEntry, JournalError, Result, Sequence};

/// Options for appending entries to a stream.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Sequence the stream must currently be at.
    /// If None, no check is performed.
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects the stream to currently end at `sequence`.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Expects the stream to be empty.
    pub fn expect_new() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// Durable, append-only storage for process histories.
///
/// Implementations must be thread-safe and must make each `append` atomic:
/// either every entry of the batch is stored, or none is.
#[async_trait]
pub trait Journal: Send + Sync {
    /// Appends a batch of entries to a single stream.
    ///
    /// Fails with `SequenceConflict` if `options.expected_sequence` is set and
    /// does not match the stream's current sequence.
    ///
    /// Returns the sequence of the last appended entry.
    async fn append(&self, entries: Vec<JournalEntry>, options: AppendOptions)
    -> Result<Sequence>;

    /// Reads a whole stream in sequence order.
    async fn read_stream(&self, stream_id: &CartId) -> Result<Vec<JournalEntry>>;

    /// Lists the IDs of every stream of the given kind, oldest first.
    async fn list_streams(&self, stream_kind: &str) -> Result<Vec<CartId>>;
}

/// Checks that a batch targets one stream with consecutive sequences.
pub fn validate_append(entries: &[JournalEntry]) -> Result<()> {
    let Some(first) = entries.first() else {
        return Err(JournalError::InvalidAppend(
            "Cannot append an empty batch".to_string(),
        ));
    };

    let mut expected = first.sequence;
    for entry in entries.iter().skip(1) {
        if entry.stream_id != first.stream_id || entry.stream_kind != first.stream_kind {
            return Err(JournalError::InvalidAppend(
                "All entries must belong to the same stream".to_string(),
            ));
        }

        expected = expected.next();
        if entry.sequence != expected {
            return Err(JournalError::InvalidAppend(format!(
                "Entry sequences must be consecutive. Expected {}, got {}",
                expected, entry.sequence
            )));
        }
    }

    Ok(())
}

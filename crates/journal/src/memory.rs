use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    CartId, JournalEntry, JournalError, Result, Sequence,
    store::{AppendOptions, Journal, validate_append},
};

#[derive(Debug, Default)]
struct Streams {
    entries: HashMap<CartId, Vec<JournalEntry>>,
    /// Stream IDs with their kind, in creation order.
    created: Vec<(CartId, String)>,
}

/// In-memory journal.
///
/// Behaves like the PostgreSQL journal but lives only as long as the process.
/// Clones share the same storage, which lets tests simulate a restart by
/// handing a clone to a fresh runtime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJournal {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryJournal {
    /// Creates a new empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of entries across all streams.
    pub async fn entry_count(&self) -> usize {
        self.streams
            .read()
            .await
            .entries
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn append(
        &self,
        entries: Vec<JournalEntry>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        validate_append(&entries)?;

        let (stream_id, stream_kind, first_sequence) = match entries.first() {
            Some(first) => (
                first.stream_id.clone(),
                first.stream_kind.clone(),
                first.sequence,
            ),
            None => return Err(JournalError::InvalidAppend("empty batch".to_string())),
        };

        let mut streams = self.streams.write().await;

        let current = streams
            .entries
            .get(&stream_id)
            .and_then(|stream| stream.last())
            .map(|entry| entry.sequence)
            .unwrap_or_else(Sequence::initial);

        if let Some(expected) = options.expected_sequence
            && current != expected
        {
            return Err(JournalError::SequenceConflict {
                stream_id,
                expected,
                actual: current,
            });
        }

        // Unique (stream, sequence) constraint
        if first_sequence != current.next() {
            return Err(JournalError::SequenceConflict {
                stream_id,
                expected: options.expected_sequence.unwrap_or(current),
                actual: current,
            });
        }

        let last = entries
            .last()
            .map(|entry| entry.sequence)
            .unwrap_or(current);

        let count = entries.len();
        if !streams.entries.contains_key(&stream_id) {
            streams.created.push((stream_id.clone(), stream_kind));
        }
        streams.entries.entry(stream_id).or_default().extend(entries);
        metrics::counter!("journal_entries_appended_total").increment(count as u64);

        Ok(last)
    }

    async fn read_stream(&self, stream_id: &CartId) -> Result<Vec<JournalEntry>> {
        let streams = self.streams.read().await;
        Ok(streams.entries.get(stream_id).cloned().unwrap_or_default())
    }

    async fn list_streams(&self, stream_kind: &str) -> Result<Vec<CartId>> {
        let streams = self.streams.read().await;
        Ok(streams
            .created
            .iter()
            .filter(|(_, kind)| kind == stream_kind)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

//! Loading and recording cart process histories.

use std::sync::Arc;

use cart::{Aggregate, CartEvent, CartId, CartProcess, DomainEvent};
use journal::{AppendOptions, Journal, JournalEntry, Sequence};

use crate::Result;

/// Reads and writes cart process histories in a journal.
#[derive(Clone)]
pub struct History {
    journal: Arc<dyn Journal>,
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History").finish_non_exhaustive()
    }
}

impl History {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self { journal }
    }

    /// Returns the underlying journal.
    pub fn journal(&self) -> &Arc<dyn Journal> {
        &self.journal
    }

    /// Rebuilds a process by replaying its stream.
    ///
    /// Returns None if the stream has no entries.
    pub async fn load(&self, cart_id: &CartId) -> Result<Option<CartProcess>> {
        let entries = self.journal.read_stream(cart_id).await?;
        if entries.is_empty() {
            return Ok(None);
        }

        let mut process = CartProcess::default();
        for entry in entries {
            let event: CartEvent = entry.decode()?;
            process.apply(event);
            process.set_sequence(entry.sequence);
        }

        Ok(Some(process))
    }

    /// Journals `events` and then applies them to `process`.
    ///
    /// The append expects the stream to still be at the process's sequence,
    /// so a second writer for the same cart fails with a conflict instead of
    /// interleaving. Nothing is applied if the append fails.
    pub async fn record(
        &self,
        cart_id: &CartId,
        process: &mut CartProcess,
        events: Vec<CartEvent>,
    ) -> Result<Sequence> {
        let current = process.sequence();
        if events.is_empty() {
            return Ok(current);
        }

        let mut entries = Vec::with_capacity(events.len());
        let mut sequence = current;
        for event in &events {
            sequence = sequence.next();
            entries.push(
                JournalEntry::builder()
                    .stream_id(cart_id.clone())
                    .stream_kind(CartProcess::stream_kind())
                    .sequence(sequence)
                    .event_type(event.event_type())
                    .payload(event)?
                    .build()?,
            );
        }

        let options = if current == Sequence::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_sequence(current)
        };

        let new_sequence = self.journal.append(entries, options).await?;

        process.apply_events(events);
        process.set_sequence(new_sequence);

        Ok(new_sequence)
    }

    /// Lists every cart stream, oldest first.
    pub async fn cart_ids(&self) -> Result<Vec<CartId>> {
        Ok(self.journal.list_streams(CartProcess::stream_kind()).await?)
    }
}

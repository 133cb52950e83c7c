use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CartId, JournalError};

/// Unique identifier for a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Creates a new random entry ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entry ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an entry within its stream.
///
/// An empty stream is at sequence 0; the first entry is written at 1 and
/// every following entry increments by exactly one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Sequence(i64);

impl Sequence {
    /// Creates a sequence from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Sequence of a stream with no entries.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Sequence of the first entry in a stream.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the following sequence.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Sequence {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A single recorded event in a process stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for this entry.
    pub entry_id: EntryId,

    /// The stream (process instance) this entry belongs to.
    pub stream_id: CartId,

    /// The kind of process that owns the stream (e.g. "Cart").
    pub stream_kind: String,

    /// Position of the entry within its stream.
    pub sequence: Sequence,

    /// Name of the recorded event (e.g. "ItemAdded").
    pub event_type: String,

    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl JournalEntry {
    /// Creates a new entry builder.
    pub fn builder() -> JournalEntryBuilder {
        JournalEntryBuilder::default()
    }

    /// Deserializes the payload into a concrete event type.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Builder for journal entries.
#[derive(Debug, Default)]
pub struct JournalEntryBuilder {
    stream_id: Option<CartId>,
    stream_kind: Option<String>,
    sequence: Option<Sequence>,
    event_type: Option<String>,
    recorded_at: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
}

impl JournalEntryBuilder {
    /// Sets the owning stream.
    pub fn stream_id(mut self, stream_id: CartId) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    /// Sets the stream kind.
    pub fn stream_kind(mut self, stream_kind: impl Into<String>) -> Self {
        self.stream_kind = Some(stream_kind.into());
        self
    }

    /// Sets the sequence.
    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the recording time. If not set, the current time is used.
    pub fn recorded_at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Builds the entry, failing if a required field is missing.
    pub fn build(self) -> Result<JournalEntry, JournalError> {
        let missing = |field: &str| JournalError::InvalidAppend(format!("{field} is required"));

        Ok(JournalEntry {
            entry_id: EntryId::new(),
            stream_id: self.stream_id.ok_or_else(|| missing("stream_id"))?,
            stream_kind: self.stream_kind.ok_or_else(|| missing("stream_kind"))?,
            sequence: self.sequence.ok_or_else(|| missing("sequence"))?,
            event_type: self.event_type.ok_or_else(|| missing("event_type"))?,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            payload: self.payload.ok_or_else(|| missing("payload"))?,
        })
    }
}

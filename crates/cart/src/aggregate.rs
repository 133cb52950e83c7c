//! Core aggregate and domain event traits.

use common::CartId;
use journal::Sequence;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are facts recorded in a process history. They are immutable
/// and named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name stored alongside the payload.
    fn event_type(&self) -> &'static str;
}

/// Trait for event-sourced process state.
///
/// An aggregate is rebuilt by replaying its events in order. Deciding what
/// happens next is done by methods that return events; `apply` is the only
/// way state changes.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors its decisions can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the stream kind used when journalling this aggregate.
    fn stream_kind() -> &'static str;

    /// Returns the aggregate's identifier, or None before its first event.
    fn id(&self) -> Option<&CartId>;

    /// Returns the journal sequence of the last applied event.
    fn sequence(&self) -> Sequence;

    /// Sets the journal sequence after events have been stored.
    fn set_sequence(&mut self, sequence: Sequence);

    /// Applies an event to the aggregate.
    ///
    /// Must be pure and deterministic, and must not fail: events are facts
    /// that have already happened.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

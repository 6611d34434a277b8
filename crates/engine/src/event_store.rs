//! `EventStore`: the collaborator that turns a list of event
//! ids into materialized [`Event`]s. This is explicitly out of scope for the
//! engine to implement — real deployments back it with the homeserver's
//! event cache and content-addressed storage — but the engine depends on the
//! trait boundary, and tests need *some* implementation to exercise the nine
//! read operations against.

use async_trait::async_trait;
use roomstream_core::OwnedEventId;
use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::event::Event;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Materializes `event_ids` into full events, preserving input order —
    /// callers zip the result against a parallel list of ordering rows, so a
    /// reordering here would misattribute cursors to the wrong event.
    ///
    /// `include_prev_content` lets a caller ask for each event's previous
    /// state content alongside its own; this engine never sets it (state
    /// resolution is out of scope) but callers embedding this engine in a
    /// full homeserver may.
    async fn fetch(&self, event_ids: &[OwnedEventId], include_prev_content: bool) -> EngineResult<Vec<Event>>;
}

/// A fixed in-memory event body store, for tests and for the engine's own
/// integration tests against [`crate::repository::InMemoryStreamRepository`].
#[derive(Default)]
pub struct InMemoryEventStore {
    events: HashMap<OwnedEventId, Event>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: Event) {
        self.events.insert(event.event_id.clone(), event);
    }

    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let mut store = Self::new();
        for event in events {
            store.insert(event);
        }
        store
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn fetch(&self, event_ids: &[OwnedEventId], _include_prev_content: bool) -> EngineResult<Vec<Event>> {
        event_ids
            .iter()
            .map(|id| {
                self.events
                    .get(id)
                    .cloned()
                    .ok_or_else(|| EngineError::EventNotFound(id.as_str().to_owned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use roomstream_core::{OwnedRoomId, OwnedUserId};

    use super::*;

    fn event(id: &str, stream_ordering: i64) -> Event {
        Event::new(
            OwnedEventId::parse(id).unwrap(),
            OwnedRoomId::parse("!room:example.org").unwrap(),
            "m.room.message".to_owned(),
            OwnedUserId::parse("@alice:example.org").unwrap(),
            stream_ordering,
            stream_ordering,
            stream_ordering,
        )
    }

    #[tokio::test]
    async fn fetch_preserves_requested_order() {
        let store = InMemoryEventStore::with_events([event("$a", 1), event("$b", 2), event("$c", 3)]);
        let ids = [
            OwnedEventId::parse("$c").unwrap(),
            OwnedEventId::parse("$a").unwrap(),
        ];
        let fetched = store.fetch(&ids, false).await.unwrap();
        assert_eq!(fetched[0].event_id.as_str(), "$c");
        assert_eq!(fetched[1].event_id.as_str(), "$a");
    }

    #[tokio::test]
    async fn fetch_fails_on_unknown_id() {
        let store = InMemoryEventStore::new();
        let ids = [OwnedEventId::parse("$missing").unwrap()];
        assert!(matches!(store.fetch(&ids, false).await, Err(EngineError::EventNotFound(_))));
    }
}

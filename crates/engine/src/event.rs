//! The engine's view of an event: the ordering columns every
//! operation reasons about, plus the `internal_metadata` bag that
//! [`crate::annotator::ResultAnnotator`] is the sole writer of.

use std::collections::BTreeMap;

use roomstream_core::{OwnedEventId, OwnedRoomId, OwnedUserId, Seqnum};
use serde_json::Value;

/// A materialized event, as handed back by [`crate::event_store::EventStore`].
///
/// Cloning is shallow-cheap enough for the batch sizes this engine deals in
/// (hundreds, not millions) and keeps the annotator and the call sites that
/// build `(events, next_token)` tuples from having to fight the borrow
/// checker over who owns the `Vec`.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub event_type: String,
    pub state_key: Option<String>,
    pub sender: OwnedUserId,
    pub outlier: bool,
    pub redacted: bool,
    pub stream_ordering: Seqnum,
    pub topological_ordering: i64,
    pub depth: i64,
    /// Attachment point for `before`/`after`/`order` cursors and any other
    /// per-response metadata a caller layered on. Keyed loosely (`Value`,
    /// not a fixed struct) to mirror a homeserver's `unsigned` bag, which the
    /// same annotation pattern is grounded on.
    pub internal_metadata: BTreeMap<String, Value>,
}

impl Event {
    /// Builds a bare event from just the ordering columns a row query
    /// returned; `internal_metadata` starts empty and is filled in later by
    /// the annotator. Intended for use by [`crate::event_store::EventStore`]
    /// implementations that join other tables' worth of data on top.
    pub fn new(
        event_id: OwnedEventId,
        room_id: OwnedRoomId,
        event_type: String,
        sender: OwnedUserId,
        stream_ordering: Seqnum,
        topological_ordering: i64,
        depth: i64,
    ) -> Self {
        Self {
            event_id,
            room_id,
            event_type,
            state_key: None,
            sender,
            outlier: false,
            redacted: false,
            stream_ordering,
            topological_ordering,
            depth,
            internal_metadata: BTreeMap::new(),
        }
    }
}

//! `ResultAnnotator`: the sole place that writes the `before`,
//! `after`, and `order` cursors into an event's `internal_metadata`. Every
//! operation in [`crate::engine`] that returns events to a caller routes its
//! result batch through [`annotate`] before handing it back.

use roomstream_core::Seqnum;
use serde_json::json;

use crate::event::Event;
use crate::token::RoomStreamToken;

/// The ordering columns for one row, in the same order as the events they
/// annotate. Kept separate from [`Event`] because the repository query that
/// produces ordering information and the `EventStore` call that materializes
/// bodies are different collaborators: the annotator is the join
/// point between them.
#[derive(Clone, Copy, Debug)]
pub struct OrderRow {
    pub topological_ordering: i64,
    pub stream_ordering: Seqnum,
}

/// Attaches `before`/`after`/`order` to each event in place.
///
/// `topo_order` selects which cursor shape is written: `true` produces
/// topological (`t{depth}-{stream}`) cursors, `false` produces stream-only
/// (`s{stream}`) cursors. `events` and `rows` must be the same length and
/// already in the same order; this function does not sort or re-pair them.
pub fn annotate(events: &mut [Event], rows: &[OrderRow], topo_order: bool) {
    assert_eq!(
        events.len(),
        rows.len(),
        "annotate: events and rows must be paired 1:1"
    );
    for (event, row) in events.iter_mut().zip(rows) {
        let topo = topo_order.then_some(row.topological_ordering);
        let before = cursor(topo, row.stream_ordering - 1);
        let after = cursor(topo, row.stream_ordering);

        event.internal_metadata.insert("before".to_owned(), json!(before));
        event.internal_metadata.insert("after".to_owned(), json!(after));
        event
            .internal_metadata
            .insert("order".to_owned(), json!((topo.unwrap_or(0), row.stream_ordering)));
    }
}

fn cursor(topo: Option<i64>, stream: Seqnum) -> String {
    match topo {
        Some(t) => RoomStreamToken::new_topological(t, stream).to_string(),
        None => RoomStreamToken::new_stream(stream).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use roomstream_core::{OwnedEventId, OwnedRoomId, OwnedUserId};

    use super::*;

    fn event(id: &str) -> Event {
        Event::new(
            OwnedEventId::parse(id).unwrap(),
            OwnedRoomId::parse("!room:example.org").unwrap(),
            "m.room.message".to_owned(),
            OwnedUserId::parse("@alice:example.org").unwrap(),
            0,
            0,
            0,
        )
    }

    #[test]
    fn writes_stream_cursors_when_not_topo_ordered() {
        let mut events = vec![event("$a"), event("$b")];
        let rows = [
            OrderRow { topological_ordering: 9, stream_ordering: 5 },
            OrderRow { topological_ordering: 9, stream_ordering: 6 },
        ];
        annotate(&mut events, &rows, false);
        assert_eq!(events[0].internal_metadata["before"], json!("s4"));
        assert_eq!(events[0].internal_metadata["after"], json!("s5"));
        assert_eq!(events[1].internal_metadata["before"], json!("s5"));
        assert_eq!(events[1].internal_metadata["after"], json!("s6"));
    }

    #[test]
    fn writes_topological_cursors_when_topo_ordered() {
        let mut events = vec![event("$a")];
        let rows = [OrderRow { topological_ordering: 7, stream_ordering: 100 }];
        annotate(&mut events, &rows, true);
        assert_eq!(events[0].internal_metadata["before"], json!("t7-99"));
        assert_eq!(events[0].internal_metadata["after"], json!("t7-100"));
        assert_eq!(events[0].internal_metadata["order"], json!((7, 100)));
    }

    #[test]
    fn adjacent_events_compose_after_to_before() {
        let mut events = vec![event("$a"), event("$b"), event("$c")];
        let rows = [
            OrderRow { topological_ordering: 1, stream_ordering: 10 },
            OrderRow { topological_ordering: 1, stream_ordering: 11 },
            OrderRow { topological_ordering: 2, stream_ordering: 12 },
        ];
        annotate(&mut events, &rows, true);
        for pair in events.windows(2) {
            assert_eq!(pair[0].internal_metadata["after"], pair[1].internal_metadata["before"]);
        }
    }

    #[test]
    #[should_panic(expected = "paired 1:1")]
    fn panics_on_length_mismatch() {
        let mut events = vec![event("$a")];
        annotate(&mut events, &[], false);
    }
}

//! Pure, DB-agnostic bound predicates over the `(topological_ordering,
//! stream_ordering)` pair. These functions are the single source
//! of truth for "is this row on the correct side of this token" — the
//! Postgres repository turns them into `WHERE` clauses, and the in-memory
//! test repository evaluates them directly against a `Vec` of rows, so both
//! paths can never disagree about the asymmetric bound semantics.

use roomstream_core::Seqnum;

use crate::token::RoomStreamToken;

/// Rows strictly after `token` in the ordering it carries (stream-only or
/// composite). Used for the "give me everything newer than this cursor" side
/// of a range.
pub fn lower_bound_holds(token: &RoomStreamToken, topological: i64, stream: Seqnum) -> bool {
    match token.topological() {
        None => token.stream() < stream,
        Some(t) => t < topological || (t == topological && token.stream() < stream),
    }
}

/// Rows at or before `token`. Paired with [`lower_bound_holds`], the
/// strict/inclusive asymmetry is what lets a backward page's `next_token`
/// feed straight into a forward page without re-visiting or skipping the
/// boundary event.
pub fn upper_bound_holds(token: &RoomStreamToken, topological: i64, stream: Seqnum) -> bool {
    match token.topological() {
        None => token.stream() >= stream,
        Some(t) => t > topological || (t == topological && token.stream() >= stream),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::RoomStreamToken;

    #[test]
    fn stream_bounds_ignore_topological_column() {
        let tok = RoomStreamToken::new_stream(10);
        assert!(lower_bound_holds(&tok, 999, 11));
        assert!(!lower_bound_holds(&tok, 999, 10));
        assert!(upper_bound_holds(&tok, 999, 10));
        assert!(!upper_bound_holds(&tok, 999, 11));
    }

    #[test]
    fn topological_bounds_compare_composite_pair() {
        let tok = RoomStreamToken::new_topological(5, 100);
        // Strictly later depth always passes the lower bound.
        assert!(lower_bound_holds(&tok, 6, 0));
        // Same depth, later stream.
        assert!(lower_bound_holds(&tok, 5, 101));
        assert!(!lower_bound_holds(&tok, 5, 100));
        assert!(!lower_bound_holds(&tok, 4, 999));

        assert!(upper_bound_holds(&tok, 4, 999));
        assert!(upper_bound_holds(&tok, 5, 100));
        assert!(!upper_bound_holds(&tok, 5, 101));
        assert!(!upper_bound_holds(&tok, 6, 0));
    }

    #[test]
    fn bounds_meet_at_the_same_cursor_without_gap_or_overlap() {
        // The boundary event itself: upper_bound includes it, lower_bound
        // (on the same token) excludes it. Exactly one side ever returns it.
        let tok = RoomStreamToken::new_topological(5, 100);
        assert!(upper_bound_holds(&tok, 5, 100));
        assert!(!lower_bound_holds(&tok, 5, 100));
    }
}

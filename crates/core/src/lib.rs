//! Shared vocabulary for the room-stream and pagination engine: the
//! identifier newtypes, the stream-position integer type, and the direction
//! enum that every other crate in the workspace builds on.

pub mod error;
pub mod identifiers;

pub use error::IdParseError;
pub use identifiers::{EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};

/// A position in the global, monotonic stream order. Negative values are
/// reserved for backfilled events.
pub type Seqnum = i64;

/// The direction to walk events in, shared by both the live-stream and
/// pagination read paths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Walk backwards in time from the requested `from` token. This is the
    /// default because it is the common case for clients scrolling history.
    #[default]
    Backward,
    /// Walk forwards in time from the requested `from` token.
    Forward,
}

impl Direction {
    pub fn as_sql_order(self) -> &'static str {
        match self {
            Direction::Forward => "ASC",
            Direction::Backward => "DESC",
        }
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

impl std::str::FromStr for Direction {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b" | "B" => Ok(Direction::Backward),
            "f" | "F" => Ok(Direction::Forward),
            _ => Err("direction must be 'b' or 'f'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_matrix_wire_values() {
        assert_eq!("b".parse::<Direction>().unwrap(), Direction::Backward);
        assert_eq!("f".parse::<Direction>().unwrap(), Direction::Forward);
        assert!("x".parse::<Direction>().is_err());
    }
}

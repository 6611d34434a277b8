//! The opaque pagination cursor. A token is either a bare
//! position in stream order (`s123`) or a position in composite
//! (topological, stream) order (`t45-123`); both point *between* two events,
//! conventionally referencing the event immediately before the gap.

use std::fmt;
use std::str::FromStr;

use roomstream_core::Seqnum;

use crate::error::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoomStreamToken {
    Stream {
        stream: Seqnum,
    },
    Topological {
        topological: i64,
        stream: Seqnum,
    },
}

impl RoomStreamToken {
    pub fn new_stream(stream: Seqnum) -> Self {
        Self::Stream { stream }
    }

    pub fn new_topological(topological: i64, stream: Seqnum) -> Self {
        Self::Topological { topological, stream }
    }

    pub fn stream(&self) -> Seqnum {
        match *self {
            Self::Stream { stream } => stream,
            Self::Topological { stream, .. } => stream,
        }
    }

    pub fn topological(&self) -> Option<i64> {
        match *self {
            Self::Stream { .. } => None,
            Self::Topological { topological, .. } => Some(topological),
        }
    }

    /// Parses either token shape. This is the entry point pagination-facing
    /// operations use since they need the full
    /// composite position when it's available.
    pub fn parse(text: &str) -> Result<Self, EngineError> {
        parse_token(text)
    }

    /// Parses either token shape but always returns a value whose `.stream()`
    /// is meaningful on its own — operations that only ever compare stream
    /// order call this instead of
    /// [`parse`] so a topological token supplied by a confused client still
    /// degrades to its stream component rather than erroring.
    pub fn parse_stream(text: &str) -> Result<Self, EngineError> {
        parse_token(text)
    }
}

fn parse_token(text: &str) -> Result<RoomStreamToken, EngineError> {
    if let Some(rest) = text.strip_prefix('s') {
        let stream: Seqnum = rest
            .parse()
            .map_err(|_| EngineError::InvalidToken(text.to_owned()))?;
        Ok(RoomStreamToken::Stream { stream })
    } else if let Some(rest) = text.strip_prefix('t') {
        let (topo_part, stream_part) = rest
            .split_once('-')
            .ok_or_else(|| EngineError::InvalidToken(text.to_owned()))?;
        let topological: i64 = topo_part
            .parse()
            .map_err(|_| EngineError::InvalidToken(text.to_owned()))?;
        let stream: Seqnum = stream_part
            .parse()
            .map_err(|_| EngineError::InvalidToken(text.to_owned()))?;
        Ok(RoomStreamToken::Topological { topological, stream })
    } else {
        Err(EngineError::InvalidToken(text.to_owned()))
    }
}

impl FromStr for RoomStreamToken {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_token(s)
    }
}

impl fmt::Display for RoomStreamToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Stream { stream } => write!(f, "s{stream}"),
            Self::Topological { topological, stream } => write!(f, "t{topological}-{stream}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_stream_token() {
        let text = "s2633508";
        assert_eq!(RoomStreamToken::parse(text).unwrap().to_string(), text);
    }

    #[test]
    fn round_trips_negative_stream_token() {
        let text = "s-42";
        let token = RoomStreamToken::parse(text).unwrap();
        assert_eq!(token.stream(), -42);
        assert_eq!(token.to_string(), text);
    }

    #[test]
    fn round_trips_topological_token() {
        let text = "t426-2633508";
        let token = RoomStreamToken::parse(text).unwrap();
        assert_eq!(token.topological(), Some(426));
        assert_eq!(token.stream(), 2633508);
        assert_eq!(token.to_string(), text);
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["", "x1", "s", "t1", "t1-", "t1-2-3", "sabc", "t1-2x"] {
            assert!(RoomStreamToken::parse(bad).is_err(), "expected {bad:?} to be invalid");
        }
    }

    #[test]
    fn parse_stream_degrades_topological_tokens_to_their_stream_component() {
        let token = RoomStreamToken::parse_stream("t5-10").unwrap();
        assert_eq!(token.stream(), 10);
        assert_eq!(token.topological(), Some(5));
    }

    #[test]
    fn tokens_are_usable_as_map_keys() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(RoomStreamToken::new_stream(5), "five");
        assert_eq!(map.get(&RoomStreamToken::new_stream(5)), Some(&"five"));
        assert_eq!(map.get(&RoomStreamToken::new_stream(6)), None);
    }
}

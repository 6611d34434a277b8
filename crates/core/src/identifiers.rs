//! Opaque identifier newtypes shared by every crate in the workspace.
//!
//! Matrix identifiers are themselves just validated strings; the only thing
//! this module buys callers is that a `RoomId` and a `UserId` can never be
//! passed to the wrong parameter by accident, and that the construction
//! surface lives in one place. Validation here is intentionally forgiving
//! (it only checks the sigil byte each identifier kind uses) because the
//! engine receives already-validated identifiers from callers; strict MSC-grade
//! grammar validation belongs to the layer that accepts untrusted client input.

use std::fmt;

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};

use crate::error::IdParseError;

macro_rules! opaque_id {
    ($name:ident, $owned:ident, $sigil:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $owned(String);

        /// Borrowed view of [`
        #[doc = stringify!($owned)]
        /// `].
        #[repr(transparent)]
        #[derive(PartialEq, Eq, Hash)]
        pub struct $name(str);

        impl $owned {
            pub fn parse(s: impl Into<String>) -> Result<Self, IdParseError> {
                let s = s.into();
                if let Some(sigil) = $sigil {
                    if !s.starts_with(sigil) {
                        return Err(IdParseError::MissingSigil {
                            expected: sigil,
                            kind: stringify!($name),
                        });
                    }
                }
                if s.is_empty() {
                    return Err(IdParseError::Empty(stringify!($name)));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn as_id(&self) -> &$name {
                $name::from_borrowed(&self.0)
            }
        }

        impl $name {
            fn from_borrowed(s: &str) -> &Self {
                unsafe { &*(s as *const str as *const Self) }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn to_owned(&self) -> $owned {
                $owned(self.0.to_owned())
            }
        }

        impl std::ops::Deref for $owned {
            type Target = $name;

            fn deref(&self) -> &$name {
                self.as_id()
            }
        }

        impl std::borrow::Borrow<$name> for $owned {
            fn borrow(&self) -> &$name {
                self.as_id()
            }
        }

        impl AsRef<str> for $owned {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $owned {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $owned {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&self.0, f)
            }
        }

        impl std::str::FromStr for $owned {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<String> for $owned {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl<'a> From<&'a str> for $owned {
            fn from(s: &'a str) -> Self {
                Self(s.to_owned())
            }
        }

        impl<DB> ToSql<Text, DB> for $owned
        where
            DB: Backend,
            str: ToSql<Text, DB>,
        {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, DB>) -> serialize::Result {
                self.0.as_str().to_sql(out)
            }
        }

        impl<DB> FromSql<Text, DB> for $owned
        where
            DB: Backend,
            String: FromSql<Text, DB>,
        {
            fn from_sql(bytes: DB::RawValue<'_>) -> deserialize::Result<Self> {
                String::from_sql(bytes).map(Self)
            }
        }
    };
}

opaque_id!(RoomId, OwnedRoomId, Some('!'), "A Matrix room ID, e.g. `!abc123:example.org`.");
opaque_id!(EventId, OwnedEventId, None::<char>, "A Matrix event ID.");
opaque_id!(UserId, OwnedUserId, Some('@'), "A Matrix user ID, e.g. `@alice:example.org`.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_requires_sigil() {
        assert!(OwnedRoomId::parse("!abc:example.org").is_ok());
        assert!(matches!(
            OwnedRoomId::parse("abc:example.org"),
            Err(IdParseError::MissingSigil { .. })
        ));
    }

    #[test]
    fn user_id_requires_sigil() {
        assert!(OwnedUserId::parse("@alice:example.org").is_ok());
        assert!(OwnedUserId::parse("alice:example.org").is_err());
    }

    #[test]
    fn event_id_has_no_sigil_requirement() {
        assert!(OwnedEventId::parse("$anything").is_ok());
        assert!(OwnedEventId::parse("anything").is_ok());
        assert!(OwnedEventId::parse("").is_err());
    }

    #[test]
    fn owned_and_borrowed_compare_equal_as_str() {
        let owned = OwnedRoomId::parse("!abc:example.org").unwrap();
        assert_eq!(owned.as_str(), "!abc:example.org");
        assert_eq!(owned.as_id().as_str(), owned.as_str());
    }
}

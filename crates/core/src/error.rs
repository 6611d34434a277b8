use thiserror::Error;

/// Failure constructing one of the opaque identifier newtypes in
/// [`crate::identifiers`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("{kind} is missing required sigil '{expected}'")]
    MissingSigil { expected: char, kind: &'static str },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

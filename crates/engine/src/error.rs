use thiserror::Error;

/// The engine's complete error taxonomy. Callers at the HTTP
/// boundary map these to status codes (`InvalidToken`/`EventNotFound` -> 400/404,
/// everything else -> 500) — that mapping lives outside this crate.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("cyclic dependency detected while building collaborator {0:?}")]
    CyclicDependency(&'static str),

    #[error("database error: {0}")]
    Database(#[from] roomstream_data::DataError),

    #[error("operation cancelled")]
    Cancelled,

    /// Construction-time configuration failure: a malformed
    /// value anywhere in `EngineConfig` or a collaborator built from it
    /// (e.g. a bad appservice regex). Never raised mid-request.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

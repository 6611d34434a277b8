use thiserror::Error;

/// Failures surfaced by the connection-pool collaborator. Deliberately thin:
/// callers above this crate translate these into the engine's own
/// `EngineError::DatabaseError`, they never match on these variants directly.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database query error: {0}")]
    Diesel(#[from] diesel::result::Error),
    #[error("invalid database url: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type DataResult<T> = Result<T, DataError>;

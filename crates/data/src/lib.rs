//! The database-facing half of the room-stream engine: connection pooling,
//! the schema this engine is allowed to read, and the `run_interaction`
//! dispatch primitive. Nothing in here knows about tokens, caches, or the
//! nine read operations — that orchestration lives in `roomstream-engine`.

pub mod config;
pub mod error;
pub mod pool;
pub mod schema;

pub use config::DbConfig;
pub use error::{DataError, DataResult};
pub use pool::{ConnectionPool, PgPooledConnection, curr_sn, next_sn};

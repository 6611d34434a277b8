//! Configuration for the connection pool.
//!
//! All fields are overridable from the engine's layered config (file +
//! environment, see `roomstream-engine::config`); this struct only knows
//! about its own defaults.

use diesel::PgConnection;
use diesel::r2d2::{self, CustomizeConnection};
use serde::{Deserialize, Serialize};

fn default_pool_size() -> u32 {
    10
}
fn default_connection_timeout_ms() -> u64 {
    30_000
}
fn default_statement_timeout_ms() -> u64 {
    30_000
}
fn default_tcp_timeout_ms() -> u64 {
    10_000
}
fn default_helper_threads() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Postgres connection string.
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    pub min_idle: Option<u32>,
    #[serde(default = "default_tcp_timeout_ms")]
    pub tcp_timeout_ms: u64,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_helper_threads")]
    pub helper_threads: usize,
    #[serde(default)]
    pub enforce_tls: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            min_idle: None,
            tcp_timeout_ms: default_tcp_timeout_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            statement_timeout_ms: default_statement_timeout_ms(),
            helper_threads: default_helper_threads(),
            enforce_tls: false,
        }
    }
}

/// Sets `statement_timeout` on every connection as it is checked out of the
/// pool, so a single runaway pagination query can't monopolize a worker.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub statement_timeout_ms: u64,
}

impl CustomizeConnection<PgConnection, r2d2::Error> for ConnectionConfig {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), r2d2::Error> {
        use diesel::RunQueryDsl;
        use diesel::sql_query;

        sql_query(format!("SET statement_timeout = {}", self.statement_timeout_ms))
            .execute(conn)
            .map_err(r2d2::Error::QueryError)?;
        Ok(())
    }
}

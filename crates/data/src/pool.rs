//! The `run_interaction` collaborator: a bounded pool of Postgres
//! connections plus a way to dispatch a synchronous closure onto one of them
//! without blocking the async runtime.

use std::sync::Arc;
use std::time::Duration;

use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection, State};
use roomstream_core::Seqnum;
use scheduled_thread_pool::ScheduledThreadPool;

use crate::config::{ConnectionConfig, DbConfig};
use crate::error::{DataError, DataResult};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// A connected, bounded pool of database workers. Cloning is cheap (it's an
/// `Arc` underneath, same as Diesel's own `r2d2::Pool`).
#[derive(Clone)]
pub struct ConnectionPool {
    inner: PgPool,
}

impl ConnectionPool {
    pub fn connect(config: &DbConfig) -> DataResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.url);
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(config.min_idle)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .connection_customizer(Box::new(ConnectionConfig {
                statement_timeout_ms: config.statement_timeout_ms,
            }))
            .thread_pool(Arc::new(ScheduledThreadPool::new(config.helper_threads)))
            .build(manager)?;
        Ok(Self { inner: pool })
    }

    pub fn get(&self) -> DataResult<PgPooledConnection> {
        Ok(self.inner.get()?)
    }

    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Runs a synchronous Diesel closure to completion on a blocking worker
    /// thread and awaits its result. This is the engine's sole suspension
    /// point for talking to the database: `f` must not call back into the
    /// engine, and it owns the connection for its whole lifetime (one
    /// transaction's worth of work).
    pub async fn run_interaction<F, T>(&self, name: &'static str, f: F) -> DataResult<T>
    where
        F: FnOnce(&mut PgConnection) -> diesel::QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.inner.clone();
        let result = tokio::task::spawn_blocking(move || -> DataResult<T> {
            let mut conn = pool.get()?;
            tracing::debug!(interaction = name, "running db interaction");
            f(&mut conn).map_err(DataError::from)
        })
        .await?;
        result
    }
}

/// Returns the next value of the `stream_ordering` sequence, allocating a
/// fresh stream id. Only the write path (outside this engine's scope) should
/// call this; the engine only ever reads the frontier via [`curr_sn`].
pub fn next_sn(conn: &mut PgConnection) -> diesel::QueryResult<Seqnum> {
    use diesel::RunQueryDsl;
    use diesel::sql_types::BigInt;

    diesel::dsl::sql::<BigInt>("SELECT nextval('stream_ordering_seq')").get_result(conn)
}

/// Returns the largest `stream_ordering` value allocated so far, without
/// allocating a new one. This is the frontier [`StreamIdGenerator::current_token`]
/// is built on.
pub fn curr_sn(conn: &mut PgConnection) -> diesel::QueryResult<Seqnum> {
    use diesel::RunQueryDsl;
    use diesel::sql_types::BigInt;

    diesel::dsl::sql::<BigInt>("SELECT last_value FROM stream_ordering_seq").get_result(conn)
}

//! `StreamIdGenerator`: the process-wide monotonic allocator for
//! `stream_ordering`, and the sole source of truth for "what's the newest
//! committed position?" that [`crate::engine::StreamEngine::get_room_events_max_id`]
//! builds its forward-direction token from.
//!
//! Allocation itself belongs to the write path, which this engine does not
//! implement. What the engine needs is `current_token`, and
//! it needs it to be safe under concurrent writers: a reader must never see
//! a stream id as "current" while an earlier id is still mid-commit, or a
//! later reader could observe events out of the order their ids promise.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use roomstream_core::Seqnum;

use crate::error::EngineResult;

#[async_trait]
pub trait StreamIdGenerator: Send + Sync {
    /// The largest `stream_ordering` for which every smaller id has already
    /// committed. Not necessarily the largest id ever allocated: an id
    /// reserved by a writer that hasn't committed yet holds the frontier
    /// back, so out-of-order commits never become visible early.
    async fn current_token(&self) -> EngineResult<Seqnum>;
}

/// Production implementation: the frontier is a Postgres sequence, read
/// through the same connection pool every other query goes through.
pub struct PgStreamIdGenerator {
    pool: roomstream_data::ConnectionPool,
}

impl PgStreamIdGenerator {
    pub fn new(pool: roomstream_data::ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamIdGenerator for PgStreamIdGenerator {
    async fn current_token(&self) -> EngineResult<Seqnum> {
        let sn = self
            .pool
            .run_interaction("stream_id_gen.current_token", |conn| roomstream_data::curr_sn(conn))
            .await?;
        Ok(sn)
    }
}

/// In-process implementation used by tests and by the in-memory repository
/// fixture: a monotonic counter plus a pending-commit set, so tests can
/// exercise out-of-order commit visibility without a database.
pub struct InMemoryStreamIdGenerator {
    next: AtomicI64,
    pending: Mutex<BTreeSet<Seqnum>>,
}

impl InMemoryStreamIdGenerator {
    pub fn new(start: Seqnum) -> Self {
        Self {
            next: AtomicI64::new(start),
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    /// Reserves the next id and marks it pending (not yet visible to
    /// readers).
    pub fn allocate(&self) -> Seqnum {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.lock().insert(id);
        id
    }

    /// Marks a previously allocated id as committed, making it (and any
    /// contiguous run it completes) visible to [`StreamIdGenerator::current_token`].
    pub fn commit(&self, id: Seqnum) {
        self.pending.lock().remove(&id);
    }
}

#[async_trait]
impl StreamIdGenerator for InMemoryStreamIdGenerator {
    async fn current_token(&self) -> EngineResult<Seqnum> {
        let pending = self.pending.lock();
        match pending.iter().next() {
            // Something below this id is still uncommitted; the frontier
            // stops just before it even though higher ids may already be done.
            Some(&lowest_pending) => Ok(lowest_pending - 1),
            None => Ok(self.next.load(Ordering::SeqCst)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frontier_advances_as_ids_commit_in_order() {
        let gen = InMemoryStreamIdGenerator::new(0);
        let a = gen.allocate();
        assert_eq!(gen.current_token().await.unwrap(), 0);
        gen.commit(a);
        assert_eq!(gen.current_token().await.unwrap(), a);
    }

    #[tokio::test]
    async fn out_of_order_commit_does_not_advance_frontier_past_a_gap() {
        let gen = InMemoryStreamIdGenerator::new(0);
        let a = gen.allocate();
        let b = gen.allocate();
        gen.commit(b);
        // `a` is still pending, so the frontier must not expose `b` yet even
        // though it committed first.
        assert_eq!(gen.current_token().await.unwrap(), 0);
        gen.commit(a);
        assert_eq!(gen.current_token().await.unwrap(), b);
    }
}

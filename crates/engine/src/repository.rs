//! `StreamRepository`: the typed trait boundary between
//! [`crate::engine::StreamEngine`]'s orchestration logic and the concrete
//! SQL each of the nine read operations needs. Every method here
//! corresponds 1:1 to one of the named SQL statements; the engine
//! never builds a query itself. [`PgStreamRepository`] runs each method as a
//! synchronous Diesel query dispatched through [`roomstream_data::ConnectionPool::run_interaction`];
//! [`InMemoryStreamRepository`] evaluates the identical bound predicates
//! (from [`crate::order`]) against an in-process `Vec`, so the engine is
//! fully testable without Postgres.

use std::collections::HashSet;

use async_trait::async_trait;
use diesel::prelude::*;
use parking_lot::RwLock;
use roomstream_core::{Direction, EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, Seqnum, UserId};
use roomstream_data::ConnectionPool;
use roomstream_data::schema::{appservice_rooms, events, room_memberships, state_events};

use crate::error::EngineResult;
use crate::order::{lower_bound_holds, upper_bound_holds};
use crate::token::RoomStreamToken;

/// A row shape shared by every operation that only needs to know *which*
/// event sits at *which* ordering position: the live stream, the recent-events
/// window, and the before/after windows around a pinned event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRow {
    pub event_id: OwnedEventId,
    pub stream_ordering: Seqnum,
    pub topological_ordering: i64,
}

/// Row shape for the appservice stream: the filter needs `room_id`,
/// `event_type`, and `state_key` to decide interest before ever
/// materializing a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppserviceRow {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub event_type: String,
    pub state_key: Option<String>,
    pub stream_ordering: Seqnum,
}

/// Row shape for a user's membership-change events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipRow {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub stream_ordering: Seqnum,
}

#[async_trait]
pub trait StreamRepository: Send + Sync {
    /// Rows for one room's live stream window, `(from_token, to_token]`
    /// in stream order. `from_token.is_none()` orders by the composite key
    /// (recent-history semantics); otherwise by `stream_ordering` alone.
    async fn room_stream_rows(
        &self,
        room_id: &RoomId,
        from_token: Option<RoomStreamToken>,
        to_token: RoomStreamToken,
        limit: i64,
        direction: Direction,
    ) -> EngineResult<Vec<StreamRow>>;

    /// Cross-room rows in `(from_token, to_token]` stream order,
    /// carrying the columns needed to apply the appservice interest filter
    /// before any body is materialized.
    async fn appservice_stream_rows(
        &self,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
        limit: i64,
    ) -> EngineResult<Vec<AppserviceRow>>;

    /// The service's materialized room interest set.
    async fn interested_room_ids(&self, service_id: &str) -> EngineResult<HashSet<OwnedRoomId>>;

    /// Membership-change rows for one user in `(from_token, to_token]`.
    async fn membership_rows(
        &self,
        user_id: &UserId,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
    ) -> EngineResult<Vec<MembershipRow>>;

    /// Bidirectional bounded pagination in composite order.
    /// `upper_token` admits rows `<= upper_token`;
    /// `lower_token` admits rows strictly `> lower_token` (`lower_bound`).
    /// The caller resolves which of `from_token`/`to_token` plays which role
    /// for the requested `direction`; either bound may be absent (an
    /// unbounded pagination page).
    async fn paginate_rows(
        &self,
        room_id: &RoomId,
        upper_token: Option<RoomStreamToken>,
        lower_token: Option<RoomStreamToken>,
        direction: Direction,
        limit: Option<i64>,
    ) -> EngineResult<Vec<StreamRow>>;

    /// The last `limit` rows at or before `end_token` (and, if given,
    /// after `from_token`), in descending composite order.
    async fn recent_rows(
        &self,
        room_id: &RoomId,
        end_token: RoomStreamToken,
        from_token: Option<RoomStreamToken>,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>>;

    /// One event's ordering position, if it exists and isn't an
    /// outlier.
    async fn event_position(&self, event_id: &EventId) -> EngineResult<Option<(Seqnum, i64)>>;

    /// Rows strictly before the pinned composite position, descending.
    async fn before_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>>;

    /// Rows strictly after the pinned composite position, ascending.
    async fn after_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>>;

    /// `max(topological_ordering) WHERE outlier = false`, across all
    /// rooms (this operation has no room parameter).
    async fn max_topological_ordering(&self) -> EngineResult<i64>;
}

/// Production repository: every method is one Diesel query, run on a
/// blocking worker through the connection pool.
pub struct PgStreamRepository {
    pool: ConnectionPool,
}

impl PgStreamRepository {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamRepository for PgStreamRepository {
    async fn room_stream_rows(
        &self,
        room_id: &RoomId,
        from_token: Option<RoomStreamToken>,
        to_token: RoomStreamToken,
        limit: i64,
        direction: Direction,
    ) -> EngineResult<Vec<StreamRow>> {
        let room_id = room_id.to_owned();
        let rows = self
            .pool
            .run_interaction("room_stream_rows", move |conn| {
                let mut query = events::table
                    .filter(events::room_id.eq(room_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .into_boxed();

                // to_token is an upper bound: rows <= to_token (topo strictly
                // lower, or equal depth with stream <= to_token's).
                query = match to_token.topological() {
                    Some(t) => query.filter(
                        events::topological_ordering
                            .lt(t)
                            .or(events::topological_ordering.eq(t).and(events::stream_ordering.le(to_token.stream()))),
                    ),
                    None => query.filter(events::stream_ordering.le(to_token.stream())),
                };
                if let Some(from_token) = from_token {
                    // from_token is a lower bound: rows strictly > from_token.
                    query = match from_token.topological() {
                        Some(t) => query.filter(
                            events::topological_ordering.gt(t).or(events::topological_ordering
                                .eq(t)
                                .and(events::stream_ordering.gt(from_token.stream()))),
                        ),
                        None => query.filter(events::stream_ordering.gt(from_token.stream())),
                    };
                }

                let rows: Vec<(String, i64, i64)> = if from_token.is_none() {
                    match direction {
                        Direction::Forward => query
                            .order((events::topological_ordering.asc(), events::stream_ordering.asc()))
                            .limit(limit)
                            .select((events::event_id, events::stream_ordering, events::topological_ordering))
                            .load(conn)?,
                        Direction::Backward => query
                            .order((events::topological_ordering.desc(), events::stream_ordering.desc()))
                            .limit(limit)
                            .select((events::event_id, events::stream_ordering, events::topological_ordering))
                            .load(conn)?,
                    }
                } else {
                    match direction {
                        Direction::Forward => query
                            .order(events::stream_ordering.asc())
                            .limit(limit)
                            .select((events::event_id, events::stream_ordering, events::topological_ordering))
                            .load(conn)?,
                        Direction::Backward => query
                            .order(events::stream_ordering.desc())
                            .limit(limit)
                            .select((events::event_id, events::stream_ordering, events::topological_ordering))
                            .load(conn)?,
                    }
                };
                Ok(rows)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, stream_ordering, topological_ordering)| StreamRow {
                event_id: OwnedEventId::from(event_id),
                stream_ordering,
                topological_ordering,
            })
            .collect())
    }

    async fn appservice_stream_rows(
        &self,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
        limit: i64,
    ) -> EngineResult<Vec<AppserviceRow>> {
        let rows = self
            .pool
            .run_interaction("appservice_stream_rows", move |conn| {
                events::table
                    .left_join(state_events::table)
                    .filter(events::stream_ordering.gt(from_token.stream()))
                    .filter(events::stream_ordering.le(to_token.stream()))
                    .filter(events::outlier.eq(false))
                    .order(events::stream_ordering.asc())
                    .limit(limit)
                    .select((
                        events::event_id,
                        events::room_id,
                        events::event_type,
                        state_events::state_key.nullable(),
                        events::stream_ordering,
                    ))
                    .load::<(String, String, String, Option<String>, i64)>(conn)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(event_id, room_id, event_type, state_key, stream_ordering)| AppserviceRow {
                    event_id: OwnedEventId::from(event_id),
                    room_id: OwnedRoomId::from(room_id),
                    event_type,
                    state_key,
                    stream_ordering,
                },
            )
            .collect())
    }

    async fn interested_room_ids(&self, service_id: &str) -> EngineResult<HashSet<OwnedRoomId>> {
        let service_id = service_id.to_owned();
        let rooms = self
            .pool
            .run_interaction("interested_room_ids", move |conn| {
                appservice_rooms::table
                    .filter(appservice_rooms::service_id.eq(service_id))
                    .select(appservice_rooms::room_id)
                    .load::<String>(conn)
            })
            .await?;
        Ok(rooms.into_iter().map(OwnedRoomId::from).collect())
    }

    async fn membership_rows(
        &self,
        user_id: &UserId,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
    ) -> EngineResult<Vec<MembershipRow>> {
        let user_id = user_id.to_owned();
        let rows = self
            .pool
            .run_interaction("membership_rows", move |conn| {
                events::table
                    .inner_join(room_memberships::table)
                    .filter(room_memberships::user_id.eq(user_id.as_str()))
                    .filter(events::stream_ordering.gt(from_token.stream()))
                    .filter(events::stream_ordering.le(to_token.stream()))
                    .order(events::stream_ordering.asc())
                    .select((events::event_id, events::room_id, events::stream_ordering))
                    .load::<(String, String, i64)>(conn)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(event_id, room_id, stream_ordering)| MembershipRow {
                event_id: OwnedEventId::from(event_id),
                room_id: OwnedRoomId::from(room_id),
                stream_ordering,
            })
            .collect())
    }

    async fn paginate_rows(
        &self,
        room_id: &RoomId,
        upper_token: Option<RoomStreamToken>,
        lower_token: Option<RoomStreamToken>,
        direction: Direction,
        limit: Option<i64>,
    ) -> EngineResult<Vec<StreamRow>> {
        let room_id = room_id.to_owned();
        let rows = self
            .pool
            .run_interaction("paginate_rows", move |conn| {
                let mut query = events::table
                    .filter(events::room_id.eq(room_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .into_boxed();

                // upper_token: rows <= upper_token.
                if let Some(upper_token) = upper_token {
                    query = match upper_token.topological() {
                        Some(t) => query.filter(
                            events::topological_ordering
                                .lt(t)
                                .or(events::topological_ordering.eq(t).and(events::stream_ordering.le(upper_token.stream()))),
                        ),
                        None => query.filter(events::stream_ordering.le(upper_token.stream())),
                    };
                }
                // lower_token: rows strictly > lower_token.
                if let Some(lower_token) = lower_token {
                    query = match lower_token.topological() {
                        Some(t) => query.filter(
                            events::topological_ordering
                                .gt(t)
                                .or(events::topological_ordering.eq(t).and(events::stream_ordering.gt(lower_token.stream()))),
                        ),
                        None => query.filter(events::stream_ordering.gt(lower_token.stream())),
                    };
                }

                let query = query.order(match direction {
                    Direction::Backward => (events::topological_ordering.desc(), events::stream_ordering.desc()),
                    Direction::Forward => (events::topological_ordering.asc(), events::stream_ordering.asc()),
                });
                let select = query.select((events::event_id, events::stream_ordering, events::topological_ordering));
                match limit {
                    Some(limit) => select.limit(limit).load(conn),
                    None => select.load(conn),
                }
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, stream_ordering, topological_ordering): (String, i64, i64)| StreamRow {
                event_id: OwnedEventId::from(event_id),
                stream_ordering,
                topological_ordering,
            })
            .collect())
    }

    async fn recent_rows(
        &self,
        room_id: &RoomId,
        end_token: RoomStreamToken,
        from_token: Option<RoomStreamToken>,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let room_id = room_id.to_owned();
        let rows = self
            .pool
            .run_interaction("recent_rows", move |conn| {
                let mut query = events::table
                    .filter(events::room_id.eq(room_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .filter(events::stream_ordering.le(end_token.stream()))
                    .into_boxed();
                if let Some(from_token) = from_token {
                    query = query.filter(events::stream_ordering.gt(from_token.stream()));
                }
                query
                    .order((events::topological_ordering.desc(), events::stream_ordering.desc()))
                    .limit(limit)
                    .select((events::event_id, events::stream_ordering, events::topological_ordering))
                    .load(conn)
            })
            .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, stream_ordering, topological_ordering): (String, i64, i64)| StreamRow {
                event_id: OwnedEventId::from(event_id),
                stream_ordering,
                topological_ordering,
            })
            .collect())
    }

    async fn event_position(&self, event_id: &EventId) -> EngineResult<Option<(Seqnum, i64)>> {
        let event_id = event_id.to_owned();
        let row = self
            .pool
            .run_interaction("event_position", move |conn| {
                events::table
                    .filter(events::event_id.eq(event_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .select((events::stream_ordering, events::topological_ordering))
                    .first::<(i64, i64)>(conn)
                    .optional()
            })
            .await?;
        Ok(row)
    }

    async fn before_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let room_id = room_id.to_owned();
        let rows = self
            .pool
            .run_interaction("before_window", move |conn| {
                events::table
                    .filter(events::room_id.eq(room_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .filter(
                        events::topological_ordering.lt(pin_topological).or(events::topological_ordering
                            .eq(pin_topological)
                            .and(events::stream_ordering.lt(pin_stream))),
                    )
                    .order((events::topological_ordering.desc(), events::stream_ordering.desc()))
                    .limit(limit)
                    .select((events::event_id, events::stream_ordering, events::topological_ordering))
                    .load(conn)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(event_id, stream_ordering, topological_ordering): (String, i64, i64)| StreamRow {
                event_id: OwnedEventId::from(event_id),
                stream_ordering,
                topological_ordering,
            })
            .collect())
    }

    async fn after_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let room_id = room_id.to_owned();
        let rows = self
            .pool
            .run_interaction("after_window", move |conn| {
                events::table
                    .filter(events::room_id.eq(room_id.as_str()))
                    .filter(events::outlier.eq(false))
                    .filter(
                        events::topological_ordering.gt(pin_topological).or(events::topological_ordering
                            .eq(pin_topological)
                            .and(events::stream_ordering.gt(pin_stream))),
                    )
                    .order((events::topological_ordering.asc(), events::stream_ordering.asc()))
                    .limit(limit)
                    .select((events::event_id, events::stream_ordering, events::topological_ordering))
                    .load(conn)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(event_id, stream_ordering, topological_ordering): (String, i64, i64)| StreamRow {
                event_id: OwnedEventId::from(event_id),
                stream_ordering,
                topological_ordering,
            })
            .collect())
    }

    async fn max_topological_ordering(&self) -> EngineResult<i64> {
        let max = self
            .pool
            .run_interaction("max_topological_ordering", |conn| {
                events::table
                    .filter(events::outlier.eq(false))
                    .select(diesel::dsl::max(events::topological_ordering))
                    .first::<Option<i64>>(conn)
            })
            .await?;
        Ok(max.unwrap_or(0))
    }
}

/// An in-process row, as the in-memory repository stores it: the full set of
/// ordering-relevant columns, enough to answer every method in
/// [`StreamRepository`] by filtering and sorting a `Vec` directly.
#[derive(Clone, Debug)]
pub struct FixtureEvent {
    pub event_id: OwnedEventId,
    pub room_id: OwnedRoomId,
    pub event_type: String,
    pub state_key: Option<String>,
    pub sender: OwnedUserId,
    pub outlier: bool,
    pub stream_ordering: Seqnum,
    pub topological_ordering: i64,
}

/// Test/fixture repository: the same bound predicates from [`crate::order`],
/// evaluated against an in-memory `Vec<FixtureEvent>` instead of a SQL
/// `WHERE` clause. Lets the engine's nine operations run in unit tests with
/// no database at all.
#[derive(Default)]
pub struct InMemoryStreamRepository {
    rows: RwLock<Vec<FixtureEvent>>,
    appservice_rooms: RwLock<std::collections::HashMap<String, HashSet<OwnedRoomId>>>,
}

impl InMemoryStreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: FixtureEvent) {
        self.rows.write().push(row);
    }

    pub fn set_interested_rooms(&self, service_id: impl Into<String>, rooms: impl IntoIterator<Item = OwnedRoomId>) {
        self.appservice_rooms
            .write()
            .insert(service_id.into(), rooms.into_iter().collect());
    }

    fn snapshot(&self) -> Vec<FixtureEvent> {
        self.rows.read().clone()
    }
}

fn sort_key(row: &FixtureEvent) -> (i64, Seqnum) {
    (row.topological_ordering, row.stream_ordering)
}

fn to_stream_row(row: &FixtureEvent) -> StreamRow {
    StreamRow {
        event_id: row.event_id.clone(),
        stream_ordering: row.stream_ordering,
        topological_ordering: row.topological_ordering,
    }
}

#[async_trait]
impl StreamRepository for InMemoryStreamRepository {
    async fn room_stream_rows(
        &self,
        room_id: &RoomId,
        from_token: Option<RoomStreamToken>,
        to_token: RoomStreamToken,
        limit: i64,
        direction: Direction,
    ) -> EngineResult<Vec<StreamRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.room_id.as_str() == room_id.as_str() && !r.outlier)
            .filter(|r| upper_bound_holds(&to_token, r.topological_ordering, r.stream_ordering))
            .filter(|r| match from_token {
                Some(from_token) => lower_bound_holds(&from_token, r.topological_ordering, r.stream_ordering),
                None => true,
            })
            .collect();

        if from_token.is_none() {
            rows.sort_by_key(sort_key);
        } else {
            rows.sort_by_key(|r| r.stream_ordering);
        }
        if matches!(direction, Direction::Backward) {
            rows.reverse();
        }
        rows.truncate(limit.max(0) as usize);
        Ok(rows.iter().map(to_stream_row).collect())
    }

    async fn appservice_stream_rows(
        &self,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
        limit: i64,
    ) -> EngineResult<Vec<AppserviceRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| !r.outlier)
            .filter(|r| r.stream_ordering > from_token.stream() && r.stream_ordering <= to_token.stream())
            .collect();
        rows.sort_by_key(|r| r.stream_ordering);
        rows.truncate(limit.max(0) as usize);
        Ok(rows
            .into_iter()
            .map(|r| AppserviceRow {
                event_id: r.event_id,
                room_id: r.room_id,
                event_type: r.event_type,
                state_key: r.state_key,
                stream_ordering: r.stream_ordering,
            })
            .collect())
    }

    async fn interested_room_ids(&self, service_id: &str) -> EngineResult<HashSet<OwnedRoomId>> {
        Ok(self.appservice_rooms.read().get(service_id).cloned().unwrap_or_default())
    }

    async fn membership_rows(
        &self,
        user_id: &UserId,
        from_token: RoomStreamToken,
        to_token: RoomStreamToken,
    ) -> EngineResult<Vec<MembershipRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.event_type == "m.room.member" && r.state_key.as_deref() == Some(user_id.as_str()))
            .filter(|r| r.stream_ordering > from_token.stream() && r.stream_ordering <= to_token.stream())
            .collect();
        rows.sort_by_key(|r| r.stream_ordering);
        Ok(rows
            .into_iter()
            .map(|r| MembershipRow {
                event_id: r.event_id,
                room_id: r.room_id,
                stream_ordering: r.stream_ordering,
            })
            .collect())
    }

    async fn paginate_rows(
        &self,
        room_id: &RoomId,
        upper_token: Option<RoomStreamToken>,
        lower_token: Option<RoomStreamToken>,
        direction: Direction,
        limit: Option<i64>,
    ) -> EngineResult<Vec<StreamRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.room_id.as_str() == room_id.as_str() && !r.outlier)
            .filter(|r| match upper_token {
                Some(upper_token) => upper_bound_holds(&upper_token, r.topological_ordering, r.stream_ordering),
                None => true,
            })
            .filter(|r| match lower_token {
                Some(lower_token) => lower_bound_holds(&lower_token, r.topological_ordering, r.stream_ordering),
                None => true,
            })
            .collect();

        rows.sort_by_key(sort_key);
        if matches!(direction, Direction::Backward) {
            rows.reverse();
        }
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows.iter().map(to_stream_row).collect())
    }

    async fn recent_rows(
        &self,
        room_id: &RoomId,
        end_token: RoomStreamToken,
        from_token: Option<RoomStreamToken>,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.room_id.as_str() == room_id.as_str() && !r.outlier)
            .filter(|r| r.stream_ordering <= end_token.stream())
            .filter(|r| match from_token {
                Some(from_token) => r.stream_ordering > from_token.stream(),
                None => true,
            })
            .collect();
        rows.sort_by_key(sort_key);
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows.iter().map(to_stream_row).collect())
    }

    async fn event_position(&self, event_id: &EventId) -> EngineResult<Option<(Seqnum, i64)>> {
        Ok(self
            .snapshot()
            .into_iter()
            .find(|r| r.event_id.as_str() == event_id.as_str() && !r.outlier)
            .map(|r| (r.stream_ordering, r.topological_ordering)))
    }

    async fn before_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.room_id.as_str() == room_id.as_str() && !r.outlier)
            .filter(|r| (r.topological_ordering, r.stream_ordering) < (pin_topological, pin_stream))
            .collect();
        rows.sort_by_key(sort_key);
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows.iter().map(to_stream_row).collect())
    }

    async fn after_window(
        &self,
        room_id: &RoomId,
        pin_topological: i64,
        pin_stream: Seqnum,
        limit: i64,
    ) -> EngineResult<Vec<StreamRow>> {
        let mut rows: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.room_id.as_str() == room_id.as_str() && !r.outlier)
            .filter(|r| (r.topological_ordering, r.stream_ordering) > (pin_topological, pin_stream))
            .collect();
        rows.sort_by_key(sort_key);
        rows.truncate(limit.max(0) as usize);
        Ok(rows.iter().map(to_stream_row).collect())
    }

    async fn max_topological_ordering(&self) -> EngineResult<i64> {
        Ok(self
            .snapshot()
            .iter()
            .filter(|r| !r.outlier)
            .map(|r| r.topological_ordering)
            .max()
            .unwrap_or(0))
    }
}

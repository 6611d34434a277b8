//! `StreamEngine`: the query planner and executor for the
//! nine read operations. Everything here is orchestration — token parsing,
//! cache consultation, fan-out, and stitching the repository's rows together
//! with `EventStore`'s bodies and the annotator's cursors. No SQL is built
//! in this file; that's [`crate::repository::StreamRepository`]'s job.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use roomstream_core::{Direction, EventId, OwnedEventId, OwnedRoomId, OwnedUserId, RoomId, UserId};
use tokio::sync::OnceCell;

use crate::annotator::{self, OrderRow};
use crate::appservice::Service;
use crate::change_cache::ChangeCache;
use crate::config::StreamConfig;
use crate::error::{EngineError, EngineResult};
use crate::event::Event;
use crate::event_store::EventStore;
use crate::repository::StreamRepository;
use crate::stream_id::StreamIdGenerator;
use crate::token::RoomStreamToken;

/// `(events, next_token)` — the shape shared by the live-stream read operations.
#[derive(Clone, Debug)]
pub struct StreamPage {
    pub events: Vec<Event>,
    pub next_token: String,
}

/// A page in composite order plus the cursor to resume from in the same
/// direction.
#[derive(Clone, Debug)]
pub struct PaginationPage {
    pub events: Vec<Event>,
    pub next_token: String,
}

/// A forward-ordered window plus the pair of tokens that bracket it.
#[derive(Clone, Debug)]
pub struct RecentEventsPage {
    pub events: Vec<Event>,
    pub start_token: String,
    pub end_token: String,
}

/// The neighbourhood of events immediately around a pinned event.
#[derive(Clone, Debug)]
pub struct EventContext {
    pub events_before: Vec<Event>,
    pub events_after: Vec<Event>,
    pub start: String,
    pub end: String,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct RecentEventsKey {
    room_id: OwnedRoomId,
    limit: i64,
    end: RoomStreamToken,
    from: Option<RoomStreamToken>,
}

pub struct StreamEngine {
    repository: Arc<dyn StreamRepository>,
    event_store: Arc<dyn EventStore>,
    stream_id_gen: Arc<dyn StreamIdGenerator>,
    room_change_cache: Arc<ChangeCache<OwnedRoomId>>,
    membership_change_cache: Arc<ChangeCache<OwnedUserId>>,
    fanout_concurrency: usize,
    max_batch_size: i64,
    recent_events_memo: Mutex<HashMap<RecentEventsKey, Arc<OnceCell<RecentEventsPage>>>>,
}

impl StreamEngine {
    pub fn new(
        repository: Arc<dyn StreamRepository>,
        event_store: Arc<dyn EventStore>,
        stream_id_gen: Arc<dyn StreamIdGenerator>,
        room_change_cache: Arc<ChangeCache<OwnedRoomId>>,
        membership_change_cache: Arc<ChangeCache<OwnedUserId>>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            repository,
            event_store,
            stream_id_gen,
            room_change_cache,
            membership_change_cache,
            fanout_concurrency: config.fanout_concurrency,
            max_batch_size: config.max_batch_size,
            recent_events_memo: Mutex::new(HashMap::new()),
        }
    }

    /// events for one room in `(from_token, to_token]` stream order.
    #[tracing::instrument(skip(self), fields(room_id = %room_id))]
    pub async fn get_room_events_stream_for_room(
        &self,
        room_id: &RoomId,
        from_token: Option<&str>,
        to_token: &str,
        limit: i64,
        direction: Direction,
    ) -> EngineResult<StreamPage> {
        let to = stream_only(RoomStreamToken::parse_stream(to_token)?);
        let from = from_token.map(RoomStreamToken::parse_stream).transpose()?.map(stream_only);

        if let Some(from) = from {
            if from == to {
                return Ok(echo(from_token.unwrap()));
            }
            if !self.room_change_cache.has_entity_changed(&room_id.to_owned(), from.stream()) {
                return Ok(echo(from_token.unwrap()));
            }
        }

        let rows = self.repository.room_stream_rows(room_id, from, to, limit, direction).await?;
        let mut events = self.materialize(&rows).await?;
        annotator::annotate(&mut events, &order_rows(&rows), from.is_none());

        if matches!(direction, Direction::Backward) {
            events.reverse();
        }

        let next_token = rows
            .iter()
            .map(|r| r.stream_ordering)
            .min()
            .map(|s| RoomStreamToken::new_stream(s).to_string())
            .unwrap_or_else(|| from_token.map(str::to_owned).unwrap_or_else(|| to_token.to_owned()));

        Ok(StreamPage { events, next_token })
    }

    /// fans the single-room operation out across many rooms, pruned by the room change
    /// cache and bounded to `fanout_concurrency` in-flight queries.
    #[tracing::instrument(skip(self, room_ids))]
    pub async fn get_room_events_stream_for_rooms(
        &self,
        room_ids: &[OwnedRoomId],
        from_token: Option<&str>,
        to_token: &str,
        limit: i64,
        direction: Direction,
    ) -> EngineResult<HashMap<OwnedRoomId, StreamPage>> {
        let from_stream = from_token.map(RoomStreamToken::parse_stream).transpose()?.map(|t| t.stream());

        let candidates: Vec<OwnedRoomId> = match from_stream {
            Some(since) => self
                .room_change_cache
                .get_entities_changed(room_ids.iter(), since)
                .into_iter()
                .collect(),
            None => room_ids.to_vec(),
        };

        let results: Vec<EngineResult<(OwnedRoomId, StreamPage)>> = stream::iter(candidates)
            .map(|room_id| async move {
                let page = self
                    .get_room_events_stream_for_room(&room_id, from_token, to_token, limit, direction)
                    .await?;
                Ok((room_id, page))
            })
            .buffer_unordered(self.fanout_concurrency)
            .collect()
            .await;

        // First error wins; later successful siblings in the same batch are
        // discarded rather than partially reported (the propagation
        // policy — true cancellation of the sibling futures themselves would
        // need a cooperative abort handle, which `buffer_unordered` doesn't
        // expose, so this is best-effort rather than mid-flight abort).
        let mut out = HashMap::new();
        for result in results {
            let (room_id, page) = result?;
            if !page.events.is_empty() {
                out.insert(room_id, page);
            }
        }
        Ok(out)
    }

    /// the filtered live stream for a registered application service.
    #[tracing::instrument(skip(self, service), fields(service_id = %service.service_id))]
    pub async fn get_appservice_room_stream(
        &self,
        service: &Service,
        from_token: &str,
        to_token: &str,
        limit: Option<i64>,
    ) -> EngineResult<StreamPage> {
        let limit = match limit {
            Some(l) if l > 0 => l.max(self.max_batch_size),
            _ => self.max_batch_size,
        };
        let from = stream_only(RoomStreamToken::parse_stream(from_token)?);
        let to = stream_only(RoomStreamToken::parse_stream(to_token)?);
        if from == to {
            return Ok(echo(to_token));
        }

        let rows = self.repository.appservice_stream_rows(from, to, limit).await?;
        let interested_rooms = self.repository.interested_room_ids(&service.service_id).await?;

        let matching: Vec<_> = rows
            .into_iter()
            .filter(|row| {
                interested_rooms.contains(&row.room_id)
                    || (row.event_type == "m.room.member"
                        && row.state_key.as_deref().is_some_and(|uid| service.is_interested_in_user(uid)))
            })
            .collect();

        let ids: Vec<OwnedEventId> = matching.iter().map(|r| r.event_id.clone()).collect();
        let mut events = self.event_store.fetch(&ids, false).await?;
        let rows: Vec<OrderRow> = matching
            .iter()
            .map(|r| OrderRow { topological_ordering: 0, stream_ordering: r.stream_ordering })
            .collect();
        annotator::annotate(&mut events, &rows, false);

        let next_token = matching
            .iter()
            .map(|r| r.stream_ordering)
            .max()
            .map(|s| RoomStreamToken::new_stream(s).to_string())
            .unwrap_or_else(|| to_token.to_owned());

        Ok(StreamPage { events, next_token })
    }

    /// membership-change rows for one user.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_membership_changes_for_user(
        &self,
        user_id: &UserId,
        from_token: &str,
        to_token: &str,
    ) -> EngineResult<StreamPage> {
        let from = stream_only(RoomStreamToken::parse_stream(from_token)?);
        let to = stream_only(RoomStreamToken::parse_stream(to_token)?);

        if !self.membership_change_cache.has_entity_changed(&user_id.to_owned(), from.stream()) {
            return Ok(echo(from_token));
        }

        let rows = self.repository.membership_rows(user_id, from, to).await?;
        let ids: Vec<OwnedEventId> = rows.iter().map(|r| r.event_id.clone()).collect();
        let mut events = self.event_store.fetch(&ids, false).await?;
        let order_rows: Vec<OrderRow> = rows
            .iter()
            .map(|r| OrderRow { topological_ordering: 0, stream_ordering: r.stream_ordering })
            .collect();
        annotator::annotate(&mut events, &order_rows, false);

        let next_token = rows
            .iter()
            .map(|r| r.stream_ordering)
            .max()
            .map(|s| RoomStreamToken::new_stream(s).to_string())
            .unwrap_or_else(|| to_token.to_owned());

        Ok(StreamPage { events, next_token })
    }

    /// bidirectional bounded pagination in composite order.
    #[tracing::instrument(skip(self), fields(room_id = %room_id))]
    pub async fn paginate_room_events(
        &self,
        room_id: &RoomId,
        from_token: &str,
        to_token: Option<&str>,
        direction: Direction,
        limit: i64,
    ) -> EngineResult<PaginationPage> {
        let from = RoomStreamToken::parse(from_token)?;
        let to = to_token.map(RoomStreamToken::parse).transpose()?;

        let (upper_token, lower_token) = match direction {
            Direction::Backward => (Some(from), to),
            Direction::Forward => (to, Some(from)),
        };
        let limit = if limit > 0 { Some(limit) } else { None };

        let rows = self
            .repository
            .paginate_rows(room_id, upper_token, lower_token, direction, limit)
            .await?;
        let mut events = self.materialize(&rows).await?;
        annotator::annotate(&mut events, &order_rows(&rows), true);

        let next_token = match rows.last() {
            Some(last) => {
                let stream = match direction {
                    // The cursor must point just *before* the last returned
                    // event, so a subsequent backward page doesn't re-return
                    // it and doesn't skip the event just past it either.
                    Direction::Backward => last.stream_ordering - 1,
                    Direction::Forward => last.stream_ordering,
                };
                RoomStreamToken::new_topological(last.topological_ordering, stream).to_string()
            }
            None => {
                if matches!(direction, Direction::Forward) {
                    tracing::debug!(
                        room_id = %room_id,
                        "forward pagination page was empty; falling back to to_token/from_token"
                    );
                }
                to_token.map(str::to_owned).unwrap_or_else(|| from_token.to_owned())
            }
        };

        Ok(PaginationPage { events, next_token })
    }

    /// the last `limit` events up to `end_token`, memoized per
    /// `(room_id, limit, end_token, from_token)` with at-most-one in-flight
    /// computation per key.
    #[tracing::instrument(skip(self), fields(room_id = %room_id))]
    pub async fn get_recent_events_for_room(
        &self,
        room_id: &RoomId,
        limit: i64,
        end_token: &str,
        from_token: Option<&str>,
    ) -> EngineResult<RecentEventsPage> {
        let end = stream_only(RoomStreamToken::parse_stream(end_token)?);
        let from = from_token.map(RoomStreamToken::parse_stream).transpose()?.map(stream_only);

        let key = RecentEventsKey { room_id: room_id.to_owned(), limit, end, from };
        let cell = {
            let mut memo = self.recent_events_memo.lock();
            memo.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        let page = cell
            .get_or_try_init(|| async {
                let mut rows = self.repository.recent_rows(room_id, end, from, limit).await?;
                rows.reverse(); // repository returns descending; callers want forward order.

                let mut events = self.materialize(&rows).await?;
                annotator::annotate(&mut events, &order_rows(&rows), true);

                let (start_token, end_token_out) = match rows.first() {
                    Some(first) => (
                        RoomStreamToken::new_topological(first.topological_ordering, first.stream_ordering - 1)
                            .to_string(),
                        end_token.to_owned(),
                    ),
                    None => (end_token.to_owned(), end_token.to_owned()),
                };

                Ok::<_, EngineError>(RecentEventsPage { events, start_token, end_token: end_token_out })
            })
            .await?;

        Ok(page.clone())
    }

    /// Invalidates memoized recent-events pages for `room_id`. The write path (out
    /// of scope) calls this when a backfill inserts events at
    /// `stream_ordering`s below some in-flight page's `from_token` — see the
    /// memoization-granularity note this engine's callers must honor.
    pub fn invalidate_recent_events_for_room(&self, room_id: &RoomId) {
        self.recent_events_memo.lock().retain(|key, _| key.room_id.as_str() != room_id.as_str());
    }

    /// the context window around a pinned event.
    #[tracing::instrument(skip(self), fields(room_id = %room_id, event_id = %event_id))]
    pub async fn get_events_around(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
        before_limit: i64,
        after_limit: i64,
    ) -> EngineResult<EventContext> {
        let (pin_stream, pin_topo) = self
            .repository
            .event_position(event_id)
            .await?
            .ok_or_else(|| EngineError::EventNotFound(event_id.as_str().to_owned()))?;

        let mut before_rows = self.repository.before_window(room_id, pin_topo, pin_stream, before_limit).await?;
        before_rows.reverse(); // descending from the repository; forward for output.
        let after_rows = self.repository.after_window(room_id, pin_topo, pin_stream, after_limit).await?;

        let mut events_before = self.materialize(&before_rows).await?;
        annotator::annotate(&mut events_before, &order_rows(&before_rows), true);

        let mut events_after = self.materialize(&after_rows).await?;
        annotator::annotate(&mut events_after, &order_rows(&after_rows), true);

        let start = match before_rows.first() {
            Some(first) => RoomStreamToken::new_topological(first.topological_ordering, first.stream_ordering - 1).to_string(),
            None => RoomStreamToken::new_topological(pin_topo, pin_stream - 1).to_string(),
        };
        let end = match after_rows.last() {
            Some(last) => RoomStreamToken::new_topological(last.topological_ordering, last.stream_ordering).to_string(),
            None => RoomStreamToken::new_topological(pin_topo, pin_stream).to_string(),
        };

        Ok(EventContext { events_before, events_after, start, end })
    }

    /// the current bound of the room-independent event stream.
    pub async fn get_room_events_max_id(&self, direction: Direction) -> EngineResult<String> {
        match direction {
            Direction::Forward => {
                let current = self.stream_id_gen.current_token().await?;
                Ok(RoomStreamToken::new_stream(current).to_string())
            }
            Direction::Backward => {
                let topological = self.repository.max_topological_ordering().await?;
                let stream = self.stream_id_gen.current_token().await?;
                Ok(RoomStreamToken::new_topological(topological, stream).to_string())
            }
        }
    }

    /// the stream-only cursor for one event.
    pub async fn get_stream_token_for_event(&self, event_id: &EventId) -> EngineResult<String> {
        let (stream, _topological) = self.event_position(event_id).await?;
        Ok(RoomStreamToken::new_stream(stream).to_string())
    }

    /// the topological cursor for one event.
    pub async fn get_topological_token_for_event(&self, event_id: &EventId) -> EngineResult<String> {
        let (stream, topological) = self.event_position(event_id).await?;
        Ok(RoomStreamToken::new_topological(topological, stream).to_string())
    }

    async fn event_position(&self, event_id: &EventId) -> EngineResult<(roomstream_core::Seqnum, i64)> {
        self.repository
            .event_position(event_id)
            .await?
            .ok_or_else(|| EngineError::EventNotFound(event_id.as_str().to_owned()))
    }

    async fn materialize(&self, rows: &[crate::repository::StreamRow]) -> EngineResult<Vec<Event>> {
        let ids: Vec<OwnedEventId> = rows.iter().map(|r| r.event_id.clone()).collect();
        self.event_store.fetch(&ids, false).await
    }
}

fn stream_only(token: RoomStreamToken) -> RoomStreamToken {
    RoomStreamToken::new_stream(token.stream())
}

fn order_rows(rows: &[crate::repository::StreamRow]) -> Vec<OrderRow> {
    rows.iter()
        .map(|r| OrderRow { topological_ordering: r.topological_ordering, stream_ordering: r.stream_ordering })
        .collect()
}

fn echo(token_text: &str) -> StreamPage {
    StreamPage { events: Vec::new(), next_token: token_text.to_owned() }
}

#[cfg(test)]
mod tests {
    use roomstream_core::{OwnedEventId, OwnedRoomId, OwnedUserId};

    use super::*;
    use crate::change_cache::ChangeCache;
    use crate::event_store::InMemoryEventStore;
    use crate::repository::{FixtureEvent, InMemoryStreamRepository};
    use crate::stream_id::InMemoryStreamIdGenerator;

    fn room() -> OwnedRoomId {
        OwnedRoomId::parse("!room:example.org").unwrap()
    }

    fn user(name: &str) -> OwnedUserId {
        OwnedUserId::parse(format!("@{name}:example.org")).unwrap()
    }

    /// Seeds a room with five events, stream_ordering and depth both 1..=5,
    /// matching the canonical five-event fixture used throughout this module.
    fn seed_five(repo: &InMemoryStreamRepository, store: &mut InMemoryEventStore) {
        for n in 1..=5 {
            let event_id = OwnedEventId::from(format!("$e{n}"));
            repo.insert(FixtureEvent {
                event_id: event_id.clone(),
                room_id: room(),
                event_type: "m.room.message".to_owned(),
                state_key: None,
                sender: user("alice"),
                outlier: false,
                stream_ordering: n,
                topological_ordering: n,
            });
            store.insert(Event::new(
                event_id,
                room(),
                "m.room.message".to_owned(),
                user("alice"),
                n,
                n,
                n,
            ));
        }
    }

    fn engine(repo: Arc<InMemoryStreamRepository>, store: Arc<InMemoryEventStore>) -> StreamEngine {
        StreamEngine::new(
            repo,
            store,
            Arc::new(InMemoryStreamIdGenerator::new(5)),
            Arc::new(ChangeCache::new(1000)),
            Arc::new(ChangeCache::new(1000)),
            &StreamConfig::default(),
        )
    }

    #[tokio::test]
    async fn live_sync_returns_the_half_open_window() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo.clone(), Arc::new(store));
        engine.room_change_cache.entity_has_changed(room(), 5);

        let page = engine
            .get_room_events_stream_for_room(&room(), Some("s2"), "s5", 100, Direction::Forward)
            .await
            .unwrap();

        assert_eq!(page.events.len(), 3);
        assert_eq!(page.events[0].event_id.as_str(), "$e3");
        assert_eq!(page.events[2].event_id.as_str(), "$e5");
        assert_eq!(page.next_token, "s3");
    }

    #[tokio::test]
    async fn fresh_room_read_returns_forward_order_from_a_descending_query() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        let page = engine
            .get_room_events_stream_for_room(&room(), None, "s5", 3, Direction::Backward)
            .await
            .unwrap();

        let ids: Vec<_> = page.events.iter().map(|e| e.event_id.as_str().to_owned()).collect();
        assert_eq!(ids, vec!["$e3", "$e4", "$e5"]);
        assert_eq!(page.next_token, "s3");
    }

    #[tokio::test]
    async fn equal_tokens_short_circuit_without_touching_the_repository() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let store = Arc::new(InMemoryEventStore::new());
        let engine = engine(repo, store);

        let page = engine
            .get_room_events_stream_for_room(&room(), Some("s5"), "s5", 10, Direction::Forward)
            .await
            .unwrap();
        assert!(page.events.is_empty());
        assert_eq!(page.next_token, "s5");
    }

    #[tokio::test]
    async fn unchanged_room_short_circuits_via_the_change_cache() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));
        // Cache knows about the room but reports nothing since stream 5.
        engine.room_change_cache.entity_has_changed(room(), 2);

        let page = engine
            .get_room_events_stream_for_room(&room(), Some("s5"), "s10", 10, Direction::Forward)
            .await
            .unwrap();
        assert!(page.events.is_empty());
        assert_eq!(page.next_token, "s5");
    }

    #[tokio::test]
    async fn backward_pagination_decrements_the_stream_component() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        let page = engine
            .paginate_room_events(&room(), "t5-5", None, Direction::Backward, 2)
            .await
            .unwrap();

        let ids: Vec<_> = page.events.iter().map(|e| e.event_id.as_str().to_owned()).collect();
        assert_eq!(ids, vec!["$e4", "$e3"]);
        assert_eq!(page.next_token, "t3-2");
    }

    #[tokio::test]
    async fn backward_then_forward_pagination_does_not_skip_or_duplicate_the_boundary() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        let first = engine
            .paginate_room_events(&room(), "t5-5", None, Direction::Backward, 2)
            .await
            .unwrap();
        let second = engine
            .paginate_room_events(&room(), &first.next_token, None, Direction::Forward, 1)
            .await
            .unwrap();

        assert_eq!(second.events.len(), 1);
        assert_eq!(second.events[0].event_id.as_str(), "$e3");
    }

    #[tokio::test]
    async fn context_window_returns_neighbors_and_brackets() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        let ctx = engine
            .get_events_around(&room(), OwnedEventId::from("$e3".to_owned()).as_id(), 1, 1)
            .await
            .unwrap();

        assert_eq!(ctx.events_before[0].event_id.as_str(), "$e2");
        assert_eq!(ctx.events_after[0].event_id.as_str(), "$e4");
        assert_eq!(ctx.start, "t2-1");
        assert_eq!(ctx.end, "t4-4");
    }

    #[tokio::test]
    async fn appservice_stream_matches_member_events_by_user_regex() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        // e1, e3: unrelated messages. e2: @u joins.
        for (n, (event_type, state_key)) in
            [(1, ("m.room.message", None)), (2, ("m.room.member", Some("@u:example.org"))), (3, ("m.room.message", None))]
        {
            let event_id = OwnedEventId::from(format!("$e{n}"));
            repo.insert(FixtureEvent {
                event_id: event_id.clone(),
                room_id: room(),
                event_type: event_type.to_owned(),
                state_key: state_key.map(str::to_owned),
                sender: user("alice"),
                outlier: false,
                stream_ordering: n,
                topological_ordering: n,
            });
            store.insert(Event::new(event_id, room(), event_type.to_owned(), user("alice"), n, n, n));
        }
        let engine = engine(repo, Arc::new(store));
        let service = Service::new("bridge", &[r"^@u:example\.org$"]).unwrap();

        let page = engine.get_appservice_room_stream(&service, "s0", "s3", Some(0)).await.unwrap();

        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].event_id.as_str(), "$e2");
        assert_eq!(page.next_token, "s2");
    }

    #[tokio::test]
    async fn cross_room_prune_returns_only_changed_rooms() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();

        let room_a = OwnedRoomId::parse("!a:example.org").unwrap();
        let room_b = OwnedRoomId::parse("!b:example.org").unwrap();
        let room_c = OwnedRoomId::parse("!c:example.org").unwrap();

        // Only room B gets an event inside (s10, s20], so it's the only room
        // whose page ends up non-empty once the cache lets it through.
        let event_id = OwnedEventId::from("$eb".to_owned());
        repo.insert(FixtureEvent {
            event_id: event_id.clone(),
            room_id: room_b.clone(),
            event_type: "m.room.message".to_owned(),
            state_key: None,
            sender: user("alice"),
            outlier: false,
            stream_ordering: 15,
            topological_ordering: 15,
        });
        store.insert(Event::new(event_id, room_b.clone(), "m.room.message".to_owned(), user("alice"), 15, 15, 15));

        let engine = engine(repo, Arc::new(store));
        // A and C are recorded at-or-before the `since` watermark, so the
        // cache genuinely prunes them rather than keeping them as unknowns.
        engine.room_change_cache.entity_has_changed(room_a.clone(), 10);
        engine.room_change_cache.entity_has_changed(room_b.clone(), 15);
        engine.room_change_cache.entity_has_changed(room_c.clone(), 10);

        let result = engine
            .get_room_events_stream_for_rooms(&[room_a, room_b.clone(), room_c], Some("s10"), "s20", 50, Direction::Forward)
            .await
            .unwrap();

        assert_eq!(result.keys().collect::<Vec<_>>(), vec![&room_b]);
    }

    #[tokio::test]
    async fn empty_room_echoes_the_input_token() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let store = Arc::new(InMemoryEventStore::new());
        let engine = engine(repo, store);

        let page = engine
            .get_room_events_stream_for_room(&room(), None, "s0", 10, Direction::Forward)
            .await
            .unwrap();
        assert!(page.events.is_empty());
        assert_eq!(page.next_token, "s0");
    }

    #[tokio::test]
    async fn max_id_forward_reflects_the_stream_id_generator_frontier() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        assert_eq!(engine.get_room_events_max_id(Direction::Forward).await.unwrap(), "s5");
    }

    #[tokio::test]
    async fn event_not_found_surfaces_the_right_error_kind() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let store = Arc::new(InMemoryEventStore::new());
        let engine = engine(repo, store);

        let err = engine
            .get_stream_token_for_event(OwnedEventId::from("$missing".to_owned()).as_id())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EventNotFound(_)));
    }

    #[tokio::test]
    async fn recent_events_memoization_computes_once_per_key() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo, Arc::new(store));

        let a = engine.get_recent_events_for_room(&room(), 3, "s5", None).await.unwrap();
        let b = engine.get_recent_events_for_room(&room(), 3, "s5", None).await.unwrap();
        assert_eq!(a.start_token, b.start_token);
        assert_eq!(a.start_token, "t3-2");
        assert_eq!(a.end_token, "s5");
    }

    #[tokio::test]
    async fn invalidating_a_room_forces_recompute() {
        let repo = Arc::new(InMemoryStreamRepository::new());
        let mut store = InMemoryEventStore::new();
        seed_five(&repo, &mut store);
        let engine = engine(repo.clone(), Arc::new(store));

        let _ = engine.get_recent_events_for_room(&room(), 3, "s5", None).await.unwrap();
        engine.invalidate_recent_events_for_room(&room());
        assert!(engine.recent_events_memo.lock().is_empty());
    }
}

//! The dual-ordering event stream and pagination engine.
//!
//! This crate answers the read side of a federated chat-room server's event
//! stream: given a room's `(topological_ordering, stream_ordering)`-ordered
//! event log, it serves live sync windows, cross-room fan-out, application
//! service streams, membership-change feeds, bidirectional pagination, and
//! context windows around a pinned event, all addressed by the same family
//! of opaque string tokens. Writing events, computing `topological_ordering`
//! from the room's DAG, and state resolution all live elsewhere; this crate
//! only reads.
//!
//! [`StreamEngine`] is the entry point. It is built from a handful of
//! collaborator traits ([`StreamRepository`], [`EventStore`],
//! [`StreamIdGenerator`]) so that the query logic in `engine.rs` can be
//! exercised against in-memory fakes without a database — every test in this
//! crate does exactly that.

pub mod annotator;
pub mod appservice;
pub mod change_cache;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod event;
pub mod event_store;
pub mod logging;
pub mod order;
pub mod repository;
pub mod stream_id;
pub mod token;

pub use annotator::OrderRow;
pub use appservice::{Namespace, Service};
pub use change_cache::ChangeCache;
pub use config::{EngineConfig, LogConfig, StreamConfig};
pub use container::DependencyContainer;
pub use engine::{EventContext, PaginationPage, RecentEventsPage, StreamEngine, StreamPage};
pub use error::{EngineError, EngineResult};
pub use event::Event;
pub use event_store::{EventStore, InMemoryEventStore};
pub use repository::{
    AppserviceRow, FixtureEvent, InMemoryStreamRepository, MembershipRow, PgStreamRepository, StreamRepository,
    StreamRow,
};
pub use stream_id::{InMemoryStreamIdGenerator, PgStreamIdGenerator, StreamIdGenerator};
pub use token::RoomStreamToken;

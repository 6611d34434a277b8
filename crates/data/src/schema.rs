//! The read-only slice of the homeserver's schema this engine queries. The
//! write path (event persistence, state resolution) owns these tables; this
//! crate only ever issues `SELECT`s against them.

diesel::table! {
    events (event_id) {
        event_id -> Text,
        room_id -> Text,
        #[sql_name = "type"]
        event_type -> Text,
        state_key -> Nullable<Text>,
        sender_id -> Text,
        stream_ordering -> Int8,
        topological_ordering -> Int8,
        depth -> Int8,
        outlier -> Bool,
        redacted -> Bool,
    }
}

diesel::table! {
    state_events (event_id) {
        event_id -> Text,
        state_key -> Text,
    }
}

diesel::table! {
    room_memberships (event_id) {
        event_id -> Text,
        user_id -> Text,
    }
}

diesel::table! {
    /// Materialized membership of rooms in an application service's
    /// regex-matched namespace, maintained by the write path as rooms are
    /// created or an appservice's registration changes. The engine only
    /// reads this to scope the appservice stream's interest filter; it never
    /// computes it.
    appservice_rooms (service_id, room_id) {
        service_id -> Text,
        room_id -> Text,
    }
}

diesel::joinable!(state_events -> events (event_id));
diesel::joinable!(room_memberships -> events (event_id));

diesel::allow_tables_to_appear_in_same_query!(events, state_events, room_memberships);

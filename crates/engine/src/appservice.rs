//! The slice of application-service registration this engine actually reads:
//! a service id plus the user-id regex namespace that can't
//! be precomputed into the `appservice_rooms` join table, because it has to
//! be checked per-row against each membership event's `state_key`. Room
//! interest, in contrast, is looked up directly from
//! [`crate::repository::StreamRepository::interested_room_ids`] — a
//! materialized view the write path keeps in sync with the service's room
//! namespace, grounded in the same regex-namespace shape as a homeserver's
//! application-service registration.

use regex::Regex;

use crate::error::{EngineError, EngineResult};

/// One user-id (or alias) matcher from a service's registration namespace.
#[derive(Clone, Debug)]
pub struct Namespace {
    pub exclusive: bool,
    pub regex: Regex,
}

/// The subset of an application service's registration the stream engine
/// consults: its id (used to look up the room interest set) and its user
/// namespaces (checked in-process against membership target users).
#[derive(Clone, Debug)]
pub struct Service {
    pub service_id: String,
    pub user_namespaces: Vec<Namespace>,
}

impl Service {
    pub fn new(service_id: impl Into<String>, user_patterns: &[&str]) -> EngineResult<Self> {
        let user_namespaces = user_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map(|regex| Namespace { exclusive: true, regex })
                    .map_err(|e| EngineError::InvalidConfig(format!("bad appservice user regex {pattern:?}: {e}")))
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self {
            service_id: service_id.into(),
            user_namespaces,
        })
    }

    /// True iff `user_id` falls in this service's user namespace.
    pub fn is_interested_in_user(&self, user_id: &str) -> bool {
        self.user_namespaces.iter().any(|ns| ns.regex.is_match(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_user_ids_in_namespace() {
        let svc = Service::new("bridge", &[r"^@bridge_.*:example\.org$"]).unwrap();
        assert!(svc.is_interested_in_user("@bridge_alice:example.org"));
        assert!(!svc.is_interested_in_user("@alice:example.org"));
    }

    #[test]
    fn rejects_malformed_regex() {
        assert!(Service::new("bridge", &["("]).is_err());
    }
}

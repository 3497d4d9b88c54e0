use crate::errors::session_error::SessionError;
use crate::store::FactStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const SUBJECT_KEY: &str = "session/subject";
pub const STARTED_AT_KEY: &str = "session/started-at";
pub const AUTHORIZED_KEY: &str = "session/authorized";
pub const TEARDOWN_KEY: &str = "session/teardown";
pub const PEER_KEY_PREFIX: &str = "presence/peer/";

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn peer_key(peer_id: &str) -> String {
    format!("{PEER_KEY_PREFIX}{peer_id}")
}

/// The logical authenticated identity shared by every context of one
/// browser profile. Contexts vote on its liveness but never own it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub subject: String,
    pub started_at: i64,
}

impl Session {
    /// Reads the session out of the fact store, refusing anything partial.
    /// The presence engine never runs without a valid session.
    pub fn load(store: &dyn FactStore) -> Result<Session, SessionError> {
        if store.get(TEARDOWN_KEY).is_some() {
            return Err(SessionError::TornDown);
        }

        let authorized = store
            .get(AUTHORIZED_KEY)
            .map(|value| value == "true")
            .unwrap_or(false);
        if !authorized {
            return Err(SessionError::NotAuthorized);
        }

        let subject = store
            .get(SUBJECT_KEY)
            .filter(|subject| !subject.is_empty())
            .ok_or(SessionError::MissingSubject)?;

        let started_at = store
            .get(STARTED_AT_KEY)
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or(SessionError::MissingStartTime)?;

        Ok(Session {
            subject,
            started_at,
        })
    }

    /// Writes a fresh session, scrubbing leftovers of the previous one.
    /// The start time is set here, once, and never refreshed by activity.
    pub fn login(store: &dyn FactStore, subject: &str) -> Session {
        for key in store.keys_with_prefix(PEER_KEY_PREFIX) {
            store.remove(&key);
        }
        store.remove(TEARDOWN_KEY);

        let started_at = now_ms();
        store.set(SUBJECT_KEY, subject);
        store.set(STARTED_AT_KEY, &started_at.to_string());
        store.set(AUTHORIZED_KEY, "true");

        Session {
            subject: subject.to_string(),
            started_at,
        }
    }

    pub fn expired(&self, now: i64, max_lifetime_ms: i64) -> bool {
        now - self.started_at > max_lifetime_ms
    }
}

/// Fallback mirror of a peer, written to the fact store on every heartbeat
/// tick so that contexts without broadcast support, and peers that vanish
/// without a departure message, are still accounted for.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedPeerRecord {
    pub peer_id: String,
    pub timestamp: i64,
    pub closing: bool,
}

/// Left behind by the context that tore the session down, for contexts
/// that could not receive the live broadcast. Cleared by the next login.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeardownMarker {
    pub peer_id: String,
    pub at: i64,
}

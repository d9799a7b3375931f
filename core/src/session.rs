//! In-memory registry of conversation sessions.
//!
//! The registry is an explicit object (cheap to clone, internally shared)
//! rather than process-wide state. Every mutation is a single step under
//! one lock: append to a session's history, insert a session, or remove
//! one. Histories are append-only and keep insertion order; the session
//! map itself iterates in creation order.

use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::SessionErr;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One prompt/response pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub prompt: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Exchange>,
}

impl Session {
    fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            start_time: self.start_time,
            last_activity: self.last_activity,
            message_count: self.history.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: SessionId,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: IndexMap<SessionId, Session>,
    current: Option<SessionId>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty session, makes it current and returns its id.
    pub fn create_session(&self) -> SessionId {
        let now = Utc::now();
        let mut state = self.inner.lock();
        let mut id = SessionId::generate();
        while state.sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        state.sessions.insert(
            id.clone(),
            Session {
                id: id.clone(),
                start_time: now,
                last_activity: now,
                history: Vec::new(),
            },
        );
        state.current = Some(id.clone());
        debug!(session_id = %id, "session created");
        id
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.inner.lock().current.clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.inner.lock().sessions.get(id).cloned()
    }

    /// Like [`SessionRegistry::get`] but treats absence as an error naming the id.
    pub fn require(&self, id: &SessionId) -> Result<Session, SessionErr> {
        self.get(id)
            .ok_or_else(|| SessionErr::NotFound(id.to_string()))
    }

    pub fn exists(&self, id: &SessionId) -> bool {
        self.inner.lock().sessions.contains_key(id)
    }

    /// Appends an exchange to `id`. Unknown ids are ignored.
    pub fn record_exchange(&self, id: &SessionId, prompt: String, response: String) {
        let mut state = self.inner.lock();
        let Some(session) = state.sessions.get_mut(id) else {
            debug!(session_id = %id, "dropping exchange for unknown session");
            return;
        };
        let timestamp = next_activity(session.last_activity);
        session.history.push(Exchange {
            prompt,
            response,
            timestamp,
        });
        session.last_activity = timestamp;
    }

    /// Appends an exchange to the current session, if there is one.
    pub fn record_to_current_session(&self, prompt: String, response: String) {
        let Some(current) = self.current_id() else {
            return;
        };
        self.record_exchange(&current, prompt, response);
    }

    pub fn list_summaries(&self) -> Vec<SessionSummary> {
        self.inner
            .lock()
            .sessions
            .values()
            .map(Session::summary)
            .collect()
    }

    /// Removes `id`; clears the current pointer if it pointed there.
    pub fn delete(&self, id: &SessionId) -> bool {
        let mut state = self.inner.lock();
        let removed = state.sessions.shift_remove(id).is_some();
        if removed && state.current.as_ref() == Some(id) {
            state.current = None;
        }
        removed
    }

    pub fn clear_all(&self) {
        let mut state = self.inner.lock();
        state.sessions.clear();
        state.current = None;
    }
}

/// Wall-clock now, nudged forward when the clock has not advanced so that
/// `last_activity` strictly increases with every exchange.
fn next_activity(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::nanoseconds(1)
    }
}

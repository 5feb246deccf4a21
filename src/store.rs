//! In-memory session store
//!
//! Owns all conversation state. Callers get snapshots from
//! `load_or_create` and hand back new messages through `commit`, which
//! uses optimistic concurrency: a commit succeeds only if the stored
//! history still has the length observed at load time. The outer lock only
//! guards the map shape; each session has its own lock, so mutations on
//! different sessions never block each other.
//!
//! Lock ordering: map lock before entry lock, never the reverse.

use crate::conversation::{ConversationState, Message};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("concurrent mutation detected on session {session_id}: expected {expected} messages, found {actual}")]
    Conflict {
        session_id: String,
        expected: usize,
        actual: usize,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

struct SessionEntry {
    state: ConversationState,
    last_activity: DateTime<Utc>,
}

/// Keyed, concurrency-safe map from session ID to conversation state
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<RwLock<SessionEntry>>>>,
    max_sessions: usize,
}

impl SessionStore {
    /// Create a store holding at most `max_sessions` sessions; creating a
    /// session past the cap evicts the least recently active one.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Snapshot the session, creating an empty one on first use.
    ///
    /// `user_name` is only consulted when the session does not exist yet;
    /// an established session keeps the name from its first request.
    pub fn load_or_create(&self, session_id: &str, user_name: &str) -> ConversationState {
        if let Some(entry) = self.get_entry(session_id) {
            let mut entry = entry.write().unwrap();
            entry.last_activity = Utc::now();
            return entry.state.clone();
        }

        let mut sessions = self.sessions.write().unwrap();
        // Re-check under the write lock; another task may have created it.
        if let Some(entry) = sessions.get(session_id) {
            let mut entry = entry.write().unwrap();
            entry.last_activity = Utc::now();
            return entry.state.clone();
        }

        if sessions.len() >= self.max_sessions {
            Self::evict_least_recent(&mut sessions);
        }

        let state = ConversationState::new(session_id, user_name);
        sessions.insert(
            session_id.to_string(),
            Arc::new(RwLock::new(SessionEntry {
                state: state.clone(),
                last_activity: Utc::now(),
            })),
        );
        state
    }

    /// Optimistic append of one turn's messages.
    ///
    /// Fails with `Conflict` when another mutation committed to the same
    /// session between load and commit; the caller replays the whole turn.
    pub fn commit(
        &self,
        session_id: &str,
        expected_prior_len: usize,
        new_messages: Vec<Message>,
    ) -> StoreResult<()> {
        let Some(entry) = self.get_entry(session_id) else {
            // Evicted between load and commit; a replay recreates it.
            return Err(StoreError::Conflict {
                session_id: session_id.to_string(),
                expected: expected_prior_len,
                actual: 0,
            });
        };

        let mut entry = entry.write().unwrap();
        let actual = entry.state.messages.len();
        if actual != expected_prior_len {
            return Err(StoreError::Conflict {
                session_id: session_id.to_string(),
                expected: expected_prior_len,
                actual,
            });
        }

        entry.state.messages.extend(new_messages);
        entry.last_activity = Utc::now();
        Ok(())
    }

    /// Current snapshot without creating the session.
    #[allow(dead_code)] // Useful for tests
    pub fn snapshot(&self, session_id: &str) -> Option<ConversationState> {
        self.get_entry(session_id)
            .map(|entry| entry.read().unwrap().state.clone())
    }

    /// Number of live sessions.
    #[allow(dead_code)] // Useful for tests
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    fn get_entry(&self, session_id: &str) -> Option<Arc<RwLock<SessionEntry>>> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    fn evict_least_recent(sessions: &mut HashMap<String, Arc<RwLock<SessionEntry>>>) {
        let oldest = sessions
            .iter()
            .min_by_key(|(_, entry)| entry.read().unwrap().last_activity)
            .map(|(id, _)| id.clone());
        if let Some(id) = oldest {
            tracing::info!(session_id = %id, "evicting least recently active session");
            sessions.remove(&id);
        }
    }
}

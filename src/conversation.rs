//! Conversation value types
//!
//! A `Message` is immutable once created; a `ConversationState` is the full
//! per-session history. State is owned by the session store — workflow code
//! only ever sees snapshots and hands back new messages for atomic commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Prefix used in generated message IDs
    pub fn id_prefix(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "isha",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub message_id: String,
}

/// Process-wide disambiguator so IDs generated within the same microsecond
/// still differ.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

impl Message {
    /// Create a message stamped with the current time and a fresh ID.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            role,
            content: content.into(),
            message_id: generate_message_id(role, now),
            timestamp: now,
        }
    }
}

/// Build an ID of the form `{prefix}_{epoch_seconds}.{fractional}`.
///
/// The fractional part is the microsecond component (fixed six digits)
/// followed by a monotonic sequence number, so two messages created in the
/// same microsecond still get distinct IDs.
fn generate_message_id(role: Role, now: DateTime<Utc>) -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}_{}.{:06}{}",
        role.id_prefix(),
        now.timestamp(),
        now.timestamp_subsec_micros() % 1_000_000,
        seq
    )
}

/// Full state of one conversation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub session_id: String,
    pub user_name: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create an empty conversation for a newly seen session.
    pub fn new(session_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_name: user_name.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

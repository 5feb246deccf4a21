//! Turn state machine types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Phases of a single conversation turn, in order. `Committed` is the
/// terminal success state; any phase can fail into a `TurnError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    ContextBuilt,
    ModelInvoked,
    Validated,
    Committed,
}

/// Caller-visible failures. Transient model errors, invalid model output,
/// and commit races are absorbed inside the coordinator and never appear
/// here; the payload carries no provider error text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("the assistant backend is not configured")]
    Misconfigured,

    #[error("session is busy: turn conflicted {attempts} times")]
    TooManyConflicts { attempts: u32 },
}

/// Result of a successful turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
}

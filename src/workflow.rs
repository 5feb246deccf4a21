//! Conversation turn workflow
//!
//! Sequences one turn: build context, invoke the model gateway, validate
//! the reply, commit the turn to the session store, emit the result.

mod engine;
mod state;

pub use engine::{Coordinator, TurnSettings};
pub use state::{TurnError, TurnOutcome, TurnPhase};

//! Context construction for model requests
//!
//! Turns stored history plus the incoming user message into a bounded,
//! model-ready prompt window and the rendered system instruction. Never
//! mutates stored state.

use crate::conversation::{Message, Role};
use crate::llm::PromptMessage;

/// Name substituted when the caller did not provide one
pub const DEFAULT_USER_NAME: &str = "there";

/// A model-ready context for one turn
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub system_instruction: String,
    /// At most the window-size most recent prior messages (oldest first),
    /// followed by the new user message
    pub messages: Vec<PromptMessage>,
}

/// Build the prompt window for a turn.
///
/// Trimming is FIFO: when `prior` exceeds `window`, the oldest messages are
/// dropped and only the most recent `window` survive, in original order.
pub fn build(prior: &[Message], user_message: &Message, user_name: &str, window: usize) -> BuiltContext {
    let name = resolve_user_name(user_name);

    let start = prior.len().saturating_sub(window);
    let mut messages: Vec<PromptMessage> = prior
        .iter()
        .skip(start)
        .map(to_prompt_message)
        .collect();
    messages.push(to_prompt_message(user_message));

    BuiltContext {
        system_instruction: render_system_instruction(name),
        messages,
    }
}

/// Substitute a neutral default for an absent or blank user name.
pub fn resolve_user_name(user_name: &str) -> &str {
    let trimmed = user_name.trim();
    if trimmed.is_empty() {
        DEFAULT_USER_NAME
    } else {
        trimmed
    }
}

fn to_prompt_message(message: &Message) -> PromptMessage {
    match message.role {
        Role::User => PromptMessage::user(&message.content),
        Role::Assistant => PromptMessage::assistant(&message.content),
    }
}

/// Render the system instruction for a turn.
///
/// The instruction carries the two response requirements every reply must
/// satisfy: explicitly acknowledge the user's message, and stay on-topic
/// and professional.
fn render_system_instruction(user_name: &str) -> String {
    format!(
        r"You are Isha, a professional AI assistant. You are responding to a message from {user_name}.

Key guidelines:
1. Begin your reply by explicitly acknowledging that you received {user_name}'s message.
2. Stay on the topic of the user's message and keep a professional, warm tone.
3. Keep responses conversational and natural - they may be spoken aloud.
4. Be concise but informative; avoid overly long responses.
5. Provide clear, actionable answers. If the question is complex, break it down into simple points using 'first', 'second', 'third' instead of bullet points.

Current conversation context: you are having a conversation with {user_name}."
    )
}

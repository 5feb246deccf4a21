//! Response acknowledgment contract
//!
//! Every reply returned to a caller must acknowledge the user's message.
//! The marker phrases are a policy value, not hard-coded literals at call
//! sites - callers construct the validator with whatever set they need.

use crate::context::resolve_user_name;

/// Default acknowledgment markers, matched case-insensitively
pub const DEFAULT_ACK_MARKERS: &[&str] =
    &["replying to", "responding to", "you said", "your message"];

/// Enforces the acknowledgment contract on model output
#[derive(Debug, Clone)]
pub struct AckValidator {
    markers: Vec<String>,
}

impl Default for AckValidator {
    fn default() -> Self {
        Self::new(DEFAULT_ACK_MARKERS.iter().map(|m| (*m).to_string()))
    }
}

impl AckValidator {
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }

    /// Check whether the text already carries an acknowledgment marker.
    pub fn is_acknowledged(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.markers.iter().any(|m| lowered.contains(m))
    }

    /// Guarantee the acknowledgment contract.
    ///
    /// Acknowledged text is returned unchanged (idempotent); otherwise the
    /// canned clause is prepended and the model's content preserved intact
    /// after it. Pure post-processing - the model is never called again.
    pub fn enforce(&self, text: &str, user_name: &str) -> String {
        if self.is_acknowledged(text) {
            text.to_string()
        } else {
            let name = resolve_user_name(user_name);
            format!("Thanks for your message, {name}. {text}")
        }
    }

    /// Deterministic local reply for when the model is unavailable or
    /// returned an invalid payload. Satisfies the marker contract itself,
    /// so `enforce` leaves it untouched.
    pub fn fallback_reply(&self, user_name: &str) -> String {
        let name = resolve_user_name(user_name);
        format!(
            "Hi {name}! Thanks for your message. I'm having trouble reaching my \
             language model right now, but I'm still here to help - please try \
             asking again in a moment."
        )
    }
}

//! Common types for model gateway interactions

/// A single generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system_instruction: String,
    pub messages: Vec<PromptMessage>,
    pub params: GenerationParams,
}

/// Message in the prompt window
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            text: text.into(),
        }
    }
}

/// Prompt message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    User,
    Assistant,
}

/// Generation parameters, validated at config load time
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    /// Sampling temperature, in `[0, 1]`
    pub temperature: f32,
    /// Output token cap, strictly positive
    pub max_output_tokens: u32,
}

/// A completed generation
#[derive(Debug, Clone)]
pub struct Completion {
    /// Non-empty model text; empty payloads surface as `InvalidResponse`
    pub text: String,
    pub usage: TokenUsage,
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

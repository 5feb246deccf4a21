//! Model gateway abstraction
//!
//! Provides a common interface for invoking a hosted LLM, plus the Gemini
//! implementation used in production. The gateway performs exactly one
//! external call per invocation — retry and fallback policy live in the
//! workflow coordinator.

mod error;
mod gemini;
mod types;

pub use error::{GatewayError, GatewayErrorKind};
pub use gemini::GeminiGateway;
pub use types::{
    Completion, GenerateRequest, GenerationParams, PromptMessage, PromptRole, TokenUsage,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for model providers
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Make a single generation request
    async fn generate(&self, request: &GenerateRequest) -> Result<Completion, GatewayError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for model gateways
pub struct LoggingGateway {
    inner: Arc<dyn ModelGateway>,
    model_id: String,
}

impl LoggingGateway {
    pub fn new(inner: Arc<dyn ModelGateway>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ModelGateway for LoggingGateway {
    async fn generate(&self, request: &GenerateRequest) -> Result<Completion, GatewayError> {
        let start = std::time::Instant::now();
        let result = self.inner.generate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(completion) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = completion.usage.input_tokens,
                    output_tokens = completion.usage.output_tokens,
                    "model request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = ?e.kind,
                    retryable = e.kind.is_retryable(),
                    "model request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

//! Google Gemini provider implementation

use super::types::{Completion, GenerateRequest, PromptRole, TokenUsage};
use super::{GatewayError, ModelGateway};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gemini gateway over the `generateContent` REST endpoint
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    base_url: String,
    model_id: String,
}

impl GeminiGateway {
    /// Create a gateway for the given model (e.g. `gemini-1.5-flash`).
    ///
    /// `timeout` bounds the whole HTTP call; a timed-out request classifies
    /// as `Unavailable` upstream.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let model_id = model.into();
        let base_url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{model_id}:generateContent"
        );

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url,
            model_id,
        })
    }

    fn translate_request(request: &GenerateRequest) -> GeminiRequest {
        let system_instruction = if request.system_instruction.trim().is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system_instruction.clone(),
                }],
            })
        };

        let contents = request
            .messages
            .iter()
            .map(|msg| GeminiContent {
                role: Some(
                    match msg.role {
                        PromptRole::User => "user",
                        PromptRole::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: msg.text.clone(),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                temperature: request.params.temperature,
                max_output_tokens: request.params.max_output_tokens,
            },
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<Completion, GatewayError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::invalid_response("no candidates in response"))?;

        let text: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GatewayError::invalid_response("empty text in response"));
        }

        let usage = resp.usage_metadata.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u64::from(u.prompt_token_count),
            output_tokens: u64::from(u.candidates_token_count),
        });

        Ok(Completion { text, usage })
    }

    fn classify_status(status: u16, message: String) -> GatewayError {
        match status {
            401 | 403 => GatewayError::unauthenticated(format!("authentication failed: {message}")),
            429 => GatewayError::rate_limited(format!("rate limit exceeded: {message}")),
            500..=599 => GatewayError::unavailable(format!("server error: {message}")),
            // Anything else means the exchange is broken in a way a retry
            // won't fix; the workflow masks it with the fallback reply.
            _ => GatewayError::invalid_response(format!("HTTP {status}: {message}")),
        }
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    async fn generate(&self, request: &GenerateRequest) -> Result<Completion, GatewayError> {
        if self.api_key.trim().is_empty() {
            return Err(GatewayError::unauthenticated("no API key configured"));
        }

        let gemini_request = Self::translate_request(request);
        let url = format!("{}?key={}", self.base_url, self.api_key);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&gemini_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::unavailable(format!("request timeout: {e}"))
                } else if e.is_connect() {
                    GatewayError::unavailable(format!("connection failed: {e}"))
                } else {
                    GatewayError::unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::unavailable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or_else(|_| body.clone(), |e| e.error.message);
            return Err(Self::classify_status(status.as_u16(), message));
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::invalid_response(format!("failed to parse response: {e}")))?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: u32,
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

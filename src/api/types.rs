//! API request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to process one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub user_name: Option<String>,
    pub session_id: Option<String>,
}

/// Response for a processed chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_name: String,
    pub session_id: String,
    pub status: &'static str,
}

/// Root banner response
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub gemini_configured: bool,
}

/// Detailed health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceStatus,
    pub version: &'static str,
}

/// Per-service health breakdown
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub http: &'static str,
    pub gemini_api: &'static str,
    pub workflow: &'static str,
}

/// Configuration status response
#[derive(Debug, Serialize)]
pub struct ConfigStatusResponse {
    pub gemini_configured: bool,
    pub model: String,
    pub features: FeatureFlags,
}

/// Feature availability flags
#[derive(Debug, Serialize)]
pub struct FeatureFlags {
    pub voice_recognition: bool,
    pub conversation_history: bool,
    pub personalized_responses: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

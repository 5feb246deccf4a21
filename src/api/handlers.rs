//! HTTP request handlers

use super::types::{
    ChatRequest, ChatResponse, ConfigStatusResponse, ErrorResponse, FeatureFlags, HealthResponse,
    HomeResponse, ServiceStatus,
};
use super::AppState;
use crate::workflow::TurnError;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/config", get(config_status))
        .route("/chat", post(chat))
        .with_state(state)
}

// ============================================================
// Health & Status
// ============================================================

async fn home(State(state): State<AppState>) -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "Isha AI Assistant Backend is running!",
        status: "healthy",
        timestamp: Utc::now(),
        gemini_configured: state.config.gemini_configured(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        services: ServiceStatus {
            http: "running",
            gemini_api: if state.config.gemini_configured() {
                "configured"
            } else {
                "not_configured"
            },
            workflow: "initialized",
        },
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn config_status(State(state): State<AppState>) -> Json<ConfigStatusResponse> {
    Json(ConfigStatusResponse {
        gemini_configured: state.config.gemini_configured(),
        model: state.config.model_name.clone(),
        features: FeatureFlags {
            voice_recognition: true,
            conversation_history: true,
            personalized_responses: true,
        },
    })
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let session_id = req
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let outcome = state
        .coordinator
        .process_turn(&session_id, &req.message, req.user_name.as_deref())
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        message_id: outcome.message_id,
        timestamp: outcome.timestamp,
        user_name: outcome.user_name,
        session_id,
        status: "success",
    }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl From<TurnError> for AppError {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::InvalidInput(msg) => AppError::BadRequest(msg),
            // Generic category only - no provider detail leaves the process.
            TurnError::Misconfigured => {
                AppError::Internal("the assistant backend is not configured".to_string())
            }
            TurnError::TooManyConflicts { .. } => {
                AppError::ServiceUnavailable("session is busy, please retry".to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

//! Isha AI Assistant backend
//!
//! A conversational request-orchestration layer between HTTP callers and
//! the Gemini API: each turn builds a bounded context, invokes the model,
//! enforces the acknowledgment contract on the reply, and commits the turn
//! into in-memory session state.

mod api;
mod config;
mod context;
mod conversation;
mod llm;
mod store;
mod validator;
mod workflow;

use api::{create_router, AppState};
use axum::http::HeaderValue;
use config::Config;
use llm::{GeminiGateway, LoggingGateway, ModelGateway};
use std::net::SocketAddr;
use std::sync::Arc;
use store::SessionStore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::AckValidator;
use workflow::{Coordinator, TurnSettings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isha_backend=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    if config.gemini_configured() {
        tracing::info!(model = %config.model_name, "Gemini API configured");
    } else {
        tracing::warn!("GEMINI_API_KEY not set; chat requests will fail as misconfigured");
    }

    // Assemble the workflow
    let gateway = GeminiGateway::new(
        config.gemini_api_key.clone().unwrap_or_default(),
        config.model_name.clone(),
        config.model_timeout,
    )?;
    let gateway: Arc<dyn ModelGateway> = Arc::new(LoggingGateway::new(Arc::new(gateway)));

    let store = Arc::new(SessionStore::new(config.max_sessions));
    let coordinator = Arc::new(Coordinator::new(
        store,
        gateway,
        AckValidator::default(),
        TurnSettings {
            history_window: config.history_window,
            params: config.generation_params(),
            max_message_len: config.max_message_len,
            max_commit_retries: config.max_commit_retries,
            retry_backoff: config.retry_backoff,
        },
    ));

    let state = AppState::new(coordinator, config.clone());

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&config.allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    // Start server
    let addr = SocketAddr::new(config.host.parse()?, config.port);
    tracing::info!("Isha backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the CORS origin policy: `*` opens the API up, anything else is an
/// exact origin list (unparseable entries are dropped with a warning).
fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}

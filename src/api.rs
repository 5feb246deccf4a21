//! HTTP API for the assistant backend

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::Config;
use crate::workflow::Coordinator;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, config: Arc<Config>) -> Self {
        Self {
            coordinator,
            config,
        }
    }
}

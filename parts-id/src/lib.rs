//! parts-id library interface
//!
//! Auto parts identification service: photos go to a hosted vision model,
//! the reply is scored, and a heavier fallback path runs when the result is
//! weak or the caller asks for it.

pub mod api;
pub mod config;
pub mod error;
pub mod fallback;
pub mod flags;
pub mod identifiers;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod scoring;
pub mod types;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::UploadLimits;
use crate::flags::FeatureFlags;
use crate::orchestrator::IdentificationOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IdentificationOrchestrator>,
    /// Same store the orchestrator reads, so toggles apply to the next request
    pub flags: FeatureFlags,
    pub upload: UploadLimits,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<IdentificationOrchestrator>,
        flags: FeatureFlags,
        upload: UploadLimits,
    ) -> Self {
        Self {
            orchestrator,
            flags,
            upload,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.upload.max_body_bytes;

    Router::new()
        .merge(api::identify_routes())
        .merge(api::flag_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

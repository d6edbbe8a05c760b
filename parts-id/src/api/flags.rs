//! Feature flag API handlers
//!
//! GET /feature-flags, POST /toggle-feature

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::fallback::FallbackUsage;
use crate::flags::{FlagSnapshot, ENABLE_BROWSER_FALLBACK, ENABLE_FALLBACK_UI};
use crate::{error::ApiResult, AppState};

/// GET /feature-flags response
#[derive(Debug, Serialize)]
pub struct FeatureFlagsResponse {
    pub flags: FlagSnapshot,
    pub browser_fallback_enabled: bool,
    pub enhanced_ui_enabled: bool,
    pub fallback_limits: FallbackUsage,
}

/// POST /toggle-feature request
#[derive(Debug, Deserialize)]
pub struct ToggleFeatureRequest {
    pub feature_name: String,
    pub enabled: bool,
}

/// POST /toggle-feature response
#[derive(Debug, Serialize)]
pub struct ToggleFeatureResponse {
    pub success: bool,
    pub feature: String,
    pub enabled: bool,
    pub message: String,
}

/// GET /feature-flags
pub async fn get_feature_flags(State(state): State<AppState>) -> Json<FeatureFlagsResponse> {
    let flags = state.flags.snapshot().await;
    let fallback_limits = state.orchestrator.fallback_usage().await;

    Json(FeatureFlagsResponse {
        browser_fallback_enabled: flags.is_enabled(ENABLE_BROWSER_FALLBACK),
        enhanced_ui_enabled: flags.is_enabled(ENABLE_FALLBACK_UI),
        flags,
        fallback_limits,
    })
}

/// POST /toggle-feature
///
/// Unknown flag names return 404 and leave the store unchanged. A body that
/// does not deserialize is a 400 in the common error shape.
pub async fn toggle_feature(
    State(state): State<AppState>,
    payload: Result<Json<ToggleFeatureRequest>, JsonRejection>,
) -> ApiResult<Json<ToggleFeatureResponse>> {
    let Json(request) = payload?;
    tracing::info!(feature = %request.feature_name, enabled = request.enabled, "Toggle feature flag");

    state.flags.set(&request.feature_name, request.enabled).await?;

    let message = format!(
        "Feature '{}' {}",
        request.feature_name,
        if request.enabled { "enabled" } else { "disabled" }
    );

    Ok(Json(ToggleFeatureResponse {
        success: true,
        feature: request.feature_name,
        enabled: request.enabled,
        message,
    }))
}

/// Build feature flag routes
pub fn flag_routes() -> Router<AppState> {
    Router::new()
        .route("/feature-flags", get(get_feature_flags))
        .route("/toggle-feature", post(toggle_feature))
}

//! Identification endpoint
//!
//! POST /enhanced-identify
//!
//! Multipart form: one or more `file` fields plus an optional
//! `force_fallback` field. `force_fallback` may also be given as a query
//! parameter; the form field wins when both are present.
//!
//! Upload problems, including requests that are not multipart at all, are
//! 400s. Identification failures are reported in the body as
//! `success: false` so the UI can offer the fallback path.

use axum::{
    extract::{multipart::MultipartRejection, rejection::QueryRejection, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use parts_common::config::parse_bool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::content_type_for;
use crate::error::{ApiError, ApiResult};
use crate::types::{IdentificationResult, PartImage, Recommendations};
use crate::AppState;

/// Query parameters
#[derive(Debug, Default, Deserialize)]
pub struct IdentifyParams {
    pub force_fallback: Option<bool>,
}

/// POST /enhanced-identify response
#[derive(Debug, Serialize)]
pub struct IdentifyResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<IdentificationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Recommendations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_available: Option<bool>,
}

/// Parsed multipart upload
struct Upload {
    images: Vec<PartImage>,
    force_fallback: Option<bool>,
}

/// POST /enhanced-identify
pub async fn enhanced_identify(
    State(state): State<AppState>,
    params: Result<Query<IdentifyParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<IdentifyResponse>> {
    let Query(params) = params?;
    let upload = read_upload(&state, multipart?).await?;
    let force_fallback = upload.force_fallback.or(params.force_fallback).unwrap_or(false);

    info!(
        image_count = upload.images.len(),
        force_fallback,
        "Enhanced identification request"
    );

    let response = match state.orchestrator.identify(upload.images, force_fallback).await {
        Ok(outcome) => {
            debug!(fallback_invoked = outcome.fallback_invoked, "Identification succeeded");
            IdentifyResponse {
                success: true,
                result: Some(outcome.result),
                recommendations: Some(outcome.recommendations),
                error: None,
                fallback_available: None,
            }
        }
        Err(failure) => IdentifyResponse {
            success: false,
            result: None,
            recommendations: None,
            error: Some(failure.error),
            fallback_available: Some(failure.fallback_available),
        },
    };

    Ok(Json(response))
}

async fn read_upload(state: &AppState, mut multipart: Multipart) -> ApiResult<Upload> {
    let mut images = Vec::new();
    let mut force_fallback = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" | "files" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("File field without a file name".to_string()))?;

                if !state.upload.is_allowed_file(&file_name) {
                    return Err(ApiError::BadRequest(format!(
                        "Unsupported file type: {}",
                        file_name
                    )));
                }

                if images.len() >= state.upload.max_files {
                    return Err(ApiError::BadRequest(format!(
                        "Too many files (maximum {})",
                        state.upload.max_files
                    )));
                }

                let content_type = field
                    .content_type()
                    .filter(|ct| ct.starts_with("image/"))
                    .map(str::to_string)
                    .unwrap_or_else(|| content_type_for(&file_name).to_string());

                let data = field.bytes().await?;
                if data.is_empty() {
                    return Err(ApiError::BadRequest(format!("Uploaded file '{}' is empty", file_name)));
                }

                debug!(file = %file_name, bytes = data.len(), "Received image");
                images.push(PartImage::new(file_name, content_type, data.to_vec()));
            }
            "force_fallback" => {
                let value = field.text().await?;
                force_fallback = Some(parse_bool(&value));
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    if images.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded".to_string()));
    }

    Ok(Upload {
        images,
        force_fallback,
    })
}

/// Build identification routes
pub fn identify_routes() -> Router<AppState> {
    Router::new().route("/enhanced-identify", post(enhanced_identify))
}

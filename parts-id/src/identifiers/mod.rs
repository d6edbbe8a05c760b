//! Primary identifiers
//!
//! Each identifier sends the uploaded photos plus a prompt to a hosted vision
//! model and parses the reply into a [`RawIdentification`].
//!
//! # Identifiers
//! 1. Gemini - Google `generateContent` REST API
//! 2. OpenAI - chat completions with image inputs
//! 3. Demo - canned reply used when no API key is configured

pub mod demo;
pub mod gemini;
pub mod openai;

pub use demo::DemoIdentifier;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::config::{Provider, ProviderSettings};
use crate::types::{IdentifyError, PartImage, RawIdentification};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::warn;

/// Hosted vision model that can identify a part from photos
#[async_trait]
pub trait PartIdentifier: Send + Sync {
    /// Identifier name for provenance ("gemini", "openai", "demo")
    fn name(&self) -> &'static str;

    /// Identify the part shown in `images`
    ///
    /// # Errors
    /// `IdentifyError` for auth, quota, transport, HTTP and parse failures.
    async fn identify(
        &self,
        images: &[PartImage],
        prompt: &str,
    ) -> Result<RawIdentification, IdentifyError>;
}

/// Build the configured primary identifier
///
/// Without an API key for the selected provider the demo identifier is used.
pub fn build_primary(settings: &ProviderSettings) -> Result<Arc<dyn PartIdentifier>, IdentifyError> {
    match settings.primary {
        Provider::Gemini => match &settings.gemini_api_key {
            Some(key) => Ok(Arc::new(GeminiClient::new(
                key.clone(),
                settings.gemini_model.clone(),
                settings.gemini_base_url.clone(),
            )?)),
            None => {
                warn!("No Gemini API key configured - running in demo mode");
                Ok(Arc::new(DemoIdentifier))
            }
        },
        Provider::OpenAi => match &settings.openai_api_key {
            Some(key) => Ok(Arc::new(OpenAiClient::new(
                key.clone(),
                settings.openai_model.clone(),
                settings.openai_base_url.clone(),
            )?)),
            None => {
                warn!("No OpenAI API key configured - running in demo mode");
                Ok(Arc::new(DemoIdentifier))
            }
        },
    }
}

/// Build a client for the provider that is not primary, if it has a key
pub fn build_secondary(settings: &ProviderSettings) -> Result<Option<Arc<dyn PartIdentifier>>, IdentifyError> {
    let secondary: Option<Arc<dyn PartIdentifier>> = match settings.primary {
        Provider::Gemini => match &settings.openai_api_key {
            Some(key) => Some(Arc::new(OpenAiClient::new(
                key.clone(),
                settings.openai_model.clone(),
                settings.openai_base_url.clone(),
            )?)),
            None => None,
        },
        Provider::OpenAi => match &settings.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(
                key.clone(),
                settings.gemini_model.clone(),
                settings.gemini_base_url.clone(),
            )?)),
            None => None,
        },
    };
    Ok(secondary)
}

/// Map a non-success HTTP response to an identifier error
pub(crate) fn map_http_error(status: StatusCode, body: String) -> IdentifyError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => IdentifyError::Auth(body),
        // Gemini answers 400 for a malformed or revoked key
        StatusCode::BAD_REQUEST if body.contains("API key") => IdentifyError::Auth(body),
        StatusCode::TOO_MANY_REQUESTS => IdentifyError::RateLimited(body),
        _ => IdentifyError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

pub(crate) fn encode_image(image: &PartImage) -> String {
    STANDARD.encode(&image.data)
}

pub(crate) fn ensure_images(images: &[PartImage]) -> Result<(), IdentifyError> {
    if images.is_empty() {
        return Err(IdentifyError::InvalidInput("No images supplied".to_string()));
    }
    Ok(())
}

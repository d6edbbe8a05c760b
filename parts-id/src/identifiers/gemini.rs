//! Gemini Client
//!
//! Sends photos as inline base64 parts to the Gemini `generateContent`
//! endpoint and parses the text reply.
//!
//! # API Reference
//! - Endpoint: `{base}/v1beta/models/{model}:generateContent`
//! - Documentation: https://ai.google.dev/api/generate-content

use super::{encode_image, ensure_images, map_http_error, PartIdentifier};
use crate::parser::parse_model_reply;
use crate::types::{IdentifyError, PartImage, RawIdentification};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Gemini API base URL
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for part identification
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// Vision calls on several photos routinely take tens of seconds
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Gemini vision client
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self, IdentifyError> {
        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| IdentifyError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request<'a>(images: &'a [PartImage], prompt: &'a str) -> GenerateRequest<'a> {
        let mut parts = vec![RequestPart::Text { text: prompt }];
        parts.extend(images.iter().map(|image| RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: &image.content_type,
                data: encode_image(image),
            },
        }));

        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_p: 0.9,
                max_output_tokens: 2048,
            },
        }
    }
}

#[async_trait]
impl PartIdentifier for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn identify(
        &self,
        images: &[PartImage],
        prompt: &str,
    ) -> Result<RawIdentification, IdentifyError> {
        ensure_images(images)?;

        debug!(model = %self.model, image_count = images.len(), "Querying Gemini API");

        let response = self
            .http_client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_request(images, prompt))
            .send()
            .await
            .map_err(|e| IdentifyError::Network(format!("Gemini API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| IdentifyError::Parse(format!("Failed to parse Gemini response: {}", e)))?;

        let text = reply.text().ok_or_else(|| {
            IdentifyError::Parse("Gemini response contained no text candidates".to_string())
        })?;

        debug!(reply_length = text.len(), "Gemini reply received");
        parse_model_reply(&text)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

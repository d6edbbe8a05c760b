//! OpenAI Client
//!
//! Chat completions request with the photos attached as `data:` URLs.

use super::{encode_image, ensure_images, map_http_error, PartIdentifier};
use crate::parser::parse_model_reply;
use crate::types::{IdentifyError, PartImage, RawIdentification};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default vision-capable model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI vision client
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
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

    fn build_request<'a>(&'a self, images: &'a [PartImage], prompt: &'a str) -> ChatRequest<'a> {
        let mut content = vec![ContentPart::Text { text: prompt }];
        content.extend(images.iter().map(|image| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: format!("data:{};base64,{}", image.content_type, encode_image(image)),
            },
        }));

        ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content,
            }],
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

#[async_trait]
impl PartIdentifier for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn identify(
        &self,
        images: &[PartImage],
        prompt: &str,
    ) -> Result<RawIdentification, IdentifyError> {
        ensure_images(images)?;

        debug!(model = %self.model, image_count = images.len(), "Querying OpenAI API");

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.build_request(images, prompt))
            .send()
            .await
            .map_err(|e| IdentifyError::Network(format!("OpenAI API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, body));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| IdentifyError::Parse(format!("Failed to parse OpenAI response: {}", e)))?;

        let text = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| IdentifyError::Parse("OpenAI response contained no message".to_string()))?;

        parse_model_reply(&text)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

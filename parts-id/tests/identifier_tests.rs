//! Vision provider client tests
//!
//! Runs the Gemini and OpenAI clients against an in-process axum server that
//! mimics each provider's REST API.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use parts_id::identifiers::{GeminiClient, OpenAiClient, PartIdentifier};
use parts_id::prompts::IDENTIFY_PROMPT;
use parts_id::types::{IdentifyError, PartImage};

const REPLY: &str = r#"Here is the analysis:
{"part_name": "Alternator", "part_number": "LR1110-501", "category": "Electrical",
 "condition": "Used", "description": "Denso 110A alternator with pulley",
 "compatibility": ["2005-2010 Honda Civic"], "brand": "Denso"}"#;

/// Gemini generateContent stand-in; the `key` query parameter picks the outcome
async fn gemini_generate(
    Path(model_action): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !model_action.ends_with(":generateContent") {
        return StatusCode::NOT_FOUND.into_response();
    }

    match query.get("key").map(String::as_str) {
        Some("good") => {
            let parts = &body["contents"][0]["parts"];
            if parts[1]["inline_data"]["data"].as_str().is_none() {
                return (StatusCode::UNPROCESSABLE_ENTITY, "missing image").into_response();
            }
            Json(json!({
                "candidates": [{"content": {"parts": [{"text": REPLY}]}}]
            }))
            .into_response()
        }
        Some("empty") => Json(json!({"candidates": []})).into_response(),
        Some("busy") => (StatusCode::TOO_MANY_REQUESTS, "Resource has been exhausted").into_response(),
        Some("broken") => (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            "API key not valid. Please pass a valid API key.",
        )
            .into_response(),
    }
}

/// OpenAI chat completions stand-in
async fn openai_chat(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == "Bearer good")
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Incorrect API key provided").into_response();
    }

    let image_url = body["messages"][0]["content"][1]["image_url"]["url"]
        .as_str()
        .unwrap_or_default();
    if !image_url.starts_with("data:image/jpeg;base64,") {
        return (StatusCode::BAD_REQUEST, "bad image").into_response();
    }

    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": REPLY}}]
    }))
    .into_response()
}

async fn start_stub_server() -> SocketAddr {
    let app = Router::new()
        .route("/v1beta/models/:model_action", post(gemini_generate))
        .route("/v1/chat/completions", post(openai_chat));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn images() -> Vec<PartImage> {
    vec![PartImage::new("alternator.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF])]
}

fn gemini(addr: SocketAddr, key: &str) -> GeminiClient {
    GeminiClient::new(key.to_string(), "gemini-test".to_string(), format!("http://{}", addr)).unwrap()
}

#[tokio::test]
async fn test_gemini_success() {
    let addr = start_stub_server().await;

    let raw = gemini(addr, "good").identify(&images(), IDENTIFY_PROMPT).await.unwrap();

    assert_eq!(raw.part_name, "Alternator");
    assert_eq!(raw.part_number.as_deref(), Some("LR1110-501"));
    assert_eq!(raw.brand.as_deref(), Some("Denso"));
    assert_eq!(raw.compatibility, vec!["2005-2010 Honda Civic".to_string()]);
}

#[tokio::test]
async fn test_gemini_invalid_key_is_auth_error() {
    let addr = start_stub_server().await;

    let err = gemini(addr, "revoked").identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::Auth(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_gemini_rate_limited() {
    let addr = start_stub_server().await;

    let err = gemini(addr, "busy").identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::RateLimited(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_gemini_server_error() {
    let addr = start_stub_server().await;

    let err = gemini(addr, "broken").identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    match err {
        IdentifyError::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "backend error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_parse_error() {
    let addr = start_stub_server().await;

    let err = gemini(addr, "empty").identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::Parse(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_gemini_unreachable_is_network_error() {
    // Bind then drop to get a port with nothing listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gemini(addr, "good").identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_no_images_rejected_before_request() {
    let addr = start_stub_server().await;

    let err = gemini(addr, "good").identify(&[], IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::InvalidInput(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_openai_success() {
    let addr = start_stub_server().await;
    let client = OpenAiClient::new("good".to_string(), "gpt-test".to_string(), format!("http://{}", addr)).unwrap();

    let raw = client.identify(&images(), IDENTIFY_PROMPT).await.unwrap();
    assert_eq!(raw.part_name, "Alternator");
    assert_eq!(raw.category, "Electrical");
}

#[tokio::test]
async fn test_openai_bad_key_is_auth_error() {
    let addr = start_stub_server().await;
    let client = OpenAiClient::new("wrong".to_string(), "gpt-test".to_string(), format!("http://{}", addr)).unwrap();

    let err = client.identify(&images(), IDENTIFY_PROMPT).await.unwrap_err();
    assert!(matches!(err, IdentifyError::Auth(_)), "got {:?}", err);
}

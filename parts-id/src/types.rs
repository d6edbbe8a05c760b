//! Core types for part identification
//!
//! Identifiers produce a [`RawIdentification`]; the orchestrator scores it and
//! turns it into an [`IdentificationResult`] tagged with the method that
//! produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Input
// ============================================================================

/// One uploaded image
#[derive(Debug, Clone)]
pub struct PartImage {
    /// Original file name from the upload
    pub file_name: String,
    /// MIME type ("image/jpeg", "image/png", ...)
    pub content_type: String,
    /// Raw image bytes
    pub data: Vec<u8>,
}

impl PartImage {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

// ============================================================================
// Identifier output
// ============================================================================

/// Unscored identification as returned by an identifier
///
/// Every field is defaulted so partial model replies still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawIdentification {
    pub part_name: String,
    pub part_number: Option<String>,
    pub category: String,
    pub condition: String,
    pub description: String,
    /// Compatible vehicles ("2010-2015 Toyota Camry", ...)
    pub compatibility: Vec<String>,
    pub brand: Option<String>,
    /// Unparsed model text, kept for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

/// Which path produced an identification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentificationMethod {
    /// Hosted AI vision call
    Primary,
    /// Heavier secondary strategy (browser automation, second provider)
    Fallback,
}

impl IdentificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationMethod::Primary => "primary",
            IdentificationMethod::Fallback => "fallback",
        }
    }
}

/// Scored identification returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationResult {
    pub part_name: String,
    pub part_number: Option<String>,
    pub category: String,
    pub condition: String,
    pub description: String,
    pub compatible_vehicles: Vec<String>,
    pub brand: Option<String>,
    /// Confidence in [0, 1]
    pub confidence_score: f32,
    pub method_used: IdentificationMethod,
    /// Human-readable quality issues
    pub issues: Vec<String>,
    /// Confidence fell below the fallback threshold
    pub needs_fallback: bool,
    /// Identifier that produced the result ("gemini", "command", ...)
    pub source: String,
    /// Produced by the issue-focused re-prompt
    pub refined_prompt: bool,
    pub timestamp: DateTime<Utc>,
}

/// Coarse confidence band for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// User-facing guidance attached to a successful identification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    /// Confidence is low and fallback is enabled
    pub needs_fallback: bool,
    /// Current state of the fallback feature flag
    pub fallback_available: bool,
    pub confidence_level: ConfidenceLevel,
    pub suggested_actions: Vec<String>,
}

/// Successful orchestrator output
#[derive(Debug, Clone)]
pub struct IdentificationOutcome {
    pub result: IdentificationResult,
    pub recommendations: Recommendations,
    /// Fallback identifier was invoked for this request
    pub fallback_invoked: bool,
}

/// Orchestrator failure, reported to the client as a degraded response
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct IdentificationFailure {
    pub error: String,
    pub fallback_available: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Primary identifier error
#[derive(Debug, Error)]
pub enum IdentifyError {
    /// API key missing, invalid or rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Quota or rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport failure (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Reply could not be turned into an identification
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request had nothing to identify
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

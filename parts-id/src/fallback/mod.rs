//! Fallback identification
//!
//! The fallback path is heavier than a single vision call: it may drive a
//! headless browser through an external automation command, or ask a second
//! vision provider. It always runs through [`FallbackRunner`], which puts the
//! work on its own task with a hard timeout and a cancellation token.

pub mod command;
pub mod runner;
pub mod vision;

pub use command::CommandFallback;
pub use runner::{FallbackLimits, FallbackRunner, FallbackUsage};
pub use vision::VisionFallback;

use crate::config::FallbackSettings;
use crate::identifiers::build_secondary;
use crate::types::{IdentifyError, PartImage, RawIdentification};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fallback errors
#[derive(Debug, Error)]
pub enum FallbackError {
    /// No fallback backend configured
    #[error("No fallback identifier is configured")]
    NotConfigured,

    /// Daily run cap reached
    #[error("Daily fallback limit of {0} runs reached")]
    QuotaExhausted(u32),

    /// Too soon after the previous run
    #[error("Fallback cooling down, retry in {0} s")]
    CoolingDown(u64),

    /// Hard deadline elapsed
    #[error("Fallback timed out after {} s", .0.as_secs())]
    TimedOut(Duration),

    /// Caller went away or the service is shutting down
    #[error("Fallback cancelled")]
    Cancelled,

    /// Backend ran but could not produce an identification
    #[error("Fallback failed: {0}")]
    Failed(String),
}

impl From<IdentifyError> for FallbackError {
    fn from(err: IdentifyError) -> Self {
        FallbackError::Failed(err.to_string())
    }
}

/// Secondary identification strategy
///
/// Implementations must stop promptly once `cancel` fires.
#[async_trait]
pub trait FallbackIdentifier: Send + Sync {
    /// Backend name for provenance ("command", "vision:openai", ...)
    fn name(&self) -> &str;

    async fn identify(
        &self,
        images: Arc<[PartImage]>,
        cancel: CancellationToken,
    ) -> Result<RawIdentification, FallbackError>;
}

/// Build the configured fallback backend
///
/// An automation command takes precedence over the secondary provider.
pub fn build_fallback(
    settings: &FallbackSettings,
    providers: &crate::config::ProviderSettings,
) -> Result<Option<Arc<dyn FallbackIdentifier>>, IdentifyError> {
    if let Some(command) = &settings.command {
        if let Some(fallback) = CommandFallback::from_argv(command) {
            info!(program = %fallback.program(), "Fallback backend: automation command");
            return Ok(Some(Arc::new(fallback)));
        }
    }

    if settings.use_secondary_provider {
        if let Some(secondary) = build_secondary(providers)? {
            let fallback = VisionFallback::new(secondary);
            info!(backend = %fallback.name(), "Fallback backend: secondary vision provider");
            return Ok(Some(Arc::new(fallback)));
        }
    }

    info!("No fallback backend configured");
    Ok(None)
}

//! Secondary vision provider fallback
//!
//! Reuses a [`PartIdentifier`] (normally the provider that is not primary)
//! with the issue-agnostic base prompt.

use super::{FallbackError, FallbackIdentifier};
use crate::identifiers::PartIdentifier;
use crate::prompts::IDENTIFY_PROMPT;
use crate::types::{PartImage, RawIdentification};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct VisionFallback {
    identifier: Arc<dyn PartIdentifier>,
    name: String,
}

impl VisionFallback {
    pub fn new(identifier: Arc<dyn PartIdentifier>) -> Self {
        let name = format!("vision:{}", identifier.name());
        Self { identifier, name }
    }
}

#[async_trait]
impl FallbackIdentifier for VisionFallback {
    fn name(&self) -> &str {
        &self.name
    }

    async fn identify(
        &self,
        images: Arc<[PartImage]>,
        cancel: CancellationToken,
    ) -> Result<RawIdentification, FallbackError> {
        tokio::select! {
            result = self.identifier.identify(&images, IDENTIFY_PROMPT) => Ok(result?),
            _ = cancel.cancelled() => Err(FallbackError::Cancelled),
        }
    }
}

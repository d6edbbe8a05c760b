//! Demo identifier
//!
//! Canned reply so the service and UI work without API keys.

use super::{ensure_images, PartIdentifier};
use crate::types::{IdentifyError, PartImage, RawIdentification};
use async_trait::async_trait;

pub struct DemoIdentifier;

#[async_trait]
impl PartIdentifier for DemoIdentifier {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn identify(
        &self,
        images: &[PartImage],
        _prompt: &str,
    ) -> Result<RawIdentification, IdentifyError> {
        ensure_images(images)?;

        Ok(RawIdentification {
            part_name: "Demo Part - Brake Caliper".to_string(),
            part_number: Some("DEMO-12345".to_string()),
            category: "Brakes".to_string(),
            condition: "Used - Good".to_string(),
            description: "This is a demo response. Configure API keys for real results.".to_string(),
            compatibility: vec![
                "2010-2015 Toyota Camry".to_string(),
                "2011-2016 Honda Accord".to_string(),
            ],
            brand: None,
            raw_text: None,
        })
    }
}

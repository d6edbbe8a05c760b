//! Stub identifiers
//!
//! Scripted primary and fallback identifiers so orchestration can be tested
//! without network access.

use async_trait::async_trait;
use parts_id::fallback::{FallbackError, FallbackIdentifier, FallbackLimits, FallbackRunner};
use parts_id::flags::FeatureFlags;
use parts_id::identifiers::PartIdentifier;
use parts_id::orchestrator::IdentificationOrchestrator;
use parts_id::scoring::ScoringPolicy;
use parts_id::types::{IdentifyError, PartImage, RawIdentification};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replies without issues
pub fn clean_raw() -> RawIdentification {
    RawIdentification {
        part_name: "Front Brake Caliper".to_string(),
        part_number: Some("18B4678".to_string()),
        category: "Brakes".to_string(),
        condition: "Used - Good".to_string(),
        description: "Remanufactured front left brake caliper with bracket".to_string(),
        compatibility: vec!["2010-2015 Toyota Camry".to_string()],
        brand: Some("Cardone".to_string()),
        raw_text: None,
    }
}

/// Unknown name, no part number, brief description: confidence 0.1
pub fn low_confidence_raw() -> RawIdentification {
    RawIdentification {
        part_name: "Unknown component".to_string(),
        part_number: None,
        category: "Auto Parts".to_string(),
        condition: "Unknown".to_string(),
        description: "Metal part".to_string(),
        ..Default::default()
    }
}

pub fn images() -> Vec<PartImage> {
    vec![PartImage::new("part.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF])]
}

/// Primary identifier answering from a fixed script
pub struct ScriptedIdentifier {
    replies: Mutex<VecDeque<Result<RawIdentification, IdentifyError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedIdentifier {
    pub fn new(replies: Vec<Result<RawIdentification, IdentifyError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartIdentifier for ScriptedIdentifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn identify(
        &self,
        _images: &[PartImage],
        prompt: &str,
    ) -> Result<RawIdentification, IdentifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(IdentifyError::Parse("script exhausted".to_string())))
    }
}

/// Fallback backend with a fixed answer; `None` fails every run
pub struct StubFallback {
    reply: Option<RawIdentification>,
    calls: AtomicUsize,
}

impl StubFallback {
    pub fn new(reply: Option<RawIdentification>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FallbackIdentifier for StubFallback {
    fn name(&self) -> &str {
        "stub"
    }

    async fn identify(
        &self,
        _images: Arc<[PartImage]>,
        _cancel: CancellationToken,
    ) -> Result<RawIdentification, FallbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| FallbackError::Failed("automation could not read the part".to_string()))
    }
}

/// Orchestrator wired to the given stubs with generous runner limits
pub fn orchestrator(
    primary: Arc<ScriptedIdentifier>,
    fallback: Option<Arc<StubFallback>>,
    flags: FeatureFlags,
) -> IdentificationOrchestrator {
    let limits = FallbackLimits {
        timeout: Duration::from_secs(5),
        max_daily: 0,
        cooldown: Duration::ZERO,
    };
    let backend = fallback.map(|f| f as Arc<dyn FallbackIdentifier>);
    let runner = FallbackRunner::new(backend, limits, CancellationToken::new());

    IdentificationOrchestrator::new(primary, Arc::new(runner), flags, ScoringPolicy::default())
}

//! Identification orchestrator
//!
//! Per-request pipeline:
//! 1. Forced fallback skips straight to the fallback runner (flag permitting)
//! 2. Primary identification call
//! 3. Issue-focused re-prompt when `enable_enhanced_prompts` is on and the
//!    primary result scores below the threshold; the higher-scoring result
//!    is kept
//! 4. Fallback recommended when confidence is below the threshold and the
//!    fallback flag is on; run automatically only with `enable_auto_fallback`
//!
//! Flags are read once per request from the injected [`FeatureFlags`] handle.
//! Upstream failures never escape as errors other than
//! [`IdentificationFailure`].

use crate::fallback::{FallbackError, FallbackRunner, FallbackUsage};
use crate::flags::{
    FeatureFlags, FlagSnapshot, ENABLE_AUTO_FALLBACK, ENABLE_BROWSER_FALLBACK,
    ENABLE_CONFIDENCE_SCORING, ENABLE_DEBUG_LOGGING, ENABLE_ENHANCED_PROMPTS,
};
use crate::identifiers::PartIdentifier;
use crate::prompts::{enhanced_prompt, IDENTIFY_PROMPT};
use crate::scoring::ScoringPolicy;
use crate::types::{
    IdentificationFailure, IdentificationMethod, IdentificationOutcome, IdentificationResult,
    PartImage, RawIdentification, Recommendations,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Coordinates primary, re-prompt and fallback identification
pub struct IdentificationOrchestrator {
    primary: Arc<dyn PartIdentifier>,
    fallback: Arc<FallbackRunner>,
    flags: FeatureFlags,
    policy: ScoringPolicy,
}

impl IdentificationOrchestrator {
    pub fn new(
        primary: Arc<dyn PartIdentifier>,
        fallback: Arc<FallbackRunner>,
        flags: FeatureFlags,
        policy: ScoringPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            flags,
            policy,
        }
    }

    pub fn primary_name(&self) -> &'static str {
        self.primary.name()
    }

    pub async fn fallback_usage(&self) -> FallbackUsage {
        self.fallback.usage().await
    }

    /// Identify the part shown in `images`
    ///
    /// # Errors
    /// `IdentificationFailure` when the primary call fails, or when fallback
    /// is forced while the fallback flag is off.
    pub async fn identify(
        &self,
        images: Vec<PartImage>,
        force_fallback: bool,
    ) -> Result<IdentificationOutcome, IdentificationFailure> {
        let flags = self.flags.snapshot().await;
        let fallback_enabled = flags.is_enabled(ENABLE_BROWSER_FALLBACK);
        let images: Arc<[PartImage]> = Arc::from(images);

        info!(
            image_count = images.len(),
            force_fallback,
            fallback_enabled,
            primary = self.primary.name(),
            "Identification requested"
        );

        if force_fallback {
            return self.forced_fallback(images, &flags).await;
        }

        let mut result = match self.primary_pass(&images, &flags).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Primary identification failed");
                return Err(IdentificationFailure {
                    error: format!("Primary identification failed: {}", e),
                    fallback_available: fallback_enabled,
                });
            }
        };

        let low_confidence = result.confidence_score < self.policy.fallback_threshold;
        let mut recommendations = self.recommendations(&result, fallback_enabled);
        let mut fallback_invoked = false;

        if low_confidence && fallback_enabled && flags.is_enabled(ENABLE_AUTO_FALLBACK) {
            info!(
                confidence = result.confidence_score,
                threshold = self.policy.fallback_threshold,
                "Low confidence - running automatic fallback"
            );
            fallback_invoked = true;

            match self.fallback.run(images.clone()).await {
                Ok(raw) => {
                    let fallback_result = self.score(
                        raw,
                        IdentificationMethod::Fallback,
                        &flags,
                        self.fallback_source(),
                    );
                    if fallback_result.confidence_score >= result.confidence_score {
                        result = fallback_result;
                        recommendations = self.recommendations(&result, fallback_enabled);
                    } else {
                        info!(
                            fallback_confidence = fallback_result.confidence_score,
                            primary_confidence = result.confidence_score,
                            "Fallback scored lower than primary - keeping primary result"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Automatic fallback did not complete - keeping primary result");
                    recommendations
                        .suggested_actions
                        .push(format!("Automatic fallback was attempted but was inconclusive: {}", e));
                }
            }
        }

        info!(
            method = result.method_used.as_str(),
            confidence = result.confidence_score,
            issues = result.issues.len(),
            fallback_invoked,
            "Identification complete"
        );

        Ok(IdentificationOutcome {
            result,
            recommendations,
            fallback_invoked,
        })
    }

    /// Primary call plus optional issue-focused re-prompt
    async fn primary_pass(
        &self,
        images: &[PartImage],
        flags: &FlagSnapshot,
    ) -> Result<IdentificationResult, crate::types::IdentifyError> {
        let raw = self.primary.identify(images, IDENTIFY_PROMPT).await?;
        self.log_raw(&raw, flags);

        let scoring = flags.is_enabled(ENABLE_CONFIDENCE_SCORING);
        let assessment = self.policy.assess(&raw, scoring);
        let first = self
            .policy
            .build_result(raw, &assessment, IdentificationMethod::Primary, self.primary.name());

        if !assessment.needs_fallback || !flags.is_enabled(ENABLE_ENHANCED_PROMPTS) {
            return Ok(first);
        }

        debug!(issues = ?first.issues, "Re-prompting primary identifier with focused prompt");
        let prompt = enhanced_prompt(&assessment.issues);
        match self.primary.identify(images, &prompt).await {
            Ok(raw) => {
                self.log_raw(&raw, flags);
                let mut refined = self.score(raw, IdentificationMethod::Primary, flags, self.primary.name());
                refined.refined_prompt = true;
                if refined.confidence_score > first.confidence_score {
                    Ok(refined)
                } else {
                    Ok(first)
                }
            }
            Err(e) => {
                warn!(error = %e, "Focused re-prompt failed - keeping first result");
                Ok(first)
            }
        }
    }

    async fn forced_fallback(
        &self,
        images: Arc<[PartImage]>,
        flags: &FlagSnapshot,
    ) -> Result<IdentificationOutcome, IdentificationFailure> {
        let fallback_enabled = flags.is_enabled(ENABLE_BROWSER_FALLBACK);
        if !fallback_enabled {
            warn!("Fallback forced while {} is off", ENABLE_BROWSER_FALLBACK);
            return Err(IdentificationFailure {
                error: "Fallback identification is disabled".to_string(),
                fallback_available: false,
            });
        }

        let result = match self.fallback.run(images).await {
            Ok(raw) => {
                self.log_raw(&raw, flags);
                self.score(raw, IdentificationMethod::Fallback, flags, self.fallback_source())
            }
            Err(e) => self.inconclusive(&e),
        };

        let recommendations = self.recommendations(&result, fallback_enabled);
        Ok(IdentificationOutcome {
            result,
            recommendations,
            fallback_invoked: true,
        })
    }

    fn score(
        &self,
        raw: RawIdentification,
        method: IdentificationMethod,
        flags: &FlagSnapshot,
        source: &str,
    ) -> IdentificationResult {
        let assessment = self.policy.assess(&raw, flags.is_enabled(ENABLE_CONFIDENCE_SCORING));
        self.policy.build_result(raw, &assessment, method, source)
    }

    /// Result reported when a forced fallback could not finish
    fn inconclusive(&self, err: &FallbackError) -> IdentificationResult {
        IdentificationResult {
            part_name: "Unknown Part".to_string(),
            part_number: None,
            category: "Auto Parts".to_string(),
            condition: "Unknown".to_string(),
            description: format!(
                "Fallback identification was attempted but was inconclusive: {}",
                err
            ),
            compatible_vehicles: Vec::new(),
            brand: None,
            confidence_score: 0.0,
            method_used: IdentificationMethod::Fallback,
            issues: vec![format!("Fallback inconclusive: {}", err)],
            needs_fallback: true,
            source: self.fallback_source().to_string(),
            refined_prompt: false,
            timestamp: Utc::now(),
        }
    }

    fn recommendations(&self, result: &IdentificationResult, fallback_enabled: bool) -> Recommendations {
        Recommendations {
            needs_fallback: fallback_enabled && result.confidence_score < self.policy.fallback_threshold,
            fallback_available: fallback_enabled,
            confidence_level: self.policy.confidence_level(result.confidence_score),
            suggested_actions: self.policy.suggested_actions(result),
        }
    }

    fn fallback_source(&self) -> &str {
        self.fallback.backend_name().unwrap_or("fallback")
    }

    fn log_raw(&self, raw: &RawIdentification, flags: &FlagSnapshot) {
        let text = raw.raw_text.as_deref().unwrap_or("");
        if flags.is_enabled(ENABLE_DEBUG_LOGGING) {
            info!(part_name = %raw.part_name, raw_text = %text, "Model reply");
        } else {
            debug!(part_name = %raw.part_name, raw_text = %text, "Model reply");
        }
    }
}

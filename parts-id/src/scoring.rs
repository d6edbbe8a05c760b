//! Confidence and issue evaluation
//!
//! Inspects a raw identification, lists quality issues, derives a confidence
//! score by deducting a fixed weight per issue, and decides whether the
//! fallback path is warranted.
//!
//! Thresholds live in [`ScoringPolicy`] so deployments can tune them without
//! code changes.

use crate::types::{
    ConfidenceLevel, IdentificationMethod, IdentificationResult, RawIdentification,
};
use chrono::Utc;
use std::fmt;

/// Part numbers models emit when they found nothing
const MISSING_PART_NUMBERS: [&str; 5] = ["n/a", "na", "none", "unknown", "not found"];

/// Quality issue detected in an identification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    /// Part name blank or contains "unknown"
    GenericName,
    /// No usable part number
    MissingPartNumber,
    /// Description shorter than the policy minimum
    BriefDescription,
    /// Description contains "generic"
    GenericDescription,
}

impl QualityIssue {
    /// Confidence deduction for this issue
    pub fn deduction(&self) -> f32 {
        match self {
            QualityIssue::GenericName => 0.4,
            QualityIssue::MissingPartNumber => 0.3,
            QualityIssue::BriefDescription => 0.2,
            QualityIssue::GenericDescription => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssue::GenericName => "Generic or unknown part name",
            QualityIssue::MissingPartNumber => "No part number identified",
            QualityIssue::BriefDescription => "Description too brief",
            QualityIssue::GenericDescription => "Generic description",
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one raw identification
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub issues: Vec<QualityIssue>,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Confidence is below the fallback threshold
    pub needs_fallback: bool,
}

/// Tunable scoring thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    /// Confidence below this recommends fallback (default 0.7)
    pub fallback_threshold: f32,
    /// Shorter descriptions are flagged as too brief (default 20)
    pub min_description_len: usize,
    /// Confidence at or above this is reported as "high" (default 0.85)
    pub high_confidence: f32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            fallback_threshold: 0.7,
            min_description_len: 20,
            high_confidence: 0.85,
        }
    }
}

impl ScoringPolicy {
    /// Create policy with custom threshold, clamped to [0, 1]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.fallback_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// List quality issues for a raw identification
    pub fn detect_issues(&self, raw: &RawIdentification) -> Vec<QualityIssue> {
        let mut issues = Vec::new();

        if is_unknown_name(&raw.part_name) {
            issues.push(QualityIssue::GenericName);
        }

        if !has_part_number(raw.part_number.as_deref()) {
            issues.push(QualityIssue::MissingPartNumber);
        }

        if raw.description.trim().chars().count() < self.min_description_len {
            issues.push(QualityIssue::BriefDescription);
        }

        if raw.description.to_lowercase().contains("generic") {
            issues.push(QualityIssue::GenericDescription);
        }

        issues
    }

    /// Evaluate a raw identification
    ///
    /// With `scoring_enabled` off, issues are still listed but confidence is
    /// reported as 1.0.
    pub fn assess(&self, raw: &RawIdentification, scoring_enabled: bool) -> Assessment {
        let issues = self.detect_issues(raw);

        let confidence = if scoring_enabled {
            let deducted: f32 = issues.iter().map(QualityIssue::deduction).sum();
            (1.0 - deducted).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Assessment {
            needs_fallback: confidence < self.fallback_threshold,
            issues,
            confidence,
        }
    }

    /// Band a confidence score for display
    pub fn confidence_level(&self, confidence: f32) -> ConfidenceLevel {
        if confidence >= self.high_confidence {
            ConfidenceLevel::High
        } else if confidence >= self.fallback_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// Build the scored result for a raw identification
    pub fn build_result(
        &self,
        raw: RawIdentification,
        assessment: &Assessment,
        method: IdentificationMethod,
        source: &str,
    ) -> IdentificationResult {
        let part_number = raw.part_number.filter(|n| has_part_number(Some(n)));

        IdentificationResult {
            part_name: if raw.part_name.trim().is_empty() {
                "Unknown Part".to_string()
            } else {
                raw.part_name
            },
            part_number,
            category: raw.category,
            condition: raw.condition,
            description: raw.description,
            compatible_vehicles: raw.compatibility,
            brand: raw.brand.filter(|b| !b.trim().is_empty()),
            confidence_score: assessment.confidence,
            method_used: method,
            issues: assessment.issues.iter().map(ToString::to_string).collect(),
            needs_fallback: assessment.needs_fallback,
            source: source.to_string(),
            refined_prompt: false,
            timestamp: Utc::now(),
        }
    }

    /// Suggested next steps for the user
    pub fn suggested_actions(&self, result: &IdentificationResult) -> Vec<String> {
        let mut actions = Vec::new();

        if result.confidence_score < self.fallback_threshold {
            actions.push("Try enhanced analysis for better accuracy".to_string());
        }

        if result.part_number.is_none() {
            actions.push("Manual part number entry recommended".to_string());
        }

        if result.part_name.to_lowercase().contains("unknown") {
            actions.push("Consider using browser fallback for difficult parts".to_string());
        }

        if actions.is_empty() {
            actions.push("Result looks good - proceed with listing".to_string());
        }

        actions
    }
}

fn is_unknown_name(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    name.is_empty() || name.contains("unknown")
}

fn has_part_number(part_number: Option<&str>) -> bool {
    match part_number.map(|n| n.trim().to_lowercase()) {
        Some(n) => !n.is_empty() && !MISSING_PART_NUMBERS.contains(&n.as_str()),
        None => false,
    }
}

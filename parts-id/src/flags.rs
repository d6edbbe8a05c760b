//! Feature flag store
//!
//! Named boolean toggles that gate optional code paths. The store is an
//! explicit handle passed to the orchestrator and handlers; it lives in
//! process memory only.
//!
//! Writes take the lock exclusively, so a toggle is visible to the very next
//! read.

use parts_common::config::env_bool;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Browser automation (or secondary provider) fallback path
pub const ENABLE_BROWSER_FALLBACK: &str = "enable_browser_fallback";
/// Run the fallback automatically on low confidence
pub const ENABLE_AUTO_FALLBACK: &str = "enable_auto_fallback";
/// Issue-focused re-prompt of the primary identifier
pub const ENABLE_ENHANCED_PROMPTS: &str = "enable_enhanced_prompts";
/// Deduct confidence per detected issue
pub const ENABLE_CONFIDENCE_SCORING: &str = "enable_confidence_scoring";
/// Front end shows fallback controls
pub const ENABLE_FALLBACK_UI: &str = "enable_fallback_ui";
/// Log raw model replies at info level
pub const ENABLE_DEBUG_LOGGING: &str = "enable_debug_logging";

/// Known flags: (name, environment variable, default)
const FLAG_DEFAULTS: [(&str, &str, bool); 6] = [
    (ENABLE_BROWSER_FALLBACK, "ENABLE_BROWSER_FALLBACK", false),
    (ENABLE_AUTO_FALLBACK, "ENABLE_AUTO_FALLBACK", false),
    (ENABLE_ENHANCED_PROMPTS, "ENABLE_ENHANCED_PROMPTS", true),
    (ENABLE_CONFIDENCE_SCORING, "ENABLE_CONFIDENCE_SCORING", true),
    (ENABLE_FALLBACK_UI, "ENABLE_FALLBACK_UI", true),
    (ENABLE_DEBUG_LOGGING, "ENABLE_DEBUG_LOGGING", false),
];

/// Flag store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("Feature flag '{0}' not found")]
    NotFound(String),
}

/// Point-in-time copy of every flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FlagSnapshot(BTreeMap<String, bool>);

impl FlagSnapshot {
    /// Unknown names read as disabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, enabled)| (name.as_str(), *enabled))
    }
}

/// Shared feature flag store
#[derive(Debug, Clone)]
pub struct FeatureFlags {
    inner: Arc<RwLock<BTreeMap<String, bool>>>,
}

impl FeatureFlags {
    /// Store with compiled defaults
    pub fn with_defaults() -> Self {
        Self::from_entries(FLAG_DEFAULTS.iter().map(|(name, _, default)| (*name, *default)))
    }

    /// Store with compiled defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::from_entries(
            FLAG_DEFAULTS
                .iter()
                .map(|(name, env_key, default)| (*name, env_bool(env_key, *default))),
        )
    }

    /// Store containing exactly the given flags
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        let flags = entries
            .into_iter()
            .map(|(name, enabled)| (name.to_string(), enabled))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(flags)),
        }
    }

    /// Override one known flag, builder style
    ///
    /// Applies only while this is the sole handle to the store. Once the store
    /// has been cloned, use [`FeatureFlags::set`].
    pub fn with_flag(mut self, name: &str, enabled: bool) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(lock) => {
                if let Some(value) = lock.get_mut().get_mut(name) {
                    *value = enabled;
                }
            }
            None => warn!(flag = name, "Flag store already shared; with_flag ignored"),
        }
        self
    }

    pub async fn snapshot(&self) -> FlagSnapshot {
        FlagSnapshot(self.inner.read().await.clone())
    }

    /// Set a known flag
    ///
    /// # Errors
    /// `FlagError::NotFound` for unknown names; the store is left unchanged.
    pub async fn set(&self, name: &str, enabled: bool) -> Result<(), FlagError> {
        let mut flags = self.inner.write().await;
        let Some(value) = flags.get_mut(name) else {
            return Err(FlagError::NotFound(name.to_string()));
        };

        let previous = std::mem::replace(value, enabled);
        info!(flag = name, previous, enabled, "Feature flag updated");
        Ok(())
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults() {
        let flags = FeatureFlags::with_defaults().snapshot().await;

        assert!(!flags.is_enabled(ENABLE_BROWSER_FALLBACK));
        assert!(!flags.is_enabled(ENABLE_AUTO_FALLBACK));
        assert!(flags.is_enabled(ENABLE_ENHANCED_PROMPTS));
        assert!(flags.is_enabled(ENABLE_CONFIDENCE_SCORING));
        assert!(flags.is_enabled(ENABLE_FALLBACK_UI));
        assert!(!flags.is_enabled(ENABLE_DEBUG_LOGGING));
        assert_eq!(flags.iter().count(), 6);
    }

    #[tokio::test]
    async fn test_set_is_visible_immediately() {
        let flags = FeatureFlags::with_defaults();
        let reader = flags.clone();

        flags.set(ENABLE_FALLBACK_UI, false).await.unwrap();
        assert!(!reader.snapshot().await.is_enabled(ENABLE_FALLBACK_UI));

        flags.set(ENABLE_FALLBACK_UI, true).await.unwrap();
        assert!(reader.snapshot().await.is_enabled(ENABLE_FALLBACK_UI));
    }

    #[tokio::test]
    async fn test_unknown_flag_leaves_store_unchanged() {
        let flags = FeatureFlags::with_defaults();
        let before = flags.snapshot().await;

        let err = flags.set("not_a_flag", true).await.unwrap_err();
        assert_eq!(err, FlagError::NotFound("not_a_flag".to_string()));
        let after = flags.snapshot().await;
        assert_eq!(after, before);
        assert!(!after.is_enabled("not_a_flag"));
    }

    #[tokio::test]
    async fn test_with_flag_ignores_unknown() {
        let flags = FeatureFlags::with_defaults()
            .with_flag(ENABLE_BROWSER_FALLBACK, true)
            .with_flag("made_up", true);

        let snapshot = flags.snapshot().await;
        assert!(snapshot.is_enabled(ENABLE_BROWSER_FALLBACK));
        assert!(!snapshot.is_enabled("made_up"));
    }

    #[tokio::test]
    async fn test_with_flag_on_shared_store_is_ignored() {
        let flags = FeatureFlags::with_defaults();
        let reader = flags.clone();

        let flags = flags.with_flag(ENABLE_AUTO_FALLBACK, true);
        assert!(!flags.snapshot().await.is_enabled(ENABLE_AUTO_FALLBACK));
        assert!(!reader.snapshot().await.is_enabled(ENABLE_AUTO_FALLBACK));
    }

    #[test]
    fn test_snapshot_serializes_as_map() {
        let flags = FeatureFlags::from_entries([("a", true), ("b", false)]);
        let snapshot = flags.inner.try_read().map(|m| FlagSnapshot(m.clone())).unwrap();
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            serde_json::json!({"a": true, "b": false})
        );
    }
}

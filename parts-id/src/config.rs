//! Configuration resolution for parts-id
//!
//! Each setting resolves with CLI → ENV → TOML → compiled default priority.
//! CLI and ENV for the server address and provider are handled by clap in
//! `main`; the remaining ENV lookups happen here.

use crate::identifiers::gemini::{DEFAULT_GEMINI_MODEL, GEMINI_BASE_URL};
use crate::identifiers::openai::{DEFAULT_OPENAI_MODEL, OPENAI_BASE_URL};
use crate::scoring::ScoringPolicy;
use parts_common::config::{env_parse, env_string, is_valid_key, parse_bool, TomlConfig};
use parts_common::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// Default listen host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Image extensions accepted by the upload endpoint
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Primary vision provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(Error::Config(format!(
                "Unknown primary provider '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
        }
    }
}

/// Vision provider credentials and models
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub primary: Provider,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            primary: Provider::Gemini,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
        }
    }
}

/// Fallback identification settings
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackSettings {
    /// External automation command; image paths are appended as arguments
    ///
    /// `FALLBACK_COMMAND` is split on whitespace with no quote handling. An
    /// argument containing spaces must be given through the TOML
    /// `[fallback] command` array instead.
    pub command: Option<Vec<String>>,
    /// Use the non-primary vision provider when no command is configured
    pub use_secondary_provider: bool,
    /// Hard deadline for one fallback run
    pub timeout: Duration,
    /// Runs allowed per UTC day (0 = unlimited)
    pub max_daily: u32,
    /// Minimum gap between runs
    pub cooldown: Duration,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            command: None,
            use_secondary_provider: true,
            timeout: Duration::from_secs(90),
            max_daily: 10,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Upload intake limits
#[derive(Debug, Clone, PartialEq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_body_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_files: 24,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl UploadLimits {
    /// Accept only known image extensions (case-insensitive)
    pub fn is_allowed_file(&self, file_name: &str) -> bool {
        extension_of(file_name)
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

/// MIME type for an image file name, defaulting to JPEG
pub fn content_type_for(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Values supplied on the command line (or their clap-bound ENV variables)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub provider: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
    pub providers: ProviderSettings,
    pub scoring: ScoringPolicy,
    pub fallback: FallbackSettings,
    pub upload: UploadLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            providers: ProviderSettings::default(),
            scoring: ScoringPolicy::default(),
            fallback: FallbackSettings::default(),
            upload: UploadLimits::default(),
        }
    }
}

impl ServiceConfig {
    /// Resolve configuration from CLI, environment and TOML
    ///
    /// # Errors
    /// `Error::Config` for an unknown provider or out-of-range threshold.
    pub fn resolve(cli: &CliOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = ServiceConfig::default();

        let provider_name = cli
            .provider
            .clone()
            .or_else(|| toml.primary_provider.clone());
        let primary = match provider_name {
            Some(name) => Provider::parse(&name)?,
            None => Provider::default(),
        };

        let providers = ProviderSettings {
            primary,
            gemini_api_key: env_string("GEMINI_API_KEY")
                .or_else(|| env_string("GOOGLE_API_KEY"))
                .or_else(|| valid_key(&toml.gemini_api_key)),
            gemini_model: env_string("GEMINI_MODEL")
                .or_else(|| toml.gemini_model.clone())
                .unwrap_or(defaults.providers.gemini_model),
            gemini_base_url: toml
                .gemini_base_url
                .clone()
                .unwrap_or(defaults.providers.gemini_base_url),
            openai_api_key: env_string("OPENAI_API_KEY").or_else(|| valid_key(&toml.openai_api_key)),
            openai_model: env_string("OPENAI_MODEL")
                .or_else(|| toml.openai_model.clone())
                .unwrap_or(defaults.providers.openai_model),
            openai_base_url: toml
                .openai_base_url
                .clone()
                .unwrap_or(defaults.providers.openai_base_url),
        };

        let threshold = env_parse::<f32>("FALLBACK_THRESHOLD")
            .or(toml.scoring.fallback_threshold)
            .unwrap_or(defaults.scoring.fallback_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "fallback_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        let scoring = ScoringPolicy {
            fallback_threshold: threshold,
            min_description_len: env_parse("MIN_DESCRIPTION_LENGTH")
                .or(toml.scoring.min_description_len)
                .unwrap_or(defaults.scoring.min_description_len),
            ..defaults.scoring
        };

        // Whitespace split only; quoted arguments are not supported here
        let command = env_string("FALLBACK_COMMAND")
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .or_else(|| toml.fallback.command.clone())
            .filter(|cmd| !cmd.is_empty());
        let fallback = FallbackSettings {
            command,
            use_secondary_provider: env_string("FALLBACK_USE_SECONDARY_PROVIDER")
                .map(|v| parse_bool(&v))
                .or(toml.fallback.use_secondary_provider)
                .unwrap_or(defaults.fallback.use_secondary_provider),
            timeout: env_parse::<u64>("FALLBACK_TIMEOUT_SECS")
                .or(toml.fallback.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fallback.timeout),
            max_daily: env_parse("BROWSER_FALLBACK_MAX_DAILY")
                .or(toml.fallback.max_daily)
                .unwrap_or(defaults.fallback.max_daily),
            cooldown: env_parse::<u64>("BROWSER_FALLBACK_DELAY")
                .or(toml.fallback.cooldown_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fallback.cooldown),
        };

        let upload = UploadLimits {
            max_files: env_parse("MAX_UPLOAD_FILES")
                .or(toml.upload.max_files)
                .unwrap_or(defaults.upload.max_files),
            max_body_bytes: env_parse("MAX_UPLOAD_BYTES")
                .or(toml.upload.max_body_bytes)
                .unwrap_or(defaults.upload.max_body_bytes),
        };

        Ok(Self {
            host: cli
                .host
                .clone()
                .or_else(|| toml.server.host.clone())
                .unwrap_or(defaults.host),
            port: cli.port.or(toml.server.port).unwrap_or(defaults.port),
            log_level: toml.logging.level.clone().unwrap_or(defaults.log_level),
            providers,
            scoring,
            fallback,
            upload,
        })
    }

    /// Log the resolved configuration with secrets redacted
    pub fn log_summary(&self) {
        info!(
            host = %self.host,
            port = self.port,
            primary_provider = self.providers.primary.as_str(),
            gemini_key = if self.providers.gemini_api_key.is_some() { "set" } else { "not set" },
            openai_key = if self.providers.openai_api_key.is_some() { "set" } else { "not set" },
            "Service configuration resolved"
        );
        info!(
            fallback_threshold = self.scoring.fallback_threshold,
            min_description_len = self.scoring.min_description_len,
            fallback_command = ?self.fallback.command,
            fallback_timeout_secs = self.fallback.timeout.as_secs(),
            fallback_max_daily = self.fallback.max_daily,
            fallback_cooldown_secs = self.fallback.cooldown.as_secs(),
            max_upload_files = self.upload.max_files,
            "Identification policy"
        );
    }
}

fn valid_key(key: &Option<String>) -> Option<String> {
    key.as_ref().filter(|k| is_valid_key(k)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("Gemini").unwrap(), Provider::Gemini);
        assert_eq!(Provider::parse(" openai ").unwrap(), Provider::OpenAi);
        assert!(matches!(Provider::parse("claude"), Err(Error::Config(_))));
    }

    #[test]
    fn test_allowed_files() {
        let limits = UploadLimits::default();
        assert!(limits.is_allowed_file("caliper.JPG"));
        assert!(limits.is_allowed_file("label.webp"));
        assert!(!limits.is_allowed_file("notes.txt"));
        assert!(!limits.is_allowed_file("no_extension"));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.PNG"), "image/png");
        assert_eq!(content_type_for("a.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("a"), "image/jpeg");
    }
}

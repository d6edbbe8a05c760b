//! Configuration loading and config file resolution
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is never an error: the service logs a warning and
//! starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PARTS_CONFIG";

/// Values accepted as `true` for boolean environment variables
const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];

/// Logging section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset (e.g. "info")
    pub level: Option<String>,
}

/// Server section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Confidence scoring section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    /// Confidence below which fallback is recommended
    pub fallback_threshold: Option<f32>,
    /// Descriptions shorter than this are flagged as too brief
    pub min_description_len: Option<usize>,
}

/// Fallback identification section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    /// External automation command; first element is the program
    pub command: Option<Vec<String>>,
    /// Use the secondary vision provider as the fallback path
    pub use_secondary_provider: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub max_daily: Option<u32>,
    pub cooldown_secs: Option<u64>,
}

/// Upload limits section of the TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    pub max_files: Option<usize>,
    pub max_body_bytes: Option<usize>,
}

/// TOML configuration file contents
///
/// Every field is optional so partial files (or no file at all) are valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub primary_provider: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Locate the config file for a service
///
/// Order: explicit path → `PARTS_CONFIG` → user config dir → `/etc/parts`.
/// Returns `None` when no candidate exists.
pub fn resolve_config_path(explicit: Option<&Path>, file_name: &str) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("parts").join(file_name));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    let system_config = PathBuf::from("/etc/parts").join(file_name);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Load a TOML config file
///
/// Missing file → defaults with a warning. Unreadable or malformed file → error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file not found: {} (using defaults)", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    debug!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Parse a boolean the way the environment flags are written
pub fn parse_bool(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_ascii_lowercase().as_str())
}

/// Read a boolean environment variable, falling back to `default` when unset
pub fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => parse_bool(&value),
        Err(_) => default,
    }
}

/// Read and parse an environment variable
///
/// Unset → `None`. Unparseable values are ignored with a warning.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring unparseable value for {}: {:?}", key, value);
            None
        }
    }
}

/// Read a non-blank string environment variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| is_valid_key(v))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

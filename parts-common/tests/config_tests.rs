//! Unit tests for configuration loading and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate PARTS_CONFIG or flag variables are marked with #[serial].

use parts_common::config::{
    env_bool, env_parse, load_toml_config, resolve_config_path, TomlConfig, CONFIG_PATH_ENV,
};
use parts_common::Error;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_missing_file_yields_defaults() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("does-not-exist.toml");

    let config = load_toml_config(&path).expect("missing file must not fail");
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_full_file_loads() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("parts-id.toml");
    std::fs::write(
        &path,
        r#"
primary_provider = "openai"
openai_api_key = "sk-test"

[server]
host = "0.0.0.0"
port = 9000

[logging]
level = "debug"

[scoring]
fallback_threshold = 0.55
min_description_len = 10

[fallback]
command = ["node", "automate.js"]
timeout_secs = 45
max_daily = 4
cooldown_secs = 0

[upload]
max_files = 6
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.primary_provider.as_deref(), Some("openai"));
    assert_eq!(config.server.port, Some(9000));
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
    assert_eq!(config.scoring.fallback_threshold, Some(0.55));
    assert_eq!(
        config.fallback.command,
        Some(vec!["node".to_string(), "automate.js".to_string()])
    );
    assert_eq!(config.fallback.timeout_secs, Some(45));
    assert_eq!(config.upload.max_files, Some(6));
    assert!(config.upload.max_body_bytes.is_none());
}

#[test]
fn test_malformed_file_is_config_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = ").unwrap();

    match load_toml_config(&path) {
        Err(Error::Config(msg)) => assert!(msg.contains("Parse TOML failed")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_env_config_path() {
    env::set_var(CONFIG_PATH_ENV, "/tmp/parts-env.toml");
    let resolved = resolve_config_path(None, "parts-id.toml");
    env::remove_var(CONFIG_PATH_ENV);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/parts-env.toml")));
}

#[test]
#[serial]
fn test_env_bool_and_parse() {
    env::set_var("PARTS_TEST_FLAG", "yes");
    env::set_var("PARTS_TEST_NUM", "not-a-number");
    env::set_var("PARTS_TEST_NUM2", " 12 ");

    assert!(env_bool("PARTS_TEST_FLAG", false));
    assert!(env_bool("PARTS_TEST_UNSET_FLAG", true));
    assert_eq!(env_parse::<u32>("PARTS_TEST_NUM"), None);
    assert_eq!(env_parse::<u32>("PARTS_TEST_NUM2"), Some(12));

    env::remove_var("PARTS_TEST_FLAG");
    env::remove_var("PARTS_TEST_NUM");
    env::remove_var("PARTS_TEST_NUM2");
}

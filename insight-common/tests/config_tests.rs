//! Config resolution tests
//!
//! These mutate process environment variables, so every test is serialized.

use insight_common::config::{
    load_config, read_toml_config, resolve_config_path, write_toml_config, ConfigSource,
    PeriodGranularity, TomlConfig, API_KEY_ENV_VAR, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::path::PathBuf;

fn clear_env() {
    std::env::remove_var(CONFIG_ENV_VAR);
    std::env::remove_var(API_KEY_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_path_beats_env() {
    clear_env();
    std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let source = resolve_config_path(Some(&PathBuf::from("/tmp/from-cli.toml")));
    assert_eq!(source, ConfigSource::CommandLine(PathBuf::from("/tmp/from-cli.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    clear_env();
    std::env::set_var(CONFIG_ENV_VAR, "/tmp/from-env.toml");

    let source = resolve_config_path(None);
    assert_eq!(source, ConfigSource::Environment(PathBuf::from("/tmp/from-env.toml")));

    clear_env();
}

#[test]
#[serial]
fn test_missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let (config, source) = load_config(Some(&missing)).unwrap();
    assert_eq!(source, ConfigSource::CommandLine(missing));
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_malformed_file_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[pipeline\nworkers = ").unwrap();

    assert!(load_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_invalid_settings_are_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.toml");
    std::fs::write(&path, "[pipeline]\nworkers = 0\n").unwrap();

    let err = load_config(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("workers"));
}

#[test]
#[serial]
fn test_api_key_env_overrides_file() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("key.toml");
    std::fs::write(&path, "[pipeline.analysis]\napi_key = \"from-file\"\n").unwrap();
    std::env::set_var(API_KEY_ENV_VAR, "from-env");

    let (config, _) = load_config(Some(&path)).unwrap();
    assert_eq!(config.pipeline.analysis.api_key.as_deref(), Some("from-env"));

    clear_env();
}

#[test]
#[serial]
fn test_write_then_read_preserves_settings() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = TomlConfig::default();
    config.checkpoint_db = Some(dir.path().join("checkpoints.db"));
    config.pipeline.workers = 2;
    config.pipeline.synthesis.period = PeriodGranularity::Quarter;

    write_toml_config(&config, &path).unwrap();
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded = read_toml_config(&path).unwrap();
    assert_eq!(loaded, config);
}

//! Configuration resolution tests
//!
//! Priority order: CLI override > environment > TOML file > compiled default.
//! Tests that touch process environment variables are `#[serial]`.

use retiscan_common::config::{
    load_toml_config, AppConfig, BackendMode, CompiledDefaults, Overrides, TomlConfig,
    ENV_BACKEND_MODE, ENV_PREDICT_URL, ENV_ROOT_FOLDER,
};
use serial_test::serial;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_map(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_when_nothing_configured() {
    let config = AppConfig::resolve_with(&Overrides::default(), no_env, TomlConfig::default()).unwrap();
    let defaults = CompiledDefaults::for_current_platform();

    assert_eq!(config.root_folder, defaults.root_folder);
    assert_eq!(config.prediction.base_url, "http://127.0.0.1:5000");
    assert_eq!(config.prediction.timeout, Duration::from_secs(60));
    assert_eq!(config.backend.mode, BackendMode::Local);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.max_image_bytes, 20 * 1024 * 1024);
}

#[test]
fn test_toml_values_used() {
    let toml: TomlConfig = toml::from_str(
        r#"
        root_folder = "/srv/retiscan"

        [prediction]
        base_url = "http://model.internal:5000/"
        timeout_secs = 15

        [logging]
        level = "debug"

        [upload]
        max_image_bytes = 1024
        "#,
    )
    .unwrap();

    let config = AppConfig::resolve_with(&Overrides::default(), no_env, toml).unwrap();
    assert_eq!(config.root_folder, PathBuf::from("/srv/retiscan"));
    assert_eq!(config.prediction.base_url, "http://model.internal:5000");
    assert_eq!(config.prediction.timeout, Duration::from_secs(15));
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.max_image_bytes, 1024);
}

#[test]
fn test_zero_timeout_falls_back_to_default() {
    let toml: TomlConfig = toml::from_str("[prediction]\ntimeout_secs = 0\n").unwrap();

    let config = AppConfig::resolve_with(&Overrides::default(), no_env, toml).unwrap();
    assert_eq!(config.prediction.timeout, Duration::from_secs(60));
}

#[test]
fn test_env_beats_toml_and_cli_beats_env() {
    let mut toml = TomlConfig::default();
    toml.prediction.base_url = Some("http://from-toml".to_string());

    let env = env_map(&[(ENV_PREDICT_URL, "http://from-env")]);
    let config = AppConfig::resolve_with(&Overrides::default(), &env, toml.clone()).unwrap();
    assert_eq!(config.prediction.base_url, "http://from-env");

    let overrides = Overrides {
        predict_url: Some("http://from-cli".to_string()),
        ..Default::default()
    };
    let config = AppConfig::resolve_with(&overrides, &env, toml).unwrap();
    assert_eq!(config.prediction.base_url, "http://from-cli");
}

#[test]
fn test_blank_env_value_ignored() {
    let env = env_map(&[(ENV_PREDICT_URL, "   ")]);
    let config = AppConfig::resolve_with(&Overrides::default(), env, TomlConfig::default()).unwrap();
    assert_eq!(config.prediction.base_url, "http://127.0.0.1:5000");
}

#[test]
fn test_hosted_mode_requires_url_and_key() {
    let env = env_map(&[(ENV_BACKEND_MODE, "hosted")]);
    let result = AppConfig::resolve_with(&Overrides::default(), env, TomlConfig::default());
    assert!(result.is_err());

    let mut toml = TomlConfig::default();
    toml.backend.mode = Some(BackendMode::Hosted);
    toml.backend.url = Some("https://project.example.co/".to_string());
    let result = AppConfig::resolve_with(&Overrides::default(), no_env, toml.clone());
    assert!(result.is_err(), "missing anon key must be rejected");

    toml.backend.anon_key = Some("anon".to_string());
    let config = AppConfig::resolve_with(&Overrides::default(), no_env, toml).unwrap();
    assert_eq!(config.backend.mode, BackendMode::Hosted);
    assert_eq!(config.backend.url.as_deref(), Some("https://project.example.co"));
}

#[test]
fn test_invalid_mode_in_env_rejected() {
    let env = env_map(&[(ENV_BACKEND_MODE, "cloud")]);
    assert!(AppConfig::resolve_with(&Overrides::default(), env, TomlConfig::default()).is_err());
}

#[test]
fn test_paths_under_root_folder() {
    let overrides = Overrides {
        root_folder: Some(PathBuf::from("/tmp/retiscan-paths")),
        ..Default::default()
    };
    let config = AppConfig::resolve_with(&overrides, no_env, TomlConfig::default()).unwrap();
    assert_eq!(config.database_path(), PathBuf::from("/tmp/retiscan-paths/retiscan.db"));
    assert_eq!(config.session_path(), PathBuf::from("/tmp/retiscan-paths/session.json"));
}

#[test]
fn test_missing_toml_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_malformed_toml_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[prediction\nbase_url = ").unwrap();
    assert!(load_toml_config(&path).is_err());
}

#[test]
#[serial]
fn test_resolve_reads_process_env() {
    let dir = tempfile::tempdir().unwrap();
    env::set_var(ENV_ROOT_FOLDER, dir.path());

    let overrides = Overrides {
        config_path: Some(dir.path().join("none.toml")),
        ..Default::default()
    };
    let config = AppConfig::resolve(&overrides).unwrap();
    assert_eq!(config.root_folder, dir.path());

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_resolve_survives_malformed_config_file() {
    env::remove_var(ENV_ROOT_FOLDER);
    env::remove_var(ENV_BACKEND_MODE);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "not = [valid").unwrap();

    let overrides = Overrides { config_path: Some(path), ..Default::default() };
    assert!(AppConfig::resolve(&overrides).is_ok());
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");
    let overrides = Overrides { root_folder: Some(root.clone()), ..Default::default() };
    let config = AppConfig::resolve_with(&overrides, no_env, TomlConfig::default()).unwrap();

    config.ensure_root_folder().unwrap();
    assert!(root.is_dir());
}

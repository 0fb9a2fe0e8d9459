/// Integration tests for the configuration system
///
/// These tests verify that configuration loads correctly from files and
/// environment variables.

use kiln_env::config::{Config, ConfigLoader, ConfigSource};
use kiln_env::solver::ChannelPriority;
use kiln_env::EnvError;
use std::env;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.channel_alias.as_str(), "https://conda.anaconda.org/");
    assert_eq!(config.default_channels, vec!["conda-forge"]);
    assert_eq!(config.solve_timeout_duration(), None);
    assert_eq!(config.channel_priority, ChannelPriority::Disabled);
    assert!(config.keep_explicit);
}

#[test]
fn test_config_loader_env_disabled() {
    let loader = ConfigLoader::new(false);

    assert_eq!(loader.get_kiln_env("KILN_HOME"), None);
    assert_eq!(loader.get_env_config("solve-timeout"), None);
}

#[test]
fn test_load_empty_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("config.json");
    fs::write(&config_file, "{}").unwrap();

    let loader = ConfigLoader::new(false);
    let raw = loader.load_config_file(&config_file).unwrap();
    assert!(raw.values.is_empty());
}

#[test]
fn test_load_invalid_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("config.json");
    fs::write(&config_file, "{ not json").unwrap();

    let loader = ConfigLoader::new(false);
    let err = loader.load_config_file(&config_file).unwrap_err();
    assert!(matches!(err, EnvError::Config(_)));
}

#[test]
fn test_build_config_with_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("kiln.json");
    fs::write(
        &config_file,
        r#"{
            "channel-alias": "https://mirror.example.org/conda/",
            "default-channels": ["main"],
            "solve-timeout": 5,
            "channel-priority": "strict",
            "virtual-package-overrides": {"cuda": "12.2"}
        }"#,
    )
    .unwrap();

    let config = Config::build(Some(&config_file), false).unwrap();

    assert_eq!(config.channel_alias.as_str(), "https://mirror.example.org/conda/");
    assert_eq!(config.default_channels, vec!["main"]);
    assert_eq!(config.solve_timeout_duration(), Some(Duration::from_secs(5)));
    assert_eq!(config.channel_priority, ChannelPriority::Strict);
    assert_eq!(config.virtual_package_overrides.get("cuda").map(String::as_str), Some("12.2"));
    assert_eq!(
        config.get_source("solve-timeout"),
        Some(&ConfigSource::File(config_file.clone()))
    );
    assert_eq!(config.get_source("keep-explicit"), Some(&ConfigSource::Default));
}

#[test]
fn test_build_config_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = Config::build(Some(temp_dir.path().join("missing.json")), false).unwrap_err();
    assert!(matches!(err, EnvError::Config(_)));
}

#[test]
fn test_config_env_overrides() {
    let home = TempDir::new().unwrap();
    fs::write(
        home.path().join("config.json"),
        r#"{"solve-timeout": 10, "keep-explicit": false}"#,
    )
    .unwrap();

    env::set_var("KILN_HOME", home.path());
    env::set_var("KILN_SOLVE_TIMEOUT", "60");
    env::set_var("KILN_CHANNEL_PRIORITY", "strict");
    env::set_var("KILN_OVERRIDE_GLIBC", "2.17");

    let config = Config::build(None::<&str>, true).unwrap();

    env::remove_var("KILN_HOME");
    env::remove_var("KILN_SOLVE_TIMEOUT");
    env::remove_var("KILN_CHANNEL_PRIORITY");
    env::remove_var("KILN_OVERRIDE_GLIBC");

    // Environment beats the global file, the global file beats defaults
    assert_eq!(config.solve_timeout, Some(60));
    assert!(!config.keep_explicit);
    assert_eq!(config.channel_priority, ChannelPriority::Strict);
    assert_eq!(config.virtual_package_overrides.get("glibc").map(String::as_str), Some("2.17"));
    assert_eq!(
        config.get_source("solve-timeout"),
        Some(&ConfigSource::Environment("KILN_SOLVE_TIMEOUT".to_string()))
    );
    assert_eq!(config.get_source("keep-explicit"), Some(&ConfigSource::Global));
}

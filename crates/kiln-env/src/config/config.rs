use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::source::{env_var_name, ConfigLoader, ConfigSource, RawConfig};
use crate::error::{EnvError, Result};
use crate::package::DEFAULT_CHANNEL_ALIAS;
use crate::solver::{ChannelPriority, Policy};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Base URL bare channel names resolve against
    #[serde(default = "default_channel_alias")]
    pub channel_alias: Url,

    /// Channels used when a request names none
    #[serde(default = "default_channels")]
    pub default_channels: Vec<String>,

    /// Seconds a solve may run before it is cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve_timeout: Option<u64>,

    #[serde(default)]
    pub channel_priority: ChannelPriority,

    /// Keep explicitly installed packages a request does not mention
    #[serde(default = "default_true")]
    pub keep_explicit: bool,

    /// Virtual package versions by name without the `__` prefix
    #[serde(default)]
    pub virtual_package_overrides: IndexMap<String, String>,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

lazy_static! {
    static ref DEFAULT_ALIAS: Url = Url::parse(DEFAULT_CHANNEL_ALIAS).unwrap();
}

fn default_channel_alias() -> Url {
    DEFAULT_ALIAS.clone()
}

fn default_channels() -> Vec<String> {
    vec!["conda-forge".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_alias: default_channel_alias(),
            default_channels: default_channels(),
            solve_timeout: None,
            channel_priority: ChannelPriority::default(),
            keep_explicit: true,
            virtual_package_overrides: IndexMap::new(),
            sources: HashMap::new(),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from all sources (defaults, global, file, env)
    pub fn build<P: AsRef<Path>>(config_file: Option<P>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let mut config = Self::default();

        for key in config.config_keys() {
            config.sources.insert(key, ConfigSource::Default);
        }

        // 1. Global config from <kiln home>/config.json
        let global_config = loader.load_global_config()?;
        config.merge_raw_config(global_config, ConfigSource::Global)?;

        // 2. Explicit config file
        if let Some(path) = &config_file {
            let path = path.as_ref();
            if !path.exists() {
                return Err(EnvError::Config(format!("Config file {} does not exist", path.display())));
            }
            let file_config = loader.load_config_file(path)?;
            config.merge_raw_config(file_config, ConfigSource::File(path.to_path_buf()))?;
        }

        // 3. Environment variable overrides
        if use_environment {
            config.apply_env_overrides(&loader)?;
        }

        log::debug!(
            "Configuration: alias {}, channels {:?}, priority {}",
            config.channel_alias,
            config.default_channels,
            config.channel_priority.as_str()
        );
        Ok(config)
    }

    /// Get the source of a configuration value
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// The solver policy this configuration selects
    pub fn policy(&self) -> Policy {
        Policy::new().channel_priority(self.channel_priority)
    }

    pub fn solve_timeout_duration(&self) -> Option<Duration> {
        self.solve_timeout.map(Duration::from_secs)
    }

    /// Merge raw configuration from a source
    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<()> {
        for (key, value) in raw.values {
            self.merge_config_value(&key, value, source.clone())?;
        }
        Ok(())
    }

    /// Merge a single configuration value
    fn merge_config_value(&mut self, key: &str, value: serde_json::Value, source: ConfigSource) -> Result<()> {
        match key {
            "channel-alias" => {
                if let Some(s) = value.as_str() {
                    self.channel_alias = parse_alias(s)?;
                    self.sources.insert(key.to_string(), source);
                }
            }
            "default-channels" => {
                if let Some(arr) = value.as_array() {
                    self.default_channels = arr
                        .iter()
                        .filter_map(|v| v.as_str().map(String::from))
                        .collect();
                    self.sources.insert(key.to_string(), source);
                }
            }
            "solve-timeout" => {
                if value.is_null() {
                    self.solve_timeout = None;
                    self.sources.insert(key.to_string(), source);
                } else if let Some(n) = value.as_u64() {
                    self.solve_timeout = Some(n);
                    self.sources.insert(key.to_string(), source);
                }
            }
            "channel-priority" => {
                if let Some(s) = value.as_str() {
                    self.channel_priority = parse_priority(s)?;
                    self.sources.insert(key.to_string(), source);
                }
            }
            "keep-explicit" => {
                if let Some(b) = value.as_bool() {
                    self.keep_explicit = b;
                    self.sources.insert(key.to_string(), source);
                }
            }
            "virtual-package-overrides" => {
                if let Some(obj) = value.as_object() {
                    for (k, v) in obj {
                        if let Some(s) = v.as_str() {
                            self.virtual_package_overrides
                                .insert(k.trim_start_matches("__").to_lowercase(), s.to_string());
                        }
                    }
                    self.sources.insert(key.to_string(), source);
                }
            }
            _ => {
                log::debug!("Ignoring unknown config key {}", key);
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<()> {
        if let Some(alias) = loader.get_env_config("channel-alias") {
            self.channel_alias = parse_alias(&alias)?;
            self.mark_env("channel-alias");
        }

        if let Some(timeout) = loader.get_env_u64("solve-timeout") {
            self.solve_timeout = Some(timeout);
            self.mark_env("solve-timeout");
        }

        if let Some(priority) = loader.get_env_config("channel-priority") {
            self.channel_priority = parse_priority(&priority)?;
            self.mark_env("channel-priority");
        }

        if let Some(keep) = loader.get_env_bool("keep-explicit") {
            self.keep_explicit = keep;
            self.mark_env("keep-explicit");
        }

        let overrides = loader.get_env_overrides();
        if !overrides.is_empty() {
            self.virtual_package_overrides.extend(overrides);
            self.sources.insert(
                "virtual-package-overrides".to_string(),
                ConfigSource::Environment("KILN_OVERRIDE_*".to_string()),
            );
        }

        Ok(())
    }

    fn mark_env(&mut self, key: &str) {
        self.sources
            .insert(key.to_string(), ConfigSource::Environment(env_var_name(key)));
    }

    fn config_keys(&self) -> Vec<String> {
        [
            "channel-alias",
            "default-channels",
            "solve-timeout",
            "channel-priority",
            "keep-explicit",
            "virtual-package-overrides",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Parse a channel alias, making sure it ends in `/` so names join below it
fn parse_alias(s: &str) -> Result<Url> {
    let text = if s.ends_with('/') { s.to_string() } else { format!("{}/", s) };
    Url::parse(&text).map_err(|e| EnvError::Config(format!("Invalid channel-alias \"{}\": {}", s, e)))
}

fn parse_priority(s: &str) -> Result<ChannelPriority> {
    ChannelPriority::from_str(s)
        .ok_or_else(|| EnvError::Config(format!("Invalid channel-priority \"{}\", expected strict or disabled", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.channel_alias.as_str(), "https://conda.anaconda.org/");
        assert_eq!(config.default_channels, vec!["conda-forge"]);
        assert_eq!(config.solve_timeout, None);
        assert_eq!(config.channel_priority, ChannelPriority::Disabled);
        assert!(config.keep_explicit);
        assert!(config.virtual_package_overrides.is_empty());
    }

    #[test]
    fn test_merge_values() {
        let mut config = Config::default();
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "channel-alias": "https://mirror.example.org/conda",
                "default-channels": ["main", "bioconda"],
                "solve-timeout": 30,
                "channel-priority": "strict",
                "keep-explicit": false,
                "virtual-package-overrides": {"__glibc": "2.28"},
                "unknown-key": 1
            }"#,
        )
        .unwrap();
        config.merge_raw_config(raw, ConfigSource::Global).unwrap();

        assert_eq!(config.channel_alias.as_str(), "https://mirror.example.org/conda/");
        assert_eq!(config.default_channels, vec!["main", "bioconda"]);
        assert_eq!(config.solve_timeout_duration(), Some(Duration::from_secs(30)));
        assert_eq!(config.policy().channel_priority, ChannelPriority::Strict);
        assert!(!config.keep_explicit);
        assert_eq!(config.virtual_package_overrides.get("glibc").map(String::as_str), Some("2.28"));
        assert_eq!(config.get_source("solve-timeout"), Some(&ConfigSource::Global));
        assert_eq!(config.get_source("unknown-key"), None);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        let err = config
            .merge_config_value("channel-priority", serde_json::json!("sometimes"), ConfigSource::Global)
            .unwrap_err();
        assert!(matches!(err, EnvError::Config(_)));

        let err = config
            .merge_config_value("channel-alias", serde_json::json!("not a url"), ConfigSource::Global)
            .unwrap_err();
        assert!(matches!(err, EnvError::Config(_)));
    }

    #[test]
    fn test_serde_round_trip() {
        let config: Config = serde_json::from_str(r#"{"channel-priority": "strict"}"#).unwrap();
        assert_eq!(config.channel_priority, ChannelPriority::Strict);
        assert!(config.keep_explicit);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["default-channels"][0], "conda-forge");
        assert!(json.get("solve-timeout").is_none());
    }
}

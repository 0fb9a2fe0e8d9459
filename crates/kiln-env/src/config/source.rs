use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EnvError, Result};

/// Prefix of environment variables that override virtual packages
const OVERRIDE_PREFIX: &str = "KILN_OVERRIDE_";

/// Represents the source of a configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Default built-in value
    Default,
    /// From the global config file (`$KILN_HOME/config.json`)
    Global,
    /// From a config file passed explicitly
    File(PathBuf),
    /// From environment variable
    Environment(String),
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::Global => "global",
            ConfigSource::File(_) => "file",
            ConfigSource::Environment(var) => var,
        }
    }
}

/// Raw configuration data loaded from a JSON file: a flat object of
/// kebab-case keys
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(flatten)]
    pub values: IndexMap<String, serde_json::Value>,
}

/// Loads configuration from various sources
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a KILN_* environment variable
    pub fn get_kiln_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Get the kiln home directory
    pub fn get_kiln_home(&self) -> PathBuf {
        if let Some(home) = self.get_kiln_env("KILN_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "kiln") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base_dirs) = directories::BaseDirs::new() {
            base_dirs.home_dir().join(".kiln")
        } else {
            PathBuf::from(".kiln")
        }
    }

    /// Load configuration from a JSON file; a missing file is empty
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| EnvError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let config: RawConfig = serde_json::from_str(&contents)
            .map_err(|e| EnvError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load global configuration from `<kiln home>/config.json`
    pub fn load_global_config(&self) -> Result<RawConfig> {
        let config_file = self.get_kiln_home().join("config.json");
        self.load_config_file(config_file)
    }

    /// Get a configuration value from environment variable
    /// Converts "foo-bar" to "KILN_FOO_BAR"
    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_kiln_env(&env_var_name(key))
    }

    /// Get boolean value from environment variable
    pub fn get_env_bool(&self, key: &str) -> Option<bool> {
        self.get_env_config(key)
            .map(|val| !matches!(val.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
    }

    /// Get unsigned integer value from environment variable
    pub fn get_env_u64(&self, key: &str) -> Option<u64> {
        self.get_env_config(key).and_then(|val| val.parse().ok())
    }

    /// Virtual package overrides from `KILN_OVERRIDE_<NAME>` variables,
    /// keyed by lowercased name and sorted
    pub fn get_env_overrides(&self) -> IndexMap<String, String> {
        if !self.use_environment {
            return IndexMap::new();
        }

        let mut overrides: Vec<(String, String)> = env::vars()
            .filter_map(|(var, value)| {
                let name = var.strip_prefix(OVERRIDE_PREFIX)?;
                if name.is_empty() || value.is_empty() {
                    return None;
                }
                Some((name.to_lowercase(), value))
            })
            .collect();
        overrides.sort();
        overrides.into_iter().collect()
    }
}

/// The environment variable for a config key
pub(crate) fn env_var_name(key: &str) -> String {
    format!("KILN_{}", key.replace('-', "_").to_uppercase())
}

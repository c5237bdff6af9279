use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in default
    Default,
    /// The user config file (`<config dir>/planner.json`)
    User,
    /// A config file passed explicitly
    File(PathBuf),
    /// An environment variable
    Environment(String),
    /// Set programmatically
    Command,
}

impl ConfigSource {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigSource::Default => "default",
            ConfigSource::User => "user",
            ConfigSource::File(_) => "file",
            ConfigSource::Environment(var) => var,
            ConfigSource::Command => "command",
        }
    }
}

/// Configuration values as read from a JSON file, keyed by kebab-case name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(flatten)]
    pub values: IndexMap<String, serde_json::Value>,
}

/// Locates and reads configuration files and `PROV_*` environment variables
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    use_environment: bool,
    home: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self {
            use_environment,
            home: None,
        }
    }

    /// Use `home` instead of the platform config directory
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn uses_environment(&self) -> bool {
        self.use_environment
    }

    /// Read a non-empty environment variable, if the environment is enabled
    pub fn get_prov_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }
        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// The configuration directory: `PROV_HOME`, else the platform default
    pub fn get_prov_home(&self) -> PathBuf {
        if let Some(home) = &self.home {
            return home.clone();
        }
        if let Some(home) = self.get_prov_env("PROV_HOME") {
            return PathBuf::from(home);
        }
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "prov") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base) = directories::BaseDirs::new() {
            base.home_dir().join(".prov")
        } else {
            PathBuf::from(".prov")
        }
    }

    /// Load a JSON config file; a missing file yields an empty config
    pub fn load_config_file<P: AsRef<Path>>(&self, path: P) -> Result<RawConfig, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(RawConfig::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load `<config dir>/planner.json`
    pub fn load_user_config(&self) -> Result<RawConfig, ConfigError> {
        self.load_config_file(self.get_prov_home().join("planner.json"))
    }

    /// Environment variable name for a config key: `conflict-limit` -> `PROV_CONFLICT_LIMIT`
    pub fn env_var_name(key: &str) -> String {
        format!("PROV_{}", key.replace('-', "_").to_uppercase())
    }

    pub fn get_env_config(&self, key: &str) -> Option<String> {
        self.get_prov_env(&Self::env_var_name(key))
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::source::{ConfigLoader, ConfigSource, RawConfig};
use crate::error::ConfigError;
use crate::solver::{Budget, SolverKind, SolverOptions};

fn default_conflict_limit() -> u64 {
    100_000
}

fn default_core_minimization_limit() -> usize {
    64
}

fn default_true() -> bool {
    true
}

/// Planner settings.
///
/// Sources are merged lowest priority first: built-in defaults, the user
/// config file, an explicit config file, then `PROV_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlannerConfig {
    /// Maximum solver conflicts per resolution; 0 disables the limit
    #[serde(default = "default_conflict_limit")]
    pub conflict_limit: u64,

    /// Wall-clock ceiling per resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_ms: Option<u64>,

    /// Search for the best plan rather than the first consistent one
    #[serde(default = "default_true")]
    pub optimize: bool,

    #[serde(default = "default_true")]
    pub minimize_core: bool,

    #[serde(default = "default_core_minimization_limit")]
    pub core_minimization_limit: usize,

    #[serde(default)]
    pub solver: SolverKind,

    #[serde(skip)]
    sources: HashMap<String, ConfigSource>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            conflict_limit: default_conflict_limit(),
            time_limit_ms: None,
            optimize: true,
            minimize_core: true,
            core_minimization_limit: default_core_minimization_limit(),
            solver: SolverKind::default(),
            sources: HashMap::new(),
        }
    }
}

impl PlannerConfig {
    const KEYS: [&'static str; 6] = [
        "conflict-limit",
        "time-limit-ms",
        "optimize",
        "minimize-core",
        "core-minimization-limit",
        "solver",
    ];

    pub fn new() -> Self {
        Self::default()
    }

    /// Build configuration from all sources
    pub fn build<P: AsRef<Path>>(config_file: Option<P>, use_environment: bool) -> Result<Self, ConfigError> {
        Self::build_with(&ConfigLoader::new(use_environment), config_file)
    }

    /// Build configuration using an explicit loader
    pub fn build_with<P: AsRef<Path>>(loader: &ConfigLoader, config_file: Option<P>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in Self::KEYS {
            config.sources.insert(key.to_string(), ConfigSource::Default);
        }

        // 1. User config
        let user = loader.load_user_config()?;
        config.merge_raw_config(user, ConfigSource::User)?;

        // 2. Explicit file
        if let Some(path) = config_file {
            let path = path.as_ref();
            let raw = loader.load_config_file(path)?;
            config.merge_raw_config(raw, ConfigSource::File(path.to_path_buf()))?;
        }

        // 3. Environment
        if loader.uses_environment() {
            config.apply_env_overrides(loader)?;
        }

        log::debug!(
            "Planner config: conflict-limit={} optimize={} solver={}",
            config.conflict_limit,
            config.optimize,
            config.solver.as_str()
        );
        Ok(config)
    }

    /// Where a value came from; `None` for unknown keys
    pub fn get_source(&self, key: &str) -> Option<&ConfigSource> {
        self.sources.get(key)
    }

    /// Set a value programmatically
    pub fn set(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        self.merge_config_value(key, value, ConfigSource::Command)
    }

    /// Budget for one resolution, with a fresh cancellation token
    pub fn budget(&self) -> Budget {
        let mut budget = Budget::unlimited();
        if self.conflict_limit > 0 {
            budget = budget.with_conflict_limit(self.conflict_limit);
        }
        if let Some(ms) = self.time_limit_ms {
            budget = budget.with_time_limit(Duration::from_millis(ms));
        }
        budget
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            optimize: self.optimize,
            minimize_core: self.minimize_core,
            core_minimization_limit: self.core_minimization_limit,
        }
    }

    fn merge_raw_config(&mut self, raw: RawConfig, source: ConfigSource) -> Result<(), ConfigError> {
        for (key, value) in raw.values {
            self.merge_config_value(&key, value, source.clone())?;
        }
        Ok(())
    }

    fn merge_config_value(
        &mut self,
        key: &str,
        value: serde_json::Value,
        source: ConfigSource,
    ) -> Result<(), ConfigError> {
        let invalid = |expected: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected {}, got {}", expected, value),
        };

        match key {
            "conflict-limit" => {
                self.conflict_limit = value.as_u64().ok_or_else(|| invalid("an unsigned integer"))?;
            }
            "time-limit-ms" => {
                self.time_limit_ms = if value.is_null() {
                    None
                } else {
                    Some(value.as_u64().ok_or_else(|| invalid("an unsigned integer or null"))?)
                };
            }
            "optimize" => {
                self.optimize = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "minimize-core" => {
                self.minimize_core = value.as_bool().ok_or_else(|| invalid("a boolean"))?;
            }
            "core-minimization-limit" => {
                let limit = value.as_u64().ok_or_else(|| invalid("an unsigned integer"))?;
                self.core_minimization_limit = usize::try_from(limit).map_err(|_| invalid("a smaller integer"))?;
            }
            "solver" => {
                self.solver = value
                    .as_str()
                    .and_then(SolverKind::from_str)
                    .ok_or_else(|| invalid("a known solver (cdcl)"))?;
            }
            _ => {
                log::warn!("Ignoring unknown planner config key \"{}\"", key);
                return Ok(());
            }
        }

        self.sources.insert(key.to_string(), source);
        Ok(())
    }

    fn apply_env_overrides(&mut self, loader: &ConfigLoader) -> Result<(), ConfigError> {
        for key in Self::KEYS {
            let Some(raw) = loader.get_env_config(key) else {
                continue;
            };
            let var = ConfigLoader::env_var_name(key);
            let value = match key {
                "solver" => serde_json::Value::String(raw),
                "optimize" | "minimize-core" => {
                    serde_json::Value::Bool(!matches!(raw.to_lowercase().as_str(), "false" | "0" | "no" | "off"))
                }
                _ => {
                    let number: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                        key: var.clone(),
                        reason: format!("expected an unsigned integer, got \"{}\"", raw),
                    })?;
                    serde_json::Value::from(number)
                }
            };
            self.merge_config_value(key, value, ConfigSource::Environment(var))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.conflict_limit, 100_000);
        assert_eq!(config.time_limit_ms, None);
        assert!(config.optimize);
        assert!(config.minimize_core);
        assert_eq!(config.core_minimization_limit, 64);
        assert_eq!(config.solver, SolverKind::Cdcl);
    }

    #[test]
    fn test_set_tracks_source() {
        let mut config = PlannerConfig::new();
        config.set("conflict-limit", json!(500)).unwrap();
        assert_eq!(config.conflict_limit, 500);
        assert_eq!(config.get_source("conflict-limit"), Some(&ConfigSource::Command));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PlannerConfig::new();
        assert!(matches!(
            config.set("optimize", json!("yes")),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(config.set("solver", json!("minisat")).is_err());
        assert!(config.set("conflict-limit", json!(-1)).is_err());
        // Unknown keys are ignored
        assert!(config.set("colour", json!(true)).is_ok());
    }

    #[test]
    fn test_budget_from_config() {
        let mut config = PlannerConfig::new();
        assert_eq!(config.budget().conflict_limit(), Some(100_000));
        assert!(config.budget().deadline().is_none());

        config.set("conflict-limit", json!(0)).unwrap();
        config.set("time-limit-ms", json!(250)).unwrap();
        assert_eq!(config.budget().conflict_limit(), None);
        assert!(config.budget().deadline().is_some());
    }

    #[test]
    fn test_serde_kebab_case() {
        let config: PlannerConfig = serde_json::from_str(r#"{"conflict-limit": 10, "minimize-core": false}"#).unwrap();
        assert_eq!(config.conflict_limit, 10);
        assert!(!config.minimize_core);
        assert!(config.optimize);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["core-minimization-limit"], json!(64));
    }
}

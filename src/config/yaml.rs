//! YAML configuration parsing.
//!
//! The config file is one mapping. `queue_ahead` and `tz` at the top level
//! are defaults for every task; every other key names a task:
//!
//! ```yaml
//! queue_ahead: 360
//! tz: America/Chicago
//!
//! nightly_report:
//!   class: ReportJob
//!   every: 1.day
//!   at: "0:30"
//!   expires_after: 2.hours
//! ```
//!
//! Task order in the file is kept. A task record that cannot be read is
//! only an error for that task; a file that is not a mapping fails as a whole.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;
use crate::core::schedule::DEFAULT_QUEUE_AHEAD_MINUTES;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "FORESIGHT_CONFIG";

/// Config file used when neither an explicit path nor the env var is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/foresight.yml";

const GLOBAL_QUEUE_AHEAD: &str = "queue_ahead";
const GLOBAL_TZ: &str = "tz";
const DEFAULT_TIMEZONE: &str = "UTC";

/// One task record as written in the file. Every field is optional here so
/// missing ones can be reported by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub class: Option<String>,
    pub every: Option<String>,
    pub at: Option<String>,
    pub expires_after: Option<String>,
    pub queue_ahead: Option<u32>,
    pub tz: Option<String>,
    pub queue_name: Option<String>,
    #[serde(default)]
    pub arguments: Vec<serde_yaml::Value>,
}

/// A task key and its raw record.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    pub name: String,
    raw: serde_yaml::Value,
}

impl TaskEntry {
    /// Read the raw record as a [`TaskConfig`].
    pub fn config(&self) -> Result<TaskConfig, ConfigError> {
        serde_yaml::from_value(self.raw.clone()).map_err(|e| {
            ConfigError::InvalidConfig(format!("task '{}': {}", self.name, e))
        })
    }
}

/// The whole scheduler config file.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Default lookahead window in minutes.
    pub queue_ahead: u32,
    /// Default IANA timezone name.
    pub tz: String,
    /// Task records in file order.
    pub tasks: Vec<TaskEntry>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_ahead: DEFAULT_QUEUE_AHEAD_MINUTES,
            tz: DEFAULT_TIMEZONE.to_string(),
            tasks: Vec::new(),
        }
    }
}

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load the scheduler config from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse the scheduler config from a YAML string.
    pub fn parse(yaml: &str) -> Result<SchedulerConfig, ConfigError> {
        let root: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let mapping = match root {
            serde_yaml::Value::Mapping(mapping) => mapping,
            // An empty file has no tasks.
            serde_yaml::Value::Null => return Ok(SchedulerConfig::default()),
            _ => {
                return Err(ConfigError::InvalidConfig(
                    "config must be a mapping of task names to tasks".into(),
                ));
            }
        };

        let mut config = SchedulerConfig::default();
        for (key, value) in mapping {
            let key = match key {
                serde_yaml::Value::String(key) => key,
                other => {
                    return Err(ConfigError::InvalidConfig(format!(
                        "task names must be strings, got {:?}",
                        other
                    )));
                }
            };

            match key.as_str() {
                GLOBAL_QUEUE_AHEAD => {
                    config.queue_ahead = serde_yaml::from_value(value).map_err(|e| {
                        ConfigError::InvalidConfig(format!("global queue_ahead: {}", e))
                    })?;
                }
                GLOBAL_TZ => {
                    config.tz = serde_yaml::from_value(value).map_err(|e| {
                        ConfigError::InvalidConfig(format!("global tz: {}", e))
                    })?;
                }
                _ => config.tasks.push(TaskEntry {
                    name: key,
                    raw: value,
                }),
            }
        }

        Ok(config)
    }

    /// Pick the config path: explicit argument, then [`CONFIG_ENV_VAR`],
    /// then [`DEFAULT_CONFIG_PATH`].
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        Self::resolve_path_with(explicit, std::env::var(CONFIG_ENV_VAR).ok())
    }

    fn resolve_path_with(explicit: Option<&Path>, env_value: Option<String>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match env_value {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }
}

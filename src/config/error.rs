//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::schedule::ScheduleError;

/// Errors that can occur when loading configuration or building tasks from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A task is missing `class` or `every`.
    #[error("task '{task}' is missing required field '{field}'")]
    MissingRequiredField { task: String, field: &'static str },

    /// A task names a class with no registered handler.
    #[error("task '{task}' names unknown job class '{class}'")]
    UnknownJobClass { task: String, class: String },

    /// A task's `every`, `at`, `expires_after` or `tz` is invalid.
    #[error("task '{task}': {source}")]
    Schedule {
        task: String,
        #[source]
        source: ScheduleError,
    },
}

impl ConfigError {
    /// Short name of the error kind, for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::FileRead { .. } => "FileRead",
            ConfigError::Yaml(_) => "Yaml",
            ConfigError::InvalidConfig(_) => "InvalidConfig",
            ConfigError::MissingRequiredField { .. } => "MissingRequiredField",
            ConfigError::UnknownJobClass { .. } => "UnknownJobClass",
            ConfigError::Schedule { source, .. } => match source {
                ScheduleError::InvalidTimeSpec(_) => "InvalidTimeSpec",
                ScheduleError::UnparseableFrequency(_) => "UnparseableFrequency",
                ScheduleError::NonPositiveFrequency(_) => "NonPositiveFrequency",
                ScheduleError::InvalidTimezone(_) => "InvalidTimezone",
                ScheduleError::HourNeedsWholeDays { .. } => "HourNeedsWholeDays",
            },
        }
    }
}

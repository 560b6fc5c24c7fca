//! Configuration loading and parsing.
//!
//! This module reads the YAML task file and builds schedule specs from it.

mod builder;
mod error;
mod yaml;

pub use builder::{BuiltTask, TaskConfigBuilder};
pub use error::ConfigError;
pub use yaml::{
    CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH, SchedulerConfig, TaskConfig, TaskEntry, YamlLoader,
};

//! Schedule spec builder from YAML configuration.
//!
//! Turns one task record into a [`ScheduleSpec`], filling in the file's
//! global `queue_ahead` and `tz` where the task leaves them out.

use crate::core::at::TimeSpec;
use crate::core::frequency::Frequency;
use crate::core::job::HandlerRegistry;
use crate::core::schedule::{ScheduleError, ScheduleSpec, parse_timezone};
use crate::core::types::{JobClass, TaskName};

use super::error::ConfigError;
use super::yaml::{SchedulerConfig, TaskConfig, TaskEntry};

/// Outcome of building one task.
pub type BuiltTask = (TaskName, Result<ScheduleSpec, ConfigError>);

/// Builder for creating schedule specs from configuration.
pub struct TaskConfigBuilder<'a> {
    queue_ahead: u32,
    tz: &'a str,
    registry: Option<&'a HandlerRegistry>,
}

impl<'a> TaskConfigBuilder<'a> {
    /// Use the globals of `config` as task defaults.
    pub fn new(config: &'a SchedulerConfig) -> Self {
        Self {
            queue_ahead: config.queue_ahead,
            tz: &config.tz,
            registry: None,
        }
    }

    /// Reject classes that have no handler in `registry`.
    pub fn with_registry(mut self, registry: &'a HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build every task of `config`, in file order. One task failing does
    /// not stop the others.
    pub fn build_all(&self, config: &SchedulerConfig) -> Vec<BuiltTask> {
        config
            .tasks
            .iter()
            .map(|entry| (TaskName::new(&entry.name), self.build_entry(entry)))
            .collect()
    }

    /// Build one raw task entry.
    pub fn build_entry(&self, entry: &TaskEntry) -> Result<ScheduleSpec, ConfigError> {
        let config = entry.config()?;
        self.build(&entry.name, &config)
    }

    /// Build a spec from a task record.
    pub fn build(&self, name: &str, config: &TaskConfig) -> Result<ScheduleSpec, ConfigError> {
        let class = required(name, "class", config.class.as_deref())?;
        let every = required(name, "every", config.every.as_deref())?;

        if let Some(registry) = self.registry
            && !registry.contains(&JobClass::new(class))
        {
            return Err(ConfigError::UnknownJobClass {
                task: name.to_string(),
                class: class.to_string(),
            });
        }

        let schedule_err = |source: ScheduleError| ConfigError::Schedule {
            task: name.to_string(),
            source,
        };

        let frequency: Frequency = every.parse().map_err(schedule_err)?;
        let at = TimeSpec::parse_optional(config.at.as_deref()).map_err(schedule_err)?;
        let tz = parse_timezone(config.tz.as_deref().unwrap_or(self.tz)).map_err(schedule_err)?;

        let arguments = config
            .arguments
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::InvalidConfig(format!("task '{}': {}", name, e)))?;

        let mut builder = ScheduleSpec::builder(class, frequency)
            .name(name)
            .at(at)
            .queue_ahead(config.queue_ahead.unwrap_or(self.queue_ahead))
            .timezone(tz)
            .arguments(arguments);

        if let Some(window) = config.expires_after.as_deref() {
            builder = builder.expires_after(window.parse().map_err(schedule_err)?);
        }
        if let Some(queue_name) = config.queue_name.as_deref() {
            builder = builder.queue_name(queue_name);
        }

        builder.build().map_err(schedule_err)
    }
}

fn required<'c>(
    task: &str,
    field: &'static str,
    value: Option<&'c str>,
) -> Result<&'c str, ConfigError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequiredField {
            task: task.to_string(),
            field,
        }),
    }
}

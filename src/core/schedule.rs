//! Schedule specs and future run time generation.
//!
//! A [`ScheduleSpec`] is one task from the scheduler config: which job class
//! to run, how often, where the recurrence is anchored (`at`), how far ahead
//! the queue must stay filled, when a late run expires, and the timezone all
//! of that is computed in.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::at::TimeSpec;
use super::frequency::Frequency;
use super::local_time;
use super::types::{JobClass, TaskName};

/// Minutes of future runs kept queued when a task does not say otherwise.
pub const DEFAULT_QUEUE_AHEAD_MINUTES: u32 = 360;

/// Queue lane used when a task does not name one.
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// Errors that can occur when building a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The `at` string does not match `[Weekday ](*|**|H|HH):MM`.
    #[error("the `at` option '{0}' is invalid")]
    InvalidTimeSpec(String),

    /// The frequency is not `<integer>.<unit>` with a known unit.
    #[error("unparseable frequency: {0}")]
    UnparseableFrequency(String),

    /// The frequency is zero.
    #[error("frequency must be positive: {0}")]
    NonPositiveFrequency(String),

    /// Unknown IANA timezone name.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// An explicit hour only makes sense when runs are whole days apart.
    #[error("`at` '{at}' pins the hour, so `every` must be a whole number of days, got '{every}'")]
    HourNeedsWholeDays { at: String, every: String },
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// One recurring task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskParams", into = "TaskParams")]
pub struct ScheduleSpec {
    class: JobClass,
    name: TaskName,
    frequency: Frequency,
    at: TimeSpec,
    expires_after: Option<Frequency>,
    queue_ahead: u32,
    timezone: Tz,
    queue_name: String,
    arguments: Vec<Value>,
}

impl ScheduleSpec {
    /// Start building a spec for `class`, run every `frequency`.
    pub fn builder(class: impl Into<JobClass>, frequency: Frequency) -> ScheduleSpecBuilder {
        ScheduleSpecBuilder::new(class.into(), frequency)
    }

    pub fn class(&self) -> &JobClass {
        &self.class
    }

    pub fn name(&self) -> &TaskName {
        &self.name
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn at(&self) -> &TimeSpec {
        &self.at
    }

    pub fn expires_after(&self) -> Option<Frequency> {
        self.expires_after
    }

    /// Minutes into the future that must stay covered by queued runs.
    pub fn queue_ahead(&self) -> u32 {
        self.queue_ahead
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// The very first time this task should run, as seen from `now`.
    pub fn first_run_time(&self, now: DateTime<Utc>) -> DateTime<Tz> {
        self.at.resolve(now, self.timezone)
    }

    /// Future run times still needed, using the current time.
    pub fn future_run_times(&self, existing: &[DateTime<Tz>]) -> Vec<DateTime<Tz>> {
        self.future_run_times_at(existing, Utc::now())
    }

    /// Run times that must be added to `existing` so that at least two runs
    /// are queued and the last one is `queue_ahead` minutes past `now`.
    ///
    /// Generation continues from the last existing run, or from the first
    /// run time when nothing is queued yet. The result is strictly
    /// increasing and never repeats an existing time.
    pub fn future_run_times_at(
        &self,
        existing: &[DateTime<Tz>],
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Tz>> {
        let tz = self.timezone;
        let local_now = local_time::beginning_of_minute(&now.with_timezone(&tz));
        let queue_ahead = i64::from(self.queue_ahead);

        let seed = match existing.iter().max() {
            Some(last) => Some(last.with_timezone(&tz)),
            None => self.previous_run_time(&self.first_run_time(now)),
        };
        let Some(mut cursor) = seed else {
            tracing::warn!(task = %self.name, "First run time is out of the date range");
            return Vec::new();
        };

        let mut generated = Vec::new();
        while existing.len() + generated.len() < 2
            || local_time::minutes_between(&local_now, &cursor) < queue_ahead
        {
            let Some(next) = self.next_run_time(&cursor) else {
                tracing::warn!(
                    task = %self.name,
                    after = %cursor,
                    "Next run time is out of the date range"
                );
                break;
            };
            cursor = next;

            if existing.contains(&cursor) {
                tracing::debug!(task = %self.name, run_at = %cursor, "Run time already queued");
                continue;
            }
            generated.push(cursor);
        }

        generated
    }

    /// The run after `cursor`.
    fn next_run_time(&self, cursor: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self.pinned_step() {
            Some((days, hour, minute)) => local_time::add_days(cursor, days)
                .map(|day| local_time::change_time(&day, hour, minute)),
            None => self.frequency.after(cursor),
        }
    }

    /// The run before `cursor`.
    fn previous_run_time(&self, cursor: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self.pinned_step() {
            Some((days, hour, minute)) => local_time::add_days(cursor, -days)
                .map(|day| local_time::change_time(&day, hour, minute)),
            None => self.frequency.before(cursor),
        }
    }

    /// With a pinned hour the frequency is whole days, stepped on the
    /// calendar and pulled back to the hour so DST changes do not drift it.
    fn pinned_step(&self) -> Option<(i64, u32, u32)> {
        match (self.frequency.whole_days(), self.at.hour(), self.at.minute()) {
            (Some(days), Some(hour), Some(minute)) => Some((days, hour, minute)),
            _ => None,
        }
    }

    /// Latest time a run scheduled for `scheduled_time` may still start, or
    /// `None` when the task never expires. A window running past the end of
    /// the date range never closes.
    pub fn deadline(&self, scheduled_time: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.expires_after
            .and_then(|window| window.after(&scheduled_time.with_timezone(&self.timezone)))
    }

    /// Whether a run scheduled for `scheduled_time` is too late to start at `now`.
    pub fn is_expired(&self, scheduled_time: &DateTime<Tz>, now: DateTime<Utc>) -> bool {
        self.deadline(scheduled_time)
            .is_some_and(|deadline| now > deadline.with_timezone(&Utc))
    }
}

/// Builder for [`ScheduleSpec`].
#[derive(Debug, Clone)]
pub struct ScheduleSpecBuilder {
    class: JobClass,
    name: Option<TaskName>,
    frequency: Frequency,
    at: TimeSpec,
    expires_after: Option<Frequency>,
    queue_ahead: u32,
    timezone: Tz,
    queue_name: String,
    arguments: Vec<Value>,
}

impl ScheduleSpecBuilder {
    fn new(class: JobClass, frequency: Frequency) -> Self {
        Self {
            class,
            name: None,
            frequency,
            at: TimeSpec::now(),
            expires_after: None,
            queue_ahead: DEFAULT_QUEUE_AHEAD_MINUTES,
            timezone: Tz::UTC,
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            arguments: Vec::new(),
        }
    }

    /// Task name; defaults to the job class.
    pub fn name(mut self, name: impl Into<TaskName>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, at: TimeSpec) -> Self {
        self.at = at;
        self
    }

    pub fn expires_after(mut self, window: Frequency) -> Self {
        self.expires_after = Some(window);
        self
    }

    pub fn queue_ahead(mut self, minutes: u32) -> Self {
        self.queue_ahead = minutes;
        self
    }

    pub fn timezone(mut self, tz: Tz) -> Self {
        self.timezone = tz;
        self
    }

    pub fn queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = queue_name.into();
        self
    }

    pub fn arguments(mut self, arguments: Vec<Value>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn build(self) -> Result<ScheduleSpec, ScheduleError> {
        if self.at.hour_given() && self.frequency.whole_days().is_none() {
            return Err(ScheduleError::HourNeedsWholeDays {
                at: self.at.to_string(),
                every: self.frequency.to_string(),
            });
        }

        let name = self
            .name
            .unwrap_or_else(|| TaskName::new(self.class.as_str()));

        Ok(ScheduleSpec {
            class: self.class,
            name,
            frequency: self.frequency,
            at: self.at,
            expires_after: self.expires_after,
            queue_ahead: self.queue_ahead,
            timezone: self.timezone,
            queue_name: self.queue_name,
            arguments: self.arguments,
        })
    }
}

/// Serialized form of a [`ScheduleSpec`], carried inside queued envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    pub name: TaskName,
    pub class: JobClass,
    pub every: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_after: Option<Frequency>,
    pub queue_ahead: u32,
    pub tz: String,
    pub queue_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
}

impl From<ScheduleSpec> for TaskParams {
    fn from(spec: ScheduleSpec) -> Self {
        let at = spec.at.to_string();
        Self {
            name: spec.name,
            class: spec.class,
            every: spec.frequency,
            at: (!at.is_empty()).then_some(at),
            expires_after: spec.expires_after,
            queue_ahead: spec.queue_ahead,
            tz: spec.timezone.name().to_string(),
            queue_name: spec.queue_name,
            arguments: spec.arguments,
        }
    }
}

impl TryFrom<TaskParams> for ScheduleSpec {
    type Error = ScheduleError;

    fn try_from(params: TaskParams) -> Result<Self, Self::Error> {
        let mut builder = ScheduleSpec::builder(params.class, params.every)
            .name(params.name)
            .at(TimeSpec::parse_optional(params.at.as_deref())?)
            .queue_ahead(params.queue_ahead)
            .timezone(parse_timezone(&params.tz)?)
            .queue_name(params.queue_name)
            .arguments(params.arguments);
        if let Some(window) = params.expires_after {
            builder = builder.expires_after(window);
        }
        builder.build()
    }
}

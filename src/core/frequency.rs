//! Frequencies and expiry windows written as `<integer>.<unit>`.
//!
//! `15.minutes`, `1.hour`, `2.days`, `1.week`. Second, minute and hour
//! amounts are elapsed time; day and week amounts are calendar days in the
//! task's timezone, so `1.day` always lands on the same wall-clock time even
//! when the day is 23 or 25 hours long.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::local_time;
use super::schedule::ScheduleError;

/// Unit of a [`Frequency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrequencyUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl FrequencyUnit {
    fn parse(unit: &str) -> Option<Self> {
        match unit {
            "second" | "seconds" => Some(Self::Second),
            "minute" | "minutes" => Some(Self::Minute),
            "hour" | "hours" => Some(Self::Hour),
            "day" | "days" => Some(Self::Day),
            "week" | "weeks" => Some(Self::Week),
            _ => None,
        }
    }

    fn name(&self, amount: u32) -> &'static str {
        let plural = amount != 1;
        match (self, plural) {
            (Self::Second, false) => "second",
            (Self::Second, true) => "seconds",
            (Self::Minute, false) => "minute",
            (Self::Minute, true) => "minutes",
            (Self::Hour, false) => "hour",
            (Self::Hour, true) => "hours",
            (Self::Day, false) => "day",
            (Self::Day, true) => "days",
            (Self::Week, false) => "week",
            (Self::Week, true) => "weeks",
        }
    }

    fn seconds(&self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
        }
    }
}

/// Longest accepted frequency or expiry window, about a thousand years.
const MAX_SPAN_SECONDS: i64 = 1_000 * 366 * 86_400;

/// A positive amount of time between runs (or before a run expires).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    amount: u32,
    unit: FrequencyUnit,
}

impl Frequency {
    /// Create a frequency. Fails on a zero amount or a span too long to
    /// add to a date.
    pub fn new(amount: u32, unit: FrequencyUnit) -> Result<Self, ScheduleError> {
        Self::checked(amount, unit, || format!("{}.{}", amount, unit.name(amount)))
    }

    fn checked(
        amount: u32,
        unit: FrequencyUnit,
        raw: impl Fn() -> String,
    ) -> Result<Self, ScheduleError> {
        if amount == 0 {
            return Err(ScheduleError::NonPositiveFrequency(raw()));
        }
        if i64::from(amount) * unit.seconds() > MAX_SPAN_SECONDS {
            return Err(ScheduleError::UnparseableFrequency(raw()));
        }
        Ok(Self { amount, unit })
    }

    pub fn minutes(amount: u32) -> Result<Self, ScheduleError> {
        Self::new(amount, FrequencyUnit::Minute)
    }

    pub fn hours(amount: u32) -> Result<Self, ScheduleError> {
        Self::new(amount, FrequencyUnit::Hour)
    }

    pub fn days(amount: u32) -> Result<Self, ScheduleError> {
        Self::new(amount, FrequencyUnit::Day)
    }

    pub fn weeks(amount: u32) -> Result<Self, ScheduleError> {
        Self::new(amount, FrequencyUnit::Week)
    }

    /// Length in whole days, treating a day as 24 hours, or `None` when the
    /// frequency is not a multiple of a day.
    pub fn whole_days(&self) -> Option<i64> {
        let seconds = i64::from(self.amount) * self.unit.seconds();
        (seconds % 86_400 == 0).then_some(seconds / 86_400)
    }

    /// `dt` moved forward by this frequency, or `None` past the end of the
    /// representable range.
    pub fn after(&self, dt: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.shift(dt, 1)
    }

    /// `dt` moved back by this frequency.
    pub fn before(&self, dt: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.shift(dt, -1)
    }

    fn shift(&self, dt: &DateTime<Tz>, sign: i64) -> Option<DateTime<Tz>> {
        let amount = i64::from(self.amount) * sign;
        match self.unit {
            FrequencyUnit::Day => local_time::add_days(dt, amount),
            FrequencyUnit::Week => local_time::add_days(dt, amount * 7),
            _ => dt.checked_add_signed(Duration::seconds(amount * self.unit.seconds())),
        }
    }
}

impl FromStr for Frequency {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::UnparseableFrequency(s.to_string());

        let (amount, unit) = s.trim().split_once('.').ok_or_else(invalid)?;
        if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let amount: u32 = amount.parse().map_err(|_| invalid())?;
        let unit = FrequencyUnit::parse(unit).ok_or_else(invalid)?;

        Self::checked(amount, unit, || s.to_string())
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.amount, self.unit.name(self.amount))
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

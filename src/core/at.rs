//! The `at` option: the time of day (and optional weekday) a task starts at.
//!
//! Accepted forms:
//!
//! - `18:00`, `3:30`: a fixed hour and minute
//! - `*:30`, `**:00`: minute 30 (or 00) of whatever hour comes next
//! - `Sun 2:00`, `Fri 23:45`: a fixed weekday, hour and minute
//!
//! The space after a weekday may be dropped only before an hour of 20 to 23
//! or a wildcard hour (`Sun20:00`, `Sun*:30`).
//!
//! Leaving `at` out means "now, without the seconds".

use chrono::{DateTime, Datelike, Days, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;
use std::str::FromStr;

use super::local_time;
use super::schedule::ScheduleError;

const DAYS: [(&str, Weekday); 7] = [
    ("Sun", Weekday::Sun),
    ("Mon", Weekday::Mon),
    ("Tue", Weekday::Tue),
    ("Wed", Weekday::Wed),
    ("Thu", Weekday::Thu),
    ("Fri", Weekday::Fri),
    ("Sat", Weekday::Sat),
];

/// A parsed `at` option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSpec {
    weekday: Option<Weekday>,
    hour: Option<u32>,
    minute: Option<u32>,
}

impl TimeSpec {
    /// The spec used when `at` is not given: the current minute.
    pub fn now() -> Self {
        Self::default()
    }

    /// Parse an optional `at` string; `None` and `""` both mean [`TimeSpec::now`].
    pub fn parse_optional(at: Option<&str>) -> Result<Self, ScheduleError> {
        match at {
            None | Some("") => Ok(Self::now()),
            Some(s) => s.parse(),
        }
    }

    /// Weekday the task is pinned to, if any.
    pub fn weekday(&self) -> Option<Weekday> {
        self.weekday
    }

    /// Explicit hour, or `None` for a wildcard hour.
    pub fn hour(&self) -> Option<u32> {
        self.hour
    }

    /// Explicit minute, or `None` when the whole spec was omitted.
    pub fn minute(&self) -> Option<u32> {
        self.minute
    }

    /// Whether an explicit hour was given.
    pub fn hour_given(&self) -> bool {
        self.hour.is_some()
    }

    /// The first instant at or after `now` (truncated to the minute) that
    /// matches this spec, in `tz`.
    pub fn resolve(&self, now: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
        let now = local_time::beginning_of_minute(&now.with_timezone(&tz));

        let minute = self.minute.unwrap_or(now.minute());
        let mut hour = self.hour.unwrap_or(now.hour());

        // Minute already passed this hour: move to the next one.
        if self.hour.is_none() && minute < now.minute() {
            hour += 1;
        }

        let mut day = now.date_naive();
        if let Some(weekday) = self.weekday {
            let ahead = (7 + weekday.num_days_from_sunday()
                - day.weekday().num_days_from_sunday())
                % 7;
            day = day.checked_add_days(Days::new(u64::from(ahead))).unwrap_or(day);
        }

        if hour == 24 {
            day = day.checked_add_days(Days::new(1)).unwrap_or(day);
            hour = 0;
        }

        // A wildcard hour resolved on the current day keeps now's offset, so
        // the second copy of a repeated hour is not mistaken for the first.
        let midnight = local_time::at_local(&tz, day, 0, 0, None);
        let reference = if self.hour.is_none() && day == now.date_naive() {
            &now
        } else {
            &midnight
        };
        let candidate = local_time::at_local(&tz, day, hour, minute, Some(reference));

        if candidate < now {
            let days = if self.weekday.is_some() { 7 } else { 1 };
            return local_time::add_days(&candidate, days).unwrap_or(candidate);
        }
        candidate
    }
}

impl FromStr for TimeSpec {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScheduleError::InvalidTimeSpec(s.to_string());

        let (weekday, rest) = match s.get(..3).and_then(|prefix| {
            DAYS.iter()
                .find(|(name, _)| *name == prefix)
                .map(|(_, day)| *day)
        }) {
            Some(day) => (Some(day), &s[3..]),
            None => (None, s),
        };

        let (spaced, rest) = match rest.chars().next() {
            Some(c) if c.is_whitespace() => (true, &rest[c.len_utf8()..]),
            _ => (false, rest),
        };

        let (hour_part, minute_part) = rest.split_once(':').ok_or_else(invalid)?;

        let hour = match hour_part {
            "*" | "**" => None,
            digits => {
                // Without a space only hours 20-23 may follow a weekday:
                // "Sun20:00" is accepted, "Sun2:00" and "Sun02:00" are not.
                let late_hour = digits.len() == 2 && digits.starts_with('2');
                if weekday.is_some() && !spaced && !late_hour {
                    return Err(invalid());
                }
                Some(parse_hour(digits).ok_or_else(invalid)?)
            }
        };

        let minute = parse_minute(minute_part).ok_or_else(invalid)?;

        Ok(Self {
            weekday,
            hour,
            minute: Some(minute),
        })
    }
}

/// One or two digits, 0 through 23.
fn parse_hour(digits: &str) -> Option<u32> {
    if !(1..=2).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|hour| *hour <= 23)
}

/// Exactly two digits, 00 through 59.
fn parse_minute(digits: &str) -> Option<u32> {
    match digits.as_bytes() {
        [tens @ b'0'..=b'5', ones @ b'0'..=b'9'] => {
            Some(u32::from(tens - b'0') * 10 + u32::from(ones - b'0'))
        }
        _ => None,
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(minute) = self.minute else {
            return Ok(());
        };
        if let Some(weekday) = self.weekday
            && let Some((name, _)) = DAYS.iter().find(|(_, day)| *day == weekday)
        {
            write!(f, "{} ", name)?;
        }
        match self.hour {
            Some(hour) => write!(f, "{}:{:02}", hour, minute),
            None => write!(f, "*:{:02}", minute),
        }
    }
}

//! Wall-clock arithmetic in a named timezone.
//!
//! Every schedule computation goes through these helpers so that daylight
//! saving transitions are resolved the same way everywhere:
//!
//! - a local time inside a spring-forward gap moves one hour later
//!   (`02:30` on a day that jumps from `02:00` to `03:00` becomes `03:30`);
//! - an ambiguous local time on a fall-back day keeps the offset of the
//!   reference instant when that offset is one of the two candidates, and
//!   otherwise resolves to the earlier instant.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Timelike};
use chrono_tz::Tz;

/// Longest run of one-hour shifts tried before giving up on a gap.
const MAX_GAP_HOURS: usize = 24;

/// Resolve a wall-clock time in `tz` to a concrete instant.
pub fn localize(tz: &Tz, naive: NaiveDateTime, reference: Option<&DateTime<Tz>>) -> DateTime<Tz> {
    let mut candidate = naive;
    for _ in 0..MAX_GAP_HOURS {
        match tz.from_local_datetime(&candidate) {
            chrono::LocalResult::Single(dt) => return dt,
            chrono::LocalResult::Ambiguous(earlier, later) => {
                return match reference {
                    Some(r) if r.offset().fix() == later.offset().fix() => later,
                    _ => earlier,
                };
            }
            chrono::LocalResult::None => candidate += Duration::hours(1),
        }
    }
    tz.from_utc_datetime(&naive)
}

/// Build an instant from a local calendar day and time of day.
pub fn at_local(
    tz: &Tz,
    day: NaiveDate,
    hour: u32,
    minute: u32,
    reference: Option<&DateTime<Tz>>,
) -> DateTime<Tz> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    localize(tz, day.and_time(time), reference)
}

/// Same local day as `dt`, with the hour and minute replaced and seconds cleared.
pub fn change_time(dt: &DateTime<Tz>, hour: u32, minute: u32) -> DateTime<Tz> {
    at_local(&dt.timezone(), dt.date_naive(), hour, minute, Some(dt))
}

/// Move `dt` by whole calendar days, keeping its wall-clock time. `None`
/// when the result falls outside the representable range.
pub fn add_days(dt: &DateTime<Tz>, days: i64) -> Option<DateTime<Tz>> {
    let naive = dt.naive_local().checked_add_signed(Duration::try_days(days)?)?;
    Some(localize(&dt.timezone(), naive, Some(dt)))
}

/// Midnight (or the first valid instant after it) of `dt`'s local day.
pub fn beginning_of_day(dt: &DateTime<Tz>) -> DateTime<Tz> {
    at_local(&dt.timezone(), dt.date_naive(), 0, 0, Some(dt))
}

/// Drop seconds and sub-second precision.
pub fn beginning_of_minute(dt: &DateTime<Tz>) -> DateTime<Tz> {
    *dt - Duration::seconds(i64::from(dt.second())) - Duration::nanoseconds(i64::from(dt.nanosecond()))
}

/// Whole minutes from `from` to `to`, truncated toward zero.
pub fn minutes_between(from: &DateTime<Tz>, to: &DateTime<Tz>) -> i64 {
    (*to - *from).num_minutes()
}

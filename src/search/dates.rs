//! Date operands for `saved:`, `read:`, `updated:` and `published:`.
//!
//! Accepted forms:
//! - `today`, `yesterday`, `this week`, `this month`: resolved against the
//!   caller's local clock; both bounds are inclusive
//! - `2024-01-01..2024-06-30`, `2024-01-01..*`, `*..2024-06-30`
//! - `2024-01-01`: same as `2024-01-01..*`
//!
//! Dates are `YYYY-MM-DD` (local midnight) or RFC 3339 timestamps.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};

/// Resolved bounds. `None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Resolve a date operand. Returns `None` if it cannot be understood.
pub fn resolve(value: &str, now: DateTime<FixedOffset>, week_start: Weekday) -> Option<DateRange> {
    let value = value.trim();
    if let Some(range) = resolve_relative(&value.to_lowercase(), now, week_start) {
        return Some(range);
    }

    let (start, end) = value.split_once("..").unwrap_or((value, "*"));
    Some(DateRange {
        start: parse_bound(start, now.offset())?,
        end: parse_bound(end, now.offset())?,
    })
}

fn resolve_relative(
    keyword: &str,
    now: DateTime<FixedOffset>,
    week_start: Weekday,
) -> Option<DateRange> {
    let midnight = local_midnight(now.date_naive(), now.offset())?;
    let (start, end) = match keyword {
        "today" => (midnight, midnight + Duration::days(1)),
        "yesterday" => (midnight - Duration::days(1), midnight),
        "this week" => {
            let days_in = (7 + now.weekday().num_days_from_monday()
                - week_start.num_days_from_monday())
                % 7;
            let start = midnight - Duration::days(i64::from(days_in));
            (start, start + Duration::days(7))
        }
        "this month" => {
            let first = now.date_naive().with_day(1)?;
            let next = if first.month() == 12 {
                NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
            } else {
                NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
            };
            (
                local_midnight(first, now.offset())?,
                local_midnight(next, now.offset())?,
            )
        }
        _ => return None,
    };
    Some(DateRange {
        start: Some(start),
        end: Some(end),
    })
}

fn local_midnight(date: NaiveDate, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(0, 0, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one side of a range. `Some(None)` is an open bound, `None` an error.
fn parse_bound(s: &str, offset: &FixedOffset) -> Option<Option<DateTime<Utc>>> {
    let s = s.trim();
    if s.is_empty() || s == "*" {
        return Some(None);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return local_midnight(date, offset).map(Some);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| Some(dt.with_timezone(&Utc)))
}

//! Five-field cron expression parsing and next-run computation
//!
//! Supports the classic `minute hour day-of-month month day-of-week` form
//! with `*`, lists, ranges, and `*/n` steps. Day-of-week uses 0-6 with
//! Sunday as 0 (7 is accepted as an alias for Sunday).
//!
//! Standard cron day semantics apply: when both day-of-month and day-of-week
//! are restricted, a day matches if EITHER field matches.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::error::{SchedulerError, SchedulerResult};

// ============================================================================
// Cron Field
// ============================================================================

/// One parsed cron field, stored as a bit set over the valid value range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CronField {
    bits: u64,
    /// Whether the field was written as a bare `*`
    is_wildcard: bool,
}

impl CronField {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    /// Values in ascending order
    fn values(&self, min: u32, max: u32) -> impl Iterator<Item = u32> + '_ {
        let bits = self.bits;
        (min..=max).filter(move |v| bits & (1 << v) != 0)
    }

    fn parse(field: &str, min: u32, max: u32, name: &'static str) -> SchedulerResult<Self> {
        let mut bits: u64 = 0;
        let is_wildcard = field == "*";

        for term in field.split(',') {
            let (range_part, step) = match term.split_once('/') {
                Some((r, s)) => {
                    let step: u32 = s.parse().map_err(|_| {
                        SchedulerError::invalid_cron(name, format!("bad step '{s}'"))
                    })?;
                    if step == 0 {
                        return Err(SchedulerError::invalid_cron(name, "step cannot be 0"));
                    }
                    (r, step)
                }
                None => (term, 1),
            };

            let (lo, hi) = if range_part == "*" {
                (min, max)
            } else if let Some((a, b)) = range_part.split_once('-') {
                let lo: u32 = a.parse().map_err(|_| {
                    SchedulerError::invalid_cron(name, format!("bad range start '{a}'"))
                })?;
                let hi: u32 = b.parse().map_err(|_| {
                    SchedulerError::invalid_cron(name, format!("bad range end '{b}'"))
                })?;
                (lo, hi)
            } else {
                let v: u32 = range_part.parse().map_err(|_| {
                    SchedulerError::invalid_cron(name, format!("bad value '{range_part}'"))
                })?;
                (v, v)
            };

            if lo < min || hi > max || lo > hi {
                return Err(SchedulerError::invalid_cron(
                    name,
                    format!("value out of range {min}-{max}: '{term}'"),
                ));
            }

            let mut v = lo;
            while v <= hi {
                bits |= 1 << v;
                v += step;
            }
        }

        // Day-of-week allows 7 as an alias for Sunday
        if name == "day-of-week" && bits & (1 << 7) != 0 {
            bits |= 1;
            bits &= !(1 << 7);
        }

        if bits == 0 {
            return Err(SchedulerError::invalid_cron(name, "field matches nothing"));
        }

        Ok(Self { bits, is_wildcard })
    }
}

// ============================================================================
// Cron Schedule
// ============================================================================

/// A parsed five-field cron expression
///
/// The expression string is kept for display and serialization; matching
/// happens against the parsed bit sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    minutes: CronField,
    hours: CronField,
    days_of_month: CronField,
    months: CronField,
    days_of_week: CronField,
}

impl CronSchedule {
    /// Parse a five-field cron expression
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::invalid_cron(
                "expression",
                format!("expected 5 fields, got {}", fields.len()),
            ));
        }

        Ok(Self {
            expression: expression.to_string(),
            minutes: CronField::parse(fields[0], 0, 59, "minute")?,
            hours: CronField::parse(fields[1], 0, 23, "hour")?,
            days_of_month: CronField::parse(fields[2], 1, 31, "day-of-month")?,
            months: CronField::parse(fields[3], 1, 12, "month")?,
            days_of_week: CronField::parse(fields[4], 0, 7, "day-of-week")?,
        })
    }

    /// The original expression string
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether a calendar day matches the month/day fields
    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(date.month()) {
            return false;
        }

        let dom_ok = self.days_of_month.contains(date.day());
        let dow_ok = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());

        // Vixie cron: both restricted means either may match
        match (
            self.days_of_month.is_wildcard,
            self.days_of_week.is_wildcard,
        ) {
            (true, true) => true,
            (false, true) => dom_ok,
            (true, false) => dow_ok,
            (false, false) => dom_ok || dow_ok,
        }
    }

    /// Compute the next matching instant strictly after `after`
    ///
    /// Returns `None` only for degenerate expressions that never fire within
    /// the search horizon (about four years, enough to cover leap days).
    pub fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let start = after + Duration::minutes(1);
        let start_date = start.date_naive();

        let mut date = start_date;
        // Four years of days bounds the search past any leap-day schedule
        for _ in 0..1462 {
            if self.day_matches(date) {
                let (from_hour, from_minute) = if date == start_date {
                    (start.hour(), start.minute())
                } else {
                    (0, 0)
                };

                for hour in self.hours.values(0, 23) {
                    if hour < from_hour {
                        continue;
                    }
                    let minute_floor = if date == start_date && hour == from_hour {
                        from_minute
                    } else {
                        0
                    };

                    for minute in self.minutes.values(0, 59) {
                        if minute < minute_floor {
                            continue;
                        }

                        let naive = date.and_time(
                            NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall time"),
                        );
                        // DST gaps make some wall times nonexistent; skip them
                        if let Some(dt) = Local.from_local_datetime(&naive).earliest() {
                            if dt > after {
                                return Some(dt);
                            }
                        }
                    }
                }
            }

            date = date.succ_opt()?;
        }

        None
    }
}

impl std::fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expression)
    }
}

impl Serialize for CronSchedule {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.expression)
    }
}

impl<'de> Deserialize<'de> for CronSchedule {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        Self::parse(&expr).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================

// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Mutex;

use jiff::civil::DateTime;

use crate::Error;
use crate::append::rolling::condition::RollingCondition;

/// One field of a cron schedule: `*`, a literal value, or `*/N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CronField {
    Any,
    Exact(i8),
    Step(i8),
}

impl CronField {
    fn parse(text: &str, min: i8, max: i8, what: &'static str) -> Result<CronField, Error> {
        if text == "*" {
            return Ok(CronField::Any);
        }
        if let Some(step) = text.strip_prefix("*/") {
            let step: i8 = step.parse().map_err(|_| {
                Error::new("malformed cron step").with_context(what, text.to_string())
            })?;
            if step < 1 || step > max {
                return Err(Error::new("cron step out of range").with_context(what, text.to_string()));
            }
            return Ok(CronField::Step(step));
        }
        let value: i8 = text.parse().map_err(|_| {
            Error::new("malformed cron field").with_context(what, text.to_string())
        })?;
        if value < min || value > max {
            return Err(Error::new("cron field out of range").with_context(what, text.to_string()));
        }
        Ok(CronField::Exact(value))
    }

    fn matches(&self, value: i8) -> bool {
        match self {
            CronField::Any => true,
            CronField::Exact(expected) => value == *expected,
            CronField::Step(step) => value % step == 0,
        }
    }
}

/// Rotate on a five-field cron schedule.
///
/// Fields are `minute hour day-of-month month day-of-week`, whitespace
/// separated, each either `*`, a literal integer, or `*/N`. Day-of-week is
/// numbered Monday = 0 through Sunday = 6, and when both day fields are
/// constrained both must match.
///
/// [`matches`](CronCondition::matches) is a pure predicate over the timestamp
/// truncated to minute granularity: identical truncated timestamps always
/// evaluate identically. [`is_met`](RollingCondition::is_met) fires at most
/// once per matching boundary, so a second write within the same matching
/// minute does not rotate again, while the schedule recurring (say, the hour
/// wrapping to the next matching minute) does.
///
/// # Examples
///
/// ```
/// use logtree::append::rolling::CronCondition;
///
/// // the top of every fifth minute
/// let every_five = CronCondition::parse("*/5 * * * *").unwrap();
/// assert!(CronCondition::parse("61 * * * *").is_err());
/// ```
#[derive(Debug)]
pub struct CronCondition {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
    last_fired: Mutex<Option<DateTime>>,
}

impl CronCondition {
    /// Parse a schedule from five whitespace-separated fields.
    ///
    /// # Errors
    ///
    /// Return an error if the field count is wrong, a field is malformed, or
    /// a literal is out of range.
    pub fn parse(expr: &str) -> Result<CronCondition, Error> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return Err(Error::new("cron schedule requires exactly five fields")
                .with_context("schedule", expr.to_string()));
        };
        Self::new(minute, hour, day_of_month, month, day_of_week)
    }

    /// Build a schedule from its five fields.
    pub fn new(
        minute: &str,
        hour: &str,
        day_of_month: &str,
        month: &str,
        day_of_week: &str,
    ) -> Result<CronCondition, Error> {
        Ok(CronCondition {
            minute: CronField::parse(minute, 0, 59, "minute")?,
            hour: CronField::parse(hour, 0, 23, "hour")?,
            day_of_month: CronField::parse(day_of_month, 1, 31, "day-of-month")?,
            month: CronField::parse(month, 1, 12, "month")?,
            day_of_week: CronField::parse(day_of_week, 0, 6, "day-of-week")?,
            last_fired: Mutex::new(None),
        })
    }

    /// Whether the schedule matches the timestamp truncated to its minute.
    pub fn matches(&self, at: &DateTime) -> bool {
        let at = truncate_to_minute(at);
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self
                .day_of_week
                .matches(at.weekday().to_monday_zero_offset())
    }
}

impl RollingCondition for CronCondition {
    fn is_met(&self, now: &DateTime, _filesize: u64) -> bool {
        if !self.matches(now) {
            return false;
        }
        let boundary = truncate_to_minute(now);
        let mut last = self.last_fired.lock().unwrap_or_else(|e| e.into_inner());
        if *last == Some(boundary) {
            false
        } else {
            *last = Some(boundary);
            true
        }
    }

    fn reset(&self, now: &DateTime) {
        let mut last = self.last_fired.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(truncate_to_minute(now));
    }
}

fn truncate_to_minute(at: &DateTime) -> DateTime {
    at.date().at(at.hour(), at.minute(), 0, 0)
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn test_parse_rejects_malformed_fields() {
        assert!(CronCondition::parse("* * * *").is_err());
        assert!(CronCondition::parse("* * * * * *").is_err());
        assert!(CronCondition::parse("sixty * * * *").is_err());
        assert!(CronCondition::parse("60 * * * *").is_err());
        assert!(CronCondition::parse("* 24 * * *").is_err());
        assert!(CronCondition::parse("* * 0 * *").is_err());
        assert!(CronCondition::parse("* * * 13 *").is_err());
        assert!(CronCondition::parse("* * * * 7").is_err());
        assert!(CronCondition::parse("*/0 * * * *").is_err());
    }

    #[test]
    fn test_match_is_idempotent_within_a_minute() {
        let condition = CronCondition::parse("5 * * * *").unwrap();
        let on_the_minute = date(2009, 10, 10).at(12, 5, 0, 0);
        let one_second_in = date(2009, 10, 10).at(12, 5, 1, 0);
        assert!(condition.matches(&on_the_minute));
        assert!(condition.matches(&one_second_in));
        assert!(!condition.matches(&date(2009, 10, 10).at(12, 6, 0, 0)));
    }

    #[test]
    fn test_fires_once_per_matching_minute() {
        // 2009-10-10 is a Saturday, day-of-week 5 with Monday = 0
        let condition = CronCondition::new("*", "*", "*", "*", "5").unwrap();
        assert!(condition.is_met(&date(2009, 10, 10).at(12, 5, 0, 0), 0));
        assert!(!condition.is_met(&date(2009, 10, 10).at(12, 5, 1, 0), 0));
        assert!(condition.is_met(&date(2009, 10, 10).at(13, 5, 1, 0), 0));
    }

    #[test]
    fn test_step_field() {
        let condition = CronCondition::parse("*/15 * * * *").unwrap();
        assert!(condition.matches(&date(2024, 8, 10).at(9, 0, 0, 0)));
        assert!(condition.matches(&date(2024, 8, 10).at(9, 15, 30, 0)));
        assert!(condition.matches(&date(2024, 8, 10).at(9, 45, 0, 0)));
        assert!(!condition.matches(&date(2024, 8, 10).at(9, 16, 0, 0)));
    }

    #[test]
    fn test_day_fields_must_both_match() {
        // 2024-08-12 is a Monday
        let condition = CronCondition::parse("* * 12 * 0").unwrap();
        assert!(condition.matches(&date(2024, 8, 12).at(10, 0, 0, 0)));
        // a Monday that is not the 12th
        assert!(!condition.matches(&date(2024, 8, 19).at(10, 0, 0, 0)));
        // the 12th that is not a Monday
        assert!(!condition.matches(&date(2024, 9, 12).at(10, 0, 0, 0)));
    }

    #[test]
    fn test_hour_and_month_fields() {
        let condition = CronCondition::parse("30 8 * 12 *").unwrap();
        assert!(condition.matches(&date(2024, 12, 25).at(8, 30, 0, 0)));
        assert!(!condition.matches(&date(2024, 11, 25).at(8, 30, 0, 0)));
        assert!(!condition.matches(&date(2024, 12, 25).at(9, 30, 0, 0)));
    }
}

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

use std::fmt;
use std::sync::Mutex;

use jiff::Span;
use jiff::civil::DateTime;

/// A policy deciding when a rolling file appender must rotate.
pub trait RollingCondition: fmt::Debug + Send + Sync + 'static {
    /// Whether the live file must rotate before the next write.
    fn is_met(&self, now: &DateTime, filesize: u64) -> bool;

    /// Observe a completed rotation.
    ///
    /// Default to a no-op.
    fn reset(&self, now: &DateTime) {
        let _ = now;
    }
}

impl<T: RollingCondition> From<T> for Box<dyn RollingCondition> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Rotate when the live file reaches a size threshold.
#[derive(Debug, Clone, Copy)]
pub struct SizeCondition {
    threshold: u64,
}

impl SizeCondition {
    /// Create a condition met at the given file size in bytes.
    pub fn new(threshold: u64) -> SizeCondition {
        SizeCondition { threshold }
    }
}

impl RollingCondition for SizeCondition {
    fn is_met(&self, _now: &DateTime, filesize: u64) -> bool {
        filesize >= self.threshold
    }
}

/// A fixed calendar period for rotating a log file.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum CalendarUnit {
    /// Rotate at the top of every minute.
    Minutely,
    /// Rotate at the top of every hour.
    Hourly,
    /// Rotate at midnight.
    Daily,
}

impl CalendarUnit {
    fn next_boundary(&self, now: &DateTime) -> DateTime {
        let (truncated, span) = match self {
            CalendarUnit::Minutely => (
                now.date().at(now.hour(), now.minute(), 0, 0),
                Span::new().minutes(1),
            ),
            CalendarUnit::Hourly => (now.date().at(now.hour(), 0, 0, 0), Span::new().hours(1)),
            CalendarUnit::Daily => (now.date().at(0, 0, 0, 0), Span::new().days(1)),
        };
        truncated.checked_add(span).unwrap_or(DateTime::MAX)
    }
}

/// Rotate when time crosses a fixed calendar boundary.
///
/// The first observed instant pins the boundary; the condition stays met from
/// the boundary onwards until a rotation completes, so a failed rotation is
/// retried on the next write.
#[derive(Debug)]
pub struct CalendarCondition {
    unit: CalendarUnit,
    next: Mutex<Option<DateTime>>,
}

impl CalendarCondition {
    /// Create a condition rotating at every boundary of the given unit.
    pub fn new(unit: CalendarUnit) -> CalendarCondition {
        CalendarCondition {
            unit,
            next: Mutex::new(None),
        }
    }
}

impl RollingCondition for CalendarCondition {
    fn is_met(&self, now: &DateTime, _filesize: u64) -> bool {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        match *next {
            Some(boundary) => *now >= boundary,
            None => {
                *next = Some(self.unit.next_boundary(now));
                false
            }
        }
    }

    fn reset(&self, now: &DateTime) {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        *next = Some(self.unit.next_boundary(now));
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::date;

    use super::*;

    #[test]
    fn test_size_condition() {
        let condition = SizeCondition::new(1000);
        let now = date(2024, 8, 10).at(17, 12, 52, 0);
        assert!(!condition.is_met(&now, 999));
        assert!(condition.is_met(&now, 1000));
        assert!(condition.is_met(&now, 1001));
    }

    #[test]
    fn test_calendar_boundaries() {
        let now = date(2024, 8, 10).at(17, 12, 52, 0);
        assert_eq!(
            CalendarUnit::Minutely.next_boundary(&now),
            date(2024, 8, 10).at(17, 13, 0, 0)
        );
        assert_eq!(
            CalendarUnit::Hourly.next_boundary(&now),
            date(2024, 8, 10).at(18, 0, 0, 0)
        );
        assert_eq!(
            CalendarUnit::Daily.next_boundary(&now),
            date(2024, 8, 11).at(0, 0, 0, 0)
        );
    }

    #[test]
    fn test_calendar_condition_pins_then_fires() {
        let condition = CalendarCondition::new(CalendarUnit::Hourly);
        let first = date(2024, 8, 10).at(17, 12, 52, 0);
        // the first observation pins the boundary at 18:00
        assert!(!condition.is_met(&first, 0));
        assert!(!condition.is_met(&date(2024, 8, 10).at(17, 59, 59, 0), 0));
        assert!(condition.is_met(&date(2024, 8, 10).at(18, 0, 0, 0), 0));
        // stays met until a rotation completes
        assert!(condition.is_met(&date(2024, 8, 10).at(18, 0, 1, 0), 0));

        let rolled_at = date(2024, 8, 10).at(18, 0, 1, 0);
        condition.reset(&rolled_at);
        assert!(!condition.is_met(&date(2024, 8, 10).at(18, 59, 59, 0), 0));
        assert!(condition.is_met(&date(2024, 8, 10).at(19, 0, 0, 0), 0));
    }
}

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

use std::sync::Arc;
use std::sync::Mutex;

use jiff::Zoned;

/// The time source a rolling appender consults.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// The system clock.
    #[default]
    Default,
    /// A manually driven clock for deterministic tests.
    Manual(ManualClock),
}

impl Clock {
    /// The current time according to this clock.
    pub fn now(&self) -> Zoned {
        match self {
            Clock::Default => Zoned::now(),
            Clock::Manual(clock) => clock.now(),
        }
    }
}

/// A clock that only advances when told to.
///
/// Clones share the same instant, so a test can keep one handle while the
/// appender owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Zoned>>,
}

impl ManualClock {
    /// Create a manual clock frozen at the given instant.
    pub fn new(now: Zoned) -> ManualClock {
        ManualClock {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// The frozen instant.
    pub fn now(&self) -> Zoned {
        self.now.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Move the clock to the given instant.
    pub fn set_now(&self, now: Zoned) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_manual_clock_shares_instant() {
        let start = Zoned::from_str("2024-08-10T00:00:00[UTC]").unwrap();
        let clock = ManualClock::new(start.clone());
        let shared = clock.clone();

        assert_eq!(clock.now(), start);
        let later = Zoned::from_str("2024-08-10T01:00:00[UTC]").unwrap();
        shared.set_now(later.clone());
        assert_eq!(clock.now(), later);
    }
}

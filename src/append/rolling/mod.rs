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

//! A file appender that rotates its file under pluggable conditions.
//!
//! A [`RollingCondition`] decides *when* the live file must rotate; a
//! [`RollingStrategy`] decides *how* existing backups are renamed or
//! discarded. The appender owns the file handle and the rotation state
//! exclusively and serializes all writes and rotations on one internal lock.

mod append;
mod clock;
mod condition;
mod cron;
mod strategy;

pub use self::append::LockModel;
pub use self::append::RollingFile;
pub use self::append::RollingFileBuilder;
pub use self::clock::Clock;
pub use self::clock::ManualClock;
pub use self::condition::CalendarCondition;
pub use self::condition::CalendarUnit;
pub use self::condition::RollingCondition;
pub use self::condition::SizeCondition;
pub use self::cron::CronCondition;
pub use self::strategy::IndexStrategy;
pub use self::strategy::RollingStrategy;

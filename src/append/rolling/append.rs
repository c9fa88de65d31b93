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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use jiff::civil::DateTime;

use crate::Error;
use crate::append::Append;
use crate::append::rolling::Clock;
use crate::append::rolling::IndexStrategy;
use crate::append::rolling::RollingCondition;
use crate::append::rolling::RollingStrategy;
use crate::append::rolling::SizeCondition;
use crate::layout::Layout;
use crate::layout::PatternLayout;
use crate::record::Record;

/// How a rolling file appender holds its file between writes.
///
/// This is an explicit configuration choice with no default: the builder
/// refuses to build until one is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockModel {
    /// Keep one handle open for the appender's whole lifetime between
    /// rotations. Lowest per-write overhead; unsafe when several processes
    /// share one file.
    Exclusive,
    /// Open, append, and close the handle on every write. Safe for
    /// multi-process sharing at a higher I/O cost.
    Minimal,
}

/// A builder to configure and create a [`RollingFile`] appender.
#[derive(Debug)]
pub struct RollingFileBuilder {
    path: PathBuf,
    name: Option<String>,
    layout: Box<dyn Layout>,
    condition: Box<dyn RollingCondition>,
    strategy: Box<dyn RollingStrategy>,
    lock_model: Option<LockModel>,
    clock: Clock,
}

impl RollingFileBuilder {
    /// Create a new rolling file appender builder for the given live path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            layout: Box::new(PatternLayout::default()),
            // never met until a real condition is configured
            condition: Box::new(SizeCondition::new(u64::MAX)),
            strategy: Box::new(IndexStrategy::new(9)),
            lock_model: None,
            clock: Clock::Default,
        }
    }

    /// Set the appender name used in configuration references.
    ///
    /// Default to the display form of the path.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the layout for the logs.
    ///
    /// Default to [`PatternLayout`].
    pub fn layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Set the condition deciding when the live file rotates.
    pub fn condition(mut self, condition: impl Into<Box<dyn RollingCondition>>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Set the strategy renaming backups during rotation.
    ///
    /// Default to [`IndexStrategy`] keeping ten backups.
    pub fn strategy(mut self, strategy: impl Into<Box<dyn RollingStrategy>>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Pick how the file handle is held between writes. Required.
    pub fn lock_model(mut self, lock_model: LockModel) -> Self {
        self.lock_model = Some(lock_model);
        self
    }

    /// Set the time source consulted by the rolling condition.
    ///
    /// Default to the system clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the [`RollingFile`] appender.
    ///
    /// # Errors
    ///
    /// Return an error if no lock model was picked, the log directory cannot
    /// be created, or the live file cannot be opened.
    pub fn build(self) -> Result<RollingFile, Error> {
        let Self {
            path,
            name,
            layout,
            condition,
            strategy,
            lock_model,
            clock,
        } = self;
        let name = name.unwrap_or_else(|| path.display().to_string());
        let lock_model = lock_model.ok_or_else(|| {
            Error::new("rolling file appender requires an explicit lock model")
                .with_context("appender", &name)
        })?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    Error::new("failed to create log directory")
                        .with_context("path", parent.display())
                        .with_source(err)
                })?;
            }
        }

        let appender = RollingFile {
            name,
            path,
            layout,
            condition,
            strategy,
            lock_model,
            clock,
            state: Mutex::new(RollState {
                phase: Phase::Open,
                file: None,
                size: 0,
            }),
            last_roll_error: Mutex::new(None),
        };
        {
            let mut state = appender.state();
            appender.open_live(&mut state)?;
        }
        Ok(appender)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    RollPending,
    Closed,
}

#[derive(Debug)]
struct RollState {
    phase: Phase,
    // held only with LockModel::Exclusive, and never across a rotation
    file: Option<File>,
    size: u64,
}

/// An appender that writes to one live file and rotates it when its
/// condition is met.
///
/// All writes and the whole rotate-then-reopen sequence happen under one
/// internal lock, so a rotation is atomic to every other writer going through
/// this appender, and at most one writable handle exists at any time.
///
/// A failed rotation leaves the appender writing to the over-threshold live
/// file. The failure is reported once per distinct error, and the rotation is
/// retried on the next write rather than in a loop.
///
/// # Examples
///
/// ```no_run
/// use logtree::append::rolling::LockModel;
/// use logtree::append::rolling::RollingFileBuilder;
/// use logtree::append::rolling::SizeCondition;
///
/// let appender = RollingFileBuilder::new("logs/app.log")
///     .condition(SizeCondition::new(1024 * 1024))
///     .lock_model(LockModel::Exclusive)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct RollingFile {
    name: String,
    path: PathBuf,
    layout: Box<dyn Layout>,
    condition: Box<dyn RollingCondition>,
    strategy: Box<dyn RollingStrategy>,
    lock_model: LockModel,
    clock: Clock,
    state: Mutex<RollState>,
    last_roll_error: Mutex<Option<String>>,
}

impl RollingFile {
    /// The live path this appender writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> MutexGuard<'_, RollState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn open_options() -> OpenOptions {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        options
    }

    fn live_size(&self, fallback: u64) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(fallback)
    }

    /// Open the live path, writing the layout header when the file is fresh.
    fn open_live(&self, state: &mut RollState) -> Result<(), Error> {
        let fresh = self.live_size(0) == 0;
        let mut file = Self::open_options().open(&self.path).map_err(|err| {
            Error::new("failed to open log file")
                .with_context("path", self.path.display())
                .with_source(err)
        })?;
        if fresh {
            if let Some(header) = self.layout.header() {
                file.write_all(&header).map_err(Error::from_io_error)?;
            }
        }
        state.size = self.live_size(0);
        state.file = match self.lock_model {
            LockModel::Exclusive => Some(file),
            LockModel::Minimal => None,
        };
        Ok(())
    }

    fn write_bytes(&self, state: &mut RollState, bytes: &[u8]) -> Result<(), Error> {
        match self.lock_model {
            LockModel::Exclusive => {
                let Some(file) = state.file.as_mut() else {
                    return Err(Error::new("no live file handle")
                        .with_context("appender", &self.name));
                };
                file.write_all(bytes).map_err(Error::from_io_error)?;
                state.size += bytes.len() as u64;
            }
            LockModel::Minimal => {
                let mut file = Self::open_options().open(&self.path).map_err(|err| {
                    Error::new("failed to open log file")
                        .with_context("path", self.path.display())
                        .with_source(err)
                })?;
                file.write_all(bytes).map_err(Error::from_io_error)?;
                // other processes may have appended too; trust the filesystem
                state.size = self.live_size(state.size + bytes.len() as u64);
            }
        }
        Ok(())
    }

    /// Rotate and reopen. The caller holds the state lock for the whole
    /// sequence, so no writer can observe the gap between the two.
    fn try_roll(&self, state: &mut RollState, now: &DateTime) -> Result<(), Error> {
        if let Some(mut file) = state.file.take() {
            let _ = file.flush();
        }
        match self.strategy.roll(&self.path) {
            Ok(()) => {
                self.condition.reset(now);
                self.open_live(state)?;
                state.phase = Phase::Open;
                let mut last = self.last_roll_error.lock().unwrap_or_else(|e| e.into_inner());
                *last = None;
                Ok(())
            }
            Err(err) => {
                // keep writing to the over-threshold live file
                if self.lock_model == LockModel::Exclusive {
                    if let Ok(file) = Self::open_options().open(&self.path) {
                        state.size = self.live_size(state.size);
                        state.file = Some(file);
                    }
                }
                Err(err)
            }
        }
    }

    /// Report a rotation failure at most once per distinct error.
    fn note_roll_error(&self, err: Error) -> Result<(), Error> {
        let message = err.to_string();
        let mut last = self.last_roll_error.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(message.as_str()) {
            Ok(())
        } else {
            *last = Some(message);
            Err(err)
        }
    }
}

impl Append for RollingFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        let bytes = self.layout.format(record)?;
        let mut state = self.state();
        if state.phase == Phase::Closed {
            return Err(Error::new("appender is closed").with_context("appender", &self.name));
        }
        let now = self.clock.now().datetime();

        if state.phase == Phase::RollPending {
            if let Err(err) = self.try_roll(&mut state, &now) {
                self.note_roll_error(err)?;
            }
        }

        self.write_bytes(&mut state, &bytes)?;

        if state.phase == Phase::Open && self.condition.is_met(&now, state.size) {
            state.phase = Phase::RollPending;
            if let Err(err) = self.try_roll(&mut state, &now) {
                self.note_roll_error(err)?;
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), Error> {
        let mut state = self.state();
        match state.file.as_mut() {
            Some(file) => file.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = self.state();
        if state.phase == Phase::Closed {
            return Ok(());
        }
        if let Some(footer) = self.layout.footer() {
            self.write_bytes(&mut state, &footer)?;
        }
        if let Some(mut file) = state.file.take() {
            file.flush().map_err(Error::from_io_error)?;
        }
        state.phase = Phase::Closed;
        Ok(())
    }
}

impl Drop for RollingFile {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use jiff::Zoned;
    use tempfile::TempDir;

    use super::*;
    use crate::append::rolling::CalendarCondition;
    use crate::append::rolling::CalendarUnit;
    use crate::append::rolling::ManualClock;
    use crate::level::Level;

    fn plain_layout() -> PatternLayout {
        PatternLayout::new("%m%n").unwrap()
    }

    fn log_line(appender: &RollingFile, text: &str) {
        appender
            .append(&Record::builder(Level::INFO, text.to_string()).build())
            .unwrap();
    }

    #[test]
    fn test_size_rolling_produces_indexed_backups() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("app.log");
        let appender = RollingFileBuilder::new(&live)
            .layout(plain_layout())
            .condition(SizeCondition::new(32))
            .strategy(IndexStrategy::new(5))
            .lock_model(LockModel::Exclusive)
            .build()
            .unwrap();

        // each line is 16 bytes; two lines reach the 32-byte threshold
        for _ in 0..6 {
            log_line(&appender, "015 bytes long.");
        }
        appender.close().unwrap();

        assert!(live.exists());
        assert!(dir.path().join("app.log.0").exists());
        assert!(dir.path().join("app.log.1").exists());
        assert!(dir.path().join("app.log.2").exists());
        assert!(!dir.path().join("app.log.3").exists());

        let backup = fs::read_to_string(dir.path().join("app.log.0")).unwrap();
        assert_eq!(backup.lines().count(), 2);
    }

    #[test]
    fn test_minimal_matches_exclusive_output() {
        let dir = TempDir::new().unwrap();
        let mut outputs = vec![];
        for (stem, lock_model) in [("a.log", LockModel::Exclusive), ("b.log", LockModel::Minimal)]
        {
            let live = dir.path().join(stem);
            let appender = RollingFileBuilder::new(&live)
                .layout(plain_layout())
                .lock_model(lock_model)
                .build()
                .unwrap();
            log_line(&appender, "first");
            log_line(&appender, "second");
            appender.close().unwrap();
            outputs.push(fs::read_to_string(&live).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[0], "first\nsecond\n");
    }

    #[test]
    fn test_calendar_rolling_with_manual_clock() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("app.log");
        let clock = ManualClock::new(Zoned::from_str("2024-08-10T10:59:58[UTC]").unwrap());
        let appender = RollingFileBuilder::new(&live)
            .layout(plain_layout())
            .condition(CalendarCondition::new(CalendarUnit::Hourly))
            .strategy(IndexStrategy::new(3))
            .lock_model(LockModel::Exclusive)
            .clock(Clock::Manual(clock.clone()))
            .build()
            .unwrap();

        log_line(&appender, "before the hour");
        clock.set_now(Zoned::from_str("2024-08-10T11:00:01[UTC]").unwrap());
        log_line(&appender, "crosses the hour");
        log_line(&appender, "after the roll");
        appender.close().unwrap();

        let backup = fs::read_to_string(dir.path().join("app.log.0")).unwrap();
        assert_eq!(backup, "before the hour\ncrosses the hour\n");
        let current = fs::read_to_string(&live).unwrap();
        assert_eq!(current, "after the roll\n");
    }

    #[test]
    fn test_requires_explicit_lock_model() {
        let dir = TempDir::new().unwrap();
        let err = RollingFileBuilder::new(dir.path().join("app.log"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("lock model"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let appender = RollingFileBuilder::new(dir.path().join("app.log"))
            .layout(plain_layout())
            .lock_model(LockModel::Minimal)
            .build()
            .unwrap();
        appender.close().unwrap();
        appender.close().unwrap();
        assert!(
            appender
                .append(&Record::builder(Level::INFO, "late").build())
                .is_err()
        );
    }
}

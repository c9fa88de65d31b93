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

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::append::Append;
use crate::diagnostic::ThreadContext;
use crate::kv::Properties;
use crate::kv::str_value;
use crate::level::Level;
use crate::logger::Repository;
use crate::record::Record;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// A named node in the logger hierarchy.
///
/// Loggers are created through [`Repository::logger`] and live as long as
/// their repository, so applications can cache the returned handle. A logger
/// without an assigned level inherits the nearest ancestor's; the computed
/// value is cached and invalidated whenever any level in the repository
/// changes.
///
/// # Examples
///
/// ```
/// use logtree::Level;
/// use logtree::Repository;
///
/// let repo = Repository::new();
/// let logger = repo.logger("db.pool");
/// assert!(logger.is_enabled_for(&Level::INFO));
/// logger.info("pool ready");
/// ```
pub struct Logger {
    name: Arc<str>,
    repo: Weak<Repository>,
    parent: Option<Arc<Logger>>,
    level: RwLock<Option<Level>>,
    appenders: RwLock<Vec<Arc<dyn Append>>>,
    additive: AtomicBool,
    // effective level stamped with the repository configuration generation
    effective: RwLock<Option<(u64, Level)>>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &*self.level.read().unwrap_or_else(|e| e.into_inner()))
            .field("additive", &self.additive())
            .finish_non_exhaustive()
    }
}

impl Logger {
    pub(crate) fn new(
        name: &str,
        repo: Weak<Repository>,
        parent: Option<Arc<Logger>>,
        level: Option<Level>,
    ) -> Logger {
        Logger {
            name: Arc::from(name),
            repo,
            parent,
            level: RwLock::new(level),
            appenders: RwLock::new(vec![]),
            additive: AtomicBool::new(true),
            effective: RwLock::new(None),
        }
    }

    /// The dotted name of this logger.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent logger, if this is not the root.
    pub fn parent(&self) -> Option<&Arc<Logger>> {
        self.parent.as_ref()
    }

    /// The level assigned directly to this logger, if any.
    pub fn level(&self) -> Option<Level> {
        self.level.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Assign a level, or clear it to inherit from the ancestors again.
    ///
    /// Changing any level invalidates the cached effective levels of the
    /// whole repository.
    pub fn set_level(&self, level: Option<Level>) {
        *self.level.write().unwrap_or_else(|e| e.into_inner()) = level;
        if let Some(repo) = self.repo.upgrade() {
            repo.bump_generation();
        }
    }

    /// Whether records also propagate to the ancestors' appenders.
    pub fn additive(&self) -> bool {
        self.additive.load(Ordering::Acquire)
    }

    /// Set whether records also propagate to the ancestors' appenders.
    pub fn set_additive(&self, additive: bool) {
        self.additive.store(additive, Ordering::Release);
    }

    /// Attach an appender. The same instance may be attached to several
    /// loggers.
    pub fn add_appender(&self, appender: Arc<dyn Append>) {
        self.appenders
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(appender);
    }

    /// Detach the appender with the given name.
    pub fn remove_appender(&self, name: &str) -> Option<Arc<dyn Append>> {
        let mut appenders = self.appenders.write().unwrap_or_else(|e| e.into_inner());
        let position = appenders.iter().position(|a| a.name() == name)?;
        Some(appenders.remove(position))
    }

    /// Detach every appender, returning them in attachment order.
    pub fn clear_appenders(&self) -> Vec<Arc<dyn Append>> {
        let mut appenders = self.appenders.write().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *appenders)
    }

    /// A snapshot of the attached appenders in attachment order.
    pub fn appenders(&self) -> Vec<Arc<dyn Append>> {
        self.appenders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The level governing this logger: its own, or the nearest assigned
    /// ancestor's up to the root.
    pub fn effective_level(&self) -> Level {
        let generation = match self.repo.upgrade() {
            Some(repo) => repo.generation(),
            None => 0,
        };
        {
            let cached = self.effective.read().unwrap_or_else(|e| e.into_inner());
            if let Some((stamp, level)) = cached.as_ref() {
                if *stamp == generation {
                    return level.clone();
                }
            }
        }
        let level = self.compute_effective_level();
        let mut cached = self.effective.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some((generation, level.clone()));
        level
    }

    fn compute_effective_level(&self) -> Level {
        let mut node = Some(self);
        while let Some(current) = node {
            if let Some(level) = current.level() {
                return level;
            }
            node = current.parent.as_deref();
        }
        // the root always carries a level; reachable only for a detached node
        Level::DEBUG
    }

    /// Whether a record at the given level would be dispatched.
    pub fn is_enabled_for(&self, level: &Level) -> bool {
        level.value() >= self.effective_level().value()
    }

    /// Emit a record at the given level.
    pub fn log(&self, level: Level, message: impl Into<Cow<'static, str>>) {
        if !self.is_enabled_for(&level) {
            return;
        }
        self.dispatch(Record::builder(level, message).build());
    }

    /// Emit a record at the given level, attaching an application error.
    pub fn log_error<E>(&self, level: Level, message: impl Into<Cow<'static, str>>, error: E)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.is_enabled_for(&level) {
            return;
        }
        self.dispatch(Record::builder(level, message).error(error).build());
    }

    /// Emit a pre-built record.
    ///
    /// The record's level still gates dispatch; its logger name, context, and
    /// property scopes are filled in as with any other emission.
    pub fn log_record(&self, record: Record) {
        if !self.is_enabled_for(record.level()) {
            return;
        }
        self.dispatch(record);
    }

    /// Emit a record at [`Level::TRACE`].
    pub fn trace(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::TRACE, message);
    }

    /// Emit a record at [`Level::DEBUG`].
    pub fn debug(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::DEBUG, message);
    }

    /// Emit a record at [`Level::INFO`].
    pub fn info(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::INFO, message);
    }

    /// Emit a record at [`Level::WARN`].
    pub fn warn(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::WARN, message);
    }

    /// Emit a record at [`Level::ERROR`].
    pub fn error(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::ERROR, message);
    }

    /// Emit a record at [`Level::ERROR`], attaching an application error.
    pub fn error_with<E>(&self, message: impl Into<Cow<'static, str>>, error: E)
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.log_error(Level::ERROR, message, error);
    }

    /// Emit a record at [`Level::FATAL`].
    pub fn fatal(&self, message: impl Into<Cow<'static, str>>) {
        self.log(Level::FATAL, message);
    }

    fn dispatch(&self, record: Record) {
        let record = self.enrich(record);
        self.call_appenders(&record);
    }

    /// Stamp the record with this logger's name and capture the repository
    /// and thread scopes. Per-record properties win name collisions; thread
    /// values beat repository values.
    fn enrich(&self, mut record: Record) -> Record {
        record.set_logger(self.name.clone());

        let mut properties = Properties::new();
        if let Some(repo) = self.repo.upgrade() {
            for (key, value) in repo.properties() {
                properties.set(key, str_value(&value));
            }
        }
        for (key, value) in ThreadContext::snapshot_map() {
            properties.set(key, str_value(&value));
        }
        for (key, value) in record.properties().iter() {
            properties.set(key, value.clone());
        }
        record.set_properties(properties);

        if record.context().is_empty() {
            let stack = ThreadContext::snapshot_stack();
            if !stack.is_empty() {
                record.set_context(Arc::from(stack));
            }
        }
        record
    }

    /// Fan the record out along the additive ancestor chain, isolating each
    /// appender's failure from its siblings and from the caller.
    fn call_appenders(&self, record: &Record) {
        let trap: Arc<dyn Trap> = match self.repo.upgrade() {
            Some(repo) => repo.trap(),
            None => Arc::new(DefaultTrap::default()),
        };

        let mut node: Option<&Logger> = Some(self);
        while let Some(current) = node {
            let appenders = current.appenders();
            for appender in &appenders {
                if let Err(err) = appender.append(record) {
                    let err = Error::new("failed to append record")
                        .with_context("logger", current.name())
                        .with_context("appender", appender.name())
                        .with_source(err);
                    trap.trap(&err);
                }
            }
            if !current.additive() {
                break;
            }
            node = current.parent.as_deref();
        }
    }
}

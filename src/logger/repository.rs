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

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::append::Append;
use crate::config::Diag;
use crate::level::Level;
use crate::level::LevelMap;
use crate::logger::Logger;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

type Listener = Box<dyn Fn(&[Diag]) + Send + Sync>;

/// Owns the logger tree, the level map, and the repository-wide properties.
///
/// One repository is typically created per application or module boundary.
/// Reconfiguration mutates levels and appender assignments in place, so
/// `Arc<Logger>` handles handed out earlier stay valid.
///
/// # Examples
///
/// ```
/// use logtree::Level;
/// use logtree::Repository;
///
/// let repo = Repository::new();
/// repo.root().set_level(Some(Level::INFO));
///
/// let logger = repo.logger("db.pool.conn");
/// assert_eq!(logger.effective_level(), Level::INFO);
/// ```
pub struct Repository {
    root: Arc<Logger>,
    loggers: RwLock<HashMap<String, Arc<Logger>>>,
    levels: RwLock<LevelMap>,
    properties: RwLock<Vec<(String, String)>>,
    generation: AtomicU64,
    configured: AtomicBool,
    trap: RwLock<Arc<dyn Trap>>,
    listeners: Mutex<Vec<Listener>>,
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("configured", &self.is_configured())
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a repository whose root logger starts at [`Level::DEBUG`].
    pub fn new() -> Arc<Repository> {
        Arc::new_cyclic(|weak| Repository {
            root: Arc::new(Logger::new("root", weak.clone(), None, Some(Level::DEBUG))),
            loggers: RwLock::new(HashMap::new()),
            levels: RwLock::new(LevelMap::new()),
            properties: RwLock::new(vec![]),
            generation: AtomicU64::new(0),
            configured: AtomicBool::new(false),
            trap: RwLock::new(Arc::new(DefaultTrap::default())),
            listeners: Mutex::new(vec![]),
        })
    }

    /// The root logger. It always carries a level.
    pub fn root(&self) -> Arc<Logger> {
        self.root.clone()
    }

    /// Return the logger with the given dotted name, creating it and any
    /// missing ancestors on first use.
    ///
    /// The empty name denotes the root logger. Lookups are idempotent and
    /// safe under concurrent first use: every caller observes the same node
    /// for a given name.
    pub fn logger(self: &Arc<Self>, name: &str) -> Arc<Logger> {
        if name.is_empty() {
            return self.root();
        }
        {
            let loggers = self.loggers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(logger) = loggers.get(name) {
                return logger.clone();
            }
        }
        let mut loggers = self.loggers.write().unwrap_or_else(|e| e.into_inner());
        self.ensure_locked(&mut loggers, name)
    }

    fn ensure_locked(
        self: &Arc<Self>,
        loggers: &mut HashMap<String, Arc<Logger>>,
        name: &str,
    ) -> Arc<Logger> {
        if let Some(logger) = loggers.get(name) {
            return logger.clone();
        }
        let parent = match name.rfind('.') {
            Some(split) => self.ensure_locked(loggers, &name[..split]),
            None => self.root(),
        };
        let logger = Arc::new(Logger::new(name, Arc::downgrade(self), Some(parent), None));
        loggers.insert(name.to_string(), logger.clone());
        logger
    }

    /// Every logger created so far, the root included.
    pub fn all_loggers(&self) -> Vec<Arc<Logger>> {
        let loggers = self.loggers.read().unwrap_or_else(|e| e.into_inner());
        let mut all = Vec::with_capacity(loggers.len() + 1);
        all.push(self.root());
        all.extend(loggers.values().cloned());
        all
    }

    /// The configuration generation. Bumped on every level mutation so
    /// cached effective levels know to recompute.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Register a custom level in the repository's level map.
    pub fn register_level(&self, level: Level) {
        self.levels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(level);
    }

    /// Resolve a level name, ignoring ASCII case.
    pub fn resolve_level(&self, name: &str) -> Option<Level> {
        self.levels.read().unwrap_or_else(|e| e.into_inner()).get(name)
    }

    /// Resolve a level name, falling back to the supplied default.
    pub fn resolve_level_or(&self, name: &str, default: &Level) -> Level {
        self.levels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get_or(name, default)
    }

    /// Set a repository-wide property, visible in every record's property
    /// bag unless shadowed by a thread-scoped or per-record value.
    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let mut properties = self.properties.write().unwrap_or_else(|e| e.into_inner());
        match properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value.into(),
            None => properties.push((key, value.into())),
        }
    }

    /// A snapshot of the repository-wide properties.
    pub fn properties(&self) -> Vec<(String, String)> {
        self.properties
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The trap receiving errors the dispatch pipeline swallows.
    pub fn trap(&self) -> Arc<dyn Trap> {
        self.trap.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Inject a trap. Useful for tests asserting on swallowed errors.
    pub fn set_trap(&self, trap: impl Trap) {
        *self.trap.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(trap);
    }

    /// Whether a configuration has been applied.
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::Acquire)
    }

    pub(crate) fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::Release);
    }

    /// Register a listener fired after each configuration apply with the
    /// diagnostic messages it produced.
    pub fn on_configuration_changed(&self, listener: impl Fn(&[Diag]) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    pub(crate) fn notify_configuration_changed(&self, diags: &[Diag]) {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(diags);
        }
    }

    /// Flush and close every attached appender exactly once.
    ///
    /// An appender shared between loggers is closed a single time; appenders
    /// already closed elsewhere tolerate the call.
    pub fn shutdown(&self) {
        let trap = self.trap();
        let mut seen: Vec<*const ()> = vec![];
        for logger in self.all_loggers() {
            for appender in logger.appenders() {
                let identity = Arc::as_ptr(&appender) as *const ();
                if seen.contains(&identity) {
                    continue;
                }
                seen.push(identity);
                if let Err(err) = appender.flush() {
                    trap.trap(
                        &Error::new("failed to flush appender during shutdown")
                            .with_context("appender", appender.name())
                            .with_source(err),
                    );
                }
                if let Err(err) = appender.close() {
                    trap.trap(
                        &Error::new("failed to close appender during shutdown")
                            .with_context("appender", appender.name())
                            .with_source(err),
                    );
                }
            }
        }
    }
}

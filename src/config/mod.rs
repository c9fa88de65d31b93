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

//! Applying externally produced configuration graphs.
//!
//! The runtime does not parse any configuration syntax. An external
//! configurator (XML, JSON, attributes, code) produces the structures in this
//! module; [`configure`] applies them to a repository in place and reports
//! what went wrong as a list of [`Diag`] messages instead of aborting.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::logger::Repository;

mod registry;

pub use self::registry::Registry;

/// Severity of a configuration diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The configuration item was applied with a fallback.
    Warning,
    /// The configuration item was skipped.
    Error,
}

/// One message produced while applying a configuration.
#[derive(Debug, Clone)]
pub struct Diag {
    /// How severe the problem is.
    pub severity: Severity,
    /// A human-readable description.
    pub message: String,
}

impl Diag {
    fn warning(message: impl Into<String>) -> Diag {
        Diag {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Diag {
        Diag {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// A custom level registration.
#[derive(Debug, Clone)]
pub struct LevelSpec {
    /// The level name.
    pub name: String,
    /// The numeric severity value.
    pub value: i32,
}

/// Parameters for instantiating one appender.
///
/// Which fields matter depends on the appender kind; unknown combinations are
/// simply ignored by the constructor.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Live file path for file-backed appenders.
    pub path: Option<PathBuf>,
    /// Conversion pattern for the layout.
    pub pattern: Option<String>,
    /// Rolling condition: `minutely`, `hourly`, `daily`, `size:<bytes>`, or
    /// `cron:<five fields>`.
    pub condition: Option<String>,
    /// Lock model for rolling files: `exclusive` or `minimal`.
    pub lock_model: Option<String>,
    /// Highest backup index kept by the rolling strategy.
    pub max_index: Option<u32>,
    /// Target address for datagram appenders.
    pub address: Option<String>,
    /// Queue bound for async appenders.
    pub capacity: Option<usize>,
    /// Names of previously declared appenders, for composite kinds.
    pub targets: Vec<String>,
}

/// One appender declaration: a kind name plus its parameters.
#[derive(Debug, Clone)]
pub struct AppenderSpec {
    /// The name other declarations refer to this appender by.
    pub name: String,
    /// The registered kind, e.g. `"rolling-file"`.
    pub kind: String,
    /// Kind-specific parameters.
    pub params: Params,
}

/// One logger declaration.
#[derive(Debug, Clone, Default)]
pub struct LoggerSpec {
    /// The dotted logger name; empty denotes the root.
    pub name: String,
    /// A level name resolved against the repository's level map.
    pub level: Option<String>,
    /// Whether records propagate to ancestor appenders.
    pub additive: Option<bool>,
    /// Names of appenders to attach, replacing the current assignment.
    pub appenders: Vec<String>,
}

/// The object graph an external configurator hands to the runtime.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Repository-wide properties.
    pub properties: Vec<(String, String)>,
    /// Custom level registrations.
    pub levels: Vec<LevelSpec>,
    /// Appender declarations, instantiated in order.
    pub appenders: Vec<AppenderSpec>,
    /// Logger declarations.
    pub loggers: Vec<LoggerSpec>,
}

/// Apply a configuration to the repository in place.
///
/// Faults never abort the whole apply: an unresolvable level name falls back
/// to inheritance with a warning, a bad appender declaration is skipped with
/// an error, and everything else still takes effect. Existing `Arc<Logger>`
/// handles stay valid throughout.
///
/// Returns the diagnostics, which are also delivered to the repository's
/// configuration-changed listeners.
pub fn configure(repo: &Arc<Repository>, config: &Config, registry: &Registry) -> Vec<Diag> {
    let mut diags = vec![];

    for (key, value) in &config.properties {
        repo.set_property(key.clone(), value.clone());
    }

    for level in &config.levels {
        repo.register_level(crate::level::Level::new(level.value, level.name.clone()));
    }

    let mut built: Vec<(String, Arc<dyn crate::append::Append>)> = vec![];
    for spec in &config.appenders {
        if built.iter().any(|(name, _)| *name == spec.name) {
            diags.push(Diag::warning(format!(
                "duplicate appender name {:?} ignored",
                spec.name
            )));
            continue;
        }
        match registry.build(spec, &built) {
            Ok(appender) => built.push((spec.name.clone(), appender)),
            Err(err) => diags.push(Diag::error(format!(
                "appender {:?} skipped: {err}",
                spec.name
            ))),
        }
    }

    for spec in &config.loggers {
        let logger = repo.logger(&spec.name);
        if let Some(level_name) = &spec.level {
            match repo.resolve_level(level_name) {
                Some(level) => logger.set_level(Some(level)),
                None => diags.push(Diag::warning(format!(
                    "unknown level {:?} on logger {:?}; level left unassigned",
                    level_name, spec.name
                ))),
            }
        }
        if let Some(additive) = spec.additive {
            logger.set_additive(additive);
        }
        logger.clear_appenders();
        for appender_name in &spec.appenders {
            match built.iter().find(|(name, _)| name == appender_name) {
                Some((_, appender)) => logger.add_appender(appender.clone()),
                None => diags.push(Diag::error(format!(
                    "logger {:?} references undeclared appender {:?}",
                    spec.name, appender_name
                ))),
            }
        }
    }

    repo.set_configured(true);
    repo.bump_generation();
    repo.notify_configuration_changed(&diags);
    diags
}

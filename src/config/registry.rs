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
use std::sync::Arc;

use crate::Error;
use crate::append::Append;
use crate::append::AsyncBuilder;
use crate::append::DatagramBuilder;
use crate::append::FileBuilder;
use crate::append::ForwardAppender;
use crate::append::MemoryAppender;
use crate::append::RollingFileBuilder;
use crate::append::rolling::CalendarCondition;
use crate::append::rolling::CalendarUnit;
use crate::append::rolling::CronCondition;
use crate::append::rolling::IndexStrategy;
use crate::append::rolling::LockModel;
use crate::append::rolling::RollingCondition;
use crate::config::AppenderSpec;
use crate::layout::Layout;
use crate::layout::PatternLayout;

/// Appenders already instantiated during this apply, in declaration order.
type Built = [(String, Arc<dyn Append>)];

/// A constructor turning one declaration into an appender.
type Constructor = Box<dyn Fn(&AppenderSpec, &Built) -> Result<Arc<dyn Append>, Error> + Send + Sync>;

/// Maps appender kind names to constructors.
///
/// The built-in kinds are `file`, `rolling-file`, `memory`, `datagram`,
/// `forward`, and `async`. Custom kinds can be registered; there is no
/// reflection involved, a kind is just a name bound to a function.
///
/// # Examples
///
/// ```
/// use logtree::config::Registry;
///
/// let registry = Registry::new();
/// assert!(registry.knows("rolling-file"));
/// assert!(!registry.knows("carrier-pigeon"));
/// ```
pub struct Registry {
    constructors: HashMap<String, Constructor>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with the built-in kinds registered.
    pub fn new() -> Registry {
        let mut registry = Registry {
            constructors: HashMap::new(),
        };
        registry.register("file", |spec, _| build_file(spec));
        registry.register("rolling-file", |spec, _| build_rolling_file(spec));
        registry.register("memory", |spec, _| {
            Ok(Arc::new(MemoryAppender::new(spec.name.clone())))
        });
        registry.register("datagram", |spec, _| build_datagram(spec));
        registry.register("forward", build_forward);
        registry.register("async", build_async);
        registry
    }

    /// Bind a kind name to a constructor, replacing any previous binding.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        constructor: impl Fn(&AppenderSpec, &Built) -> Result<Arc<dyn Append>, Error>
        + Send
        + Sync
        + 'static,
    ) {
        self.constructors.insert(kind.into(), Box::new(constructor));
    }

    /// Whether a kind name is bound.
    pub fn knows(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Instantiate an appender from its declaration.
    ///
    /// # Errors
    ///
    /// Return an error for an unknown kind or when the constructor rejects
    /// the parameters.
    pub fn build(&self, spec: &AppenderSpec, built: &Built) -> Result<Arc<dyn Append>, Error> {
        let constructor = self.constructors.get(&spec.kind).ok_or_else(|| {
            Error::new("unknown appender kind").with_context("kind", &spec.kind)
        })?;
        constructor(spec, built)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("Registry").field("kinds", &kinds).finish()
    }
}

fn layout_from(spec: &AppenderSpec) -> Result<Box<dyn Layout>, Error> {
    match &spec.params.pattern {
        Some(pattern) => Ok(Box::new(PatternLayout::new(pattern.clone())?)),
        None => Ok(Box::new(PatternLayout::default())),
    }
}

fn build_file(spec: &AppenderSpec) -> Result<Arc<dyn Append>, Error> {
    let path = spec
        .params
        .path
        .as_ref()
        .ok_or_else(|| Error::new("file appender requires a path"))?;
    let appender = FileBuilder::new(path)
        .name(spec.name.clone())
        .layout(layout_from(spec)?)
        .build()?;
    Ok(Arc::new(appender))
}

fn build_rolling_file(spec: &AppenderSpec) -> Result<Arc<dyn Append>, Error> {
    let path = spec
        .params
        .path
        .as_ref()
        .ok_or_else(|| Error::new("rolling file appender requires a path"))?;
    let mut builder = RollingFileBuilder::new(path)
        .name(spec.name.clone())
        .layout(layout_from(spec)?);
    if let Some(condition) = &spec.params.condition {
        builder = builder.condition(parse_condition(condition)?);
    }
    if let Some(max_index) = spec.params.max_index {
        builder = builder.strategy(IndexStrategy::new(max_index));
    }
    let lock_model = spec
        .params
        .lock_model
        .as_deref()
        .ok_or_else(|| Error::new("rolling file appender requires an explicit lock model"))?;
    builder = builder.lock_model(parse_lock_model(lock_model)?);
    Ok(Arc::new(builder.build()?))
}

fn build_datagram(spec: &AppenderSpec) -> Result<Arc<dyn Append>, Error> {
    let address = spec
        .params
        .address
        .as_ref()
        .ok_or_else(|| Error::new("datagram appender requires a target address"))?;
    let appender = DatagramBuilder::new(spec.name.clone())
        .layout(layout_from(spec)?)
        .build(address.as_str())?;
    Ok(Arc::new(appender))
}

fn build_forward(spec: &AppenderSpec, built: &Built) -> Result<Arc<dyn Append>, Error> {
    let targets = resolve_targets(spec, built)?;
    Ok(Arc::new(ForwardAppender::from_targets(
        spec.name.clone(),
        targets,
    )))
}

fn build_async(spec: &AppenderSpec, built: &Built) -> Result<Arc<dyn Append>, Error> {
    let mut builder = AsyncBuilder::new(spec.name.clone());
    for target in resolve_targets(spec, built)? {
        builder = builder.target(target);
    }
    if let Some(capacity) = spec.params.capacity {
        builder = builder.buffered_records_limit(capacity);
    }
    Ok(Arc::new(builder.build()))
}

fn resolve_targets(spec: &AppenderSpec, built: &Built) -> Result<Vec<Arc<dyn Append>>, Error> {
    if spec.params.targets.is_empty() {
        return Err(Error::new("composite appender requires at least one target"));
    }
    let mut targets = vec![];
    for name in &spec.params.targets {
        let target = built
            .iter()
            .find(|(built_name, _)| built_name == name)
            .map(|(_, appender)| appender.clone())
            .ok_or_else(|| {
                Error::new("composite appender references an undeclared target")
                    .with_context("target", name)
            })?;
        targets.push(target);
    }
    Ok(targets)
}

fn parse_condition(text: &str) -> Result<Box<dyn RollingCondition>, Error> {
    if let Some(size) = text.strip_prefix("size:") {
        let bytes: u64 = size.trim().parse().map_err(|_| {
            Error::new("malformed size threshold").with_context("condition", text)
        })?;
        return Ok(Box::new(crate::append::rolling::SizeCondition::new(bytes)));
    }
    if let Some(schedule) = text.strip_prefix("cron:") {
        return Ok(Box::new(CronCondition::parse(schedule.trim())?));
    }
    let unit = match text {
        "minutely" => CalendarUnit::Minutely,
        "hourly" => CalendarUnit::Hourly,
        "daily" => CalendarUnit::Daily,
        other => {
            return Err(Error::new("unknown rolling condition").with_context("condition", other));
        }
    };
    Ok(Box::new(CalendarCondition::new(unit)))
}

fn parse_lock_model(text: &str) -> Result<LockModel, Error> {
    match text {
        "exclusive" => Ok(LockModel::Exclusive),
        "minimal" => Ok(LockModel::Minimal),
        other => Err(Error::new("unknown lock model").with_context("lock_model", other)),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::Params;

    fn spec(name: &str, kind: &str, params: Params) -> AppenderSpec {
        AppenderSpec {
            name: name.to_string(),
            kind: kind.to_string(),
            params,
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let registry = Registry::new();
        let err = registry
            .build(&spec("x", "carrier-pigeon", Params::default()), &[])
            .unwrap_err();
        assert!(err.to_string().contains("unknown appender kind"));
    }

    #[test]
    fn test_custom_kind_registration() {
        let mut registry = Registry::new();
        registry.register("blackhole", |spec, _| {
            Ok(Arc::new(MemoryAppender::new(spec.name.clone())))
        });
        assert!(registry.knows("blackhole"));
        assert!(
            registry
                .build(&spec("sink", "blackhole", Params::default()), &[])
                .is_ok()
        );
    }

    #[test]
    fn test_rolling_file_requires_lock_model() {
        let dir = TempDir::new().unwrap();
        let registry = Registry::new();
        let params = Params {
            path: Some(dir.path().join("app.log")),
            condition: Some("daily".to_string()),
            ..Params::default()
        };
        let err = registry
            .build(&spec("roll", "rolling-file", params), &[])
            .unwrap_err();
        assert!(err.to_string().contains("lock model"));
    }

    #[test]
    fn test_condition_parsing() {
        assert!(parse_condition("size:1024").is_ok());
        assert!(parse_condition("cron:*/5 * * * *").is_ok());
        assert!(parse_condition("hourly").is_ok());
        assert!(parse_condition("size:lots").is_err());
        assert!(parse_condition("cron:* * *").is_err());
        assert!(parse_condition("fortnightly").is_err());
    }

    #[test]
    fn test_forward_resolves_declared_targets_in_order() {
        let registry = Registry::new();
        let events = registry
            .build(&spec("events", "memory", Params::default()), &[])
            .unwrap();
        let built = vec![("events".to_string(), events)];

        let params = Params {
            targets: vec!["events".to_string()],
            ..Params::default()
        };
        assert!(registry.build(&spec("tee", "forward", params), &built).is_ok());

        let params = Params {
            targets: vec!["missing".to_string()],
            ..Params::default()
        };
        assert!(registry.build(&spec("tee", "forward", params), &built).is_err());
    }
}

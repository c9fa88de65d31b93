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

//! Log records: the immutable snapshot of one log call.

use std::borrow::Cow;
use std::sync::Arc;

use jiff::Timestamp;

use crate::kv::Properties;
use crate::level::Level;

/// A shared handle to an application error attached to a record.
pub type ErrorRef = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// The payload of one log call.
///
/// A record is built once at the emission site and never mutated afterwards,
/// so it is safe to hand the same record to multiple appenders concurrently.
/// Buffering appenders clone it; the clone shares the error chain and context
/// frames.
#[derive(Clone, Debug)]
pub struct Record {
    // the observed time, UTC
    time: Timestamp,

    // the metadata
    level: Level,
    logger: Arc<str>,
    thread: Arc<str>,
    module_path: Option<&'static str>,
    file: Option<&'static str>,
    line: Option<u32>,

    // the payload
    payload: Cow<'static, str>,
    error: Option<ErrorRef>,

    // scopes captured at emission
    context: Arc<[String]>,
    properties: Properties,
}

impl Record {
    /// Returns a new builder for a record at the given level.
    pub fn builder(level: Level, payload: impl Into<Cow<'static, str>>) -> RecordBuilder {
        RecordBuilder::new(level, payload)
    }

    /// The observed time.
    pub fn time(&self) -> Timestamp {
        self.time
    }

    /// The severity of the record.
    pub fn level(&self) -> &Level {
        &self.level
    }

    /// The name of the logger that emitted the record.
    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// The name (or debug id) of the emitting thread.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// The module path of the emission site.
    pub fn module_path(&self) -> Option<&'static str> {
        self.module_path
    }

    /// The source file of the emission site.
    pub fn file(&self) -> Option<&'static str> {
        self.file
    }

    /// The source line of the emission site.
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    /// The message body.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The attached application error, if any.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.error.as_deref()
    }

    /// The nested context frames captured at emission, outermost first.
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// The property bag captured at emission.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub(crate) fn set_logger(&mut self, logger: Arc<str>) {
        self.logger = logger;
    }

    pub(crate) fn set_context(&mut self, frames: Arc<[String]>) {
        self.context = frames;
    }

    pub(crate) fn set_properties(&mut self, properties: Properties) {
        self.properties = properties;
    }
}

/// Builder for [`Record`].
///
/// # Examples
///
/// ```
/// use logtree::Level;
/// use logtree::Record;
///
/// let record = Record::builder(Level::WARN, "disk almost full")
///     .line(Some(42))
///     .build();
/// assert_eq!(record.payload(), "disk almost full");
/// ```
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Create a builder carrying the current time and thread.
    pub fn new(level: Level, payload: impl Into<Cow<'static, str>>) -> RecordBuilder {
        let thread = std::thread::current();
        let thread = match thread.name() {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("{:?}", thread.id()).as_str()),
        };

        RecordBuilder {
            record: Record {
                time: Timestamp::now(),
                level,
                logger: Arc::from(""),
                thread,
                module_path: None,
                file: None,
                line: None,
                payload: payload.into(),
                error: None,
                context: Arc::from(Vec::new()),
                properties: Properties::new(),
            },
        }
    }

    /// Set [`time`](Record::time).
    pub fn time(mut self, time: Timestamp) -> Self {
        self.record.time = time;
        self
    }

    /// Set [`logger`](Record::logger).
    pub fn logger(mut self, logger: impl Into<Arc<str>>) -> Self {
        self.record.logger = logger.into();
        self
    }

    /// Set [`module_path`](Record::module_path).
    pub fn module_path(mut self, path: Option<&'static str>) -> Self {
        self.record.module_path = path;
        self
    }

    /// Set [`file`](Record::file).
    pub fn file(mut self, file: Option<&'static str>) -> Self {
        self.record.file = file;
        self
    }

    /// Set [`line`](Record::line).
    pub fn line(mut self, line: Option<u32>) -> Self {
        self.record.line = line;
        self
    }

    /// Attach an application error to the record.
    pub fn error<E>(mut self, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.record.error = Some(Arc::new(error));
        self
    }

    /// Attach an already-shared application error to the record.
    pub fn error_shared(mut self, error: ErrorRef) -> Self {
        self.record.error = Some(error);
        self
    }

    /// Set a per-record property. Per-record values override repository and
    /// thread-scoped values of the same name.
    pub fn property(mut self, key: impl Into<String>, value: crate::kv::ValueOwned) -> Self {
        self.record.properties.set(key, value);
        self
    }

    /// Invoke the builder and return a [`Record`].
    pub fn build(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::str_value;

    #[test]
    fn test_builder_captures_thread() {
        let record = Record::builder(Level::INFO, "hello").build();
        assert!(!record.thread().is_empty());
        assert_eq!(record.level(), &Level::INFO);
        assert_eq!(record.logger(), "");
    }

    #[test]
    fn test_builder_error_chain() {
        let err = std::io::Error::other("boom");
        let record = Record::builder(Level::ERROR, "write failed")
            .error(err)
            .build();
        assert_eq!(record.error().unwrap().to_string(), "boom");
    }

    #[test]
    fn test_builder_properties() {
        let record = Record::builder(Level::INFO, "hello")
            .property("request", str_value("r-1"))
            .build();
        assert_eq!(record.properties().get("request").unwrap().to_string(), "r-1");
    }
}

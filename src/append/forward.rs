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

use crate::Error;
use crate::append::Append;
use crate::record::Record;

/// A composite appender that fans records out to its attached targets.
///
/// A failing target never keeps its siblings from receiving the record; all
/// failures are folded into one reported error.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use logtree::append::ForwardAppender;
/// use logtree::append::MemoryAppender;
///
/// let first = Arc::new(MemoryAppender::new("first"));
/// let second = Arc::new(MemoryAppender::new("second"));
/// let forward = ForwardAppender::new("fanout", vec![first, second]);
/// ```
#[derive(Debug)]
pub struct ForwardAppender {
    name: String,
    targets: Vec<Arc<dyn Append>>,
}

impl ForwardAppender {
    /// Create a forwarding appender over the given targets.
    pub fn new<T>(name: impl Into<String>, targets: Vec<Arc<T>>) -> ForwardAppender
    where
        T: Append,
    {
        ForwardAppender {
            name: name.into(),
            targets: targets
                .into_iter()
                .map(|target| target as Arc<dyn Append>)
                .collect(),
        }
    }

    /// Create a forwarding appender over already type-erased targets.
    pub fn from_targets(name: impl Into<String>, targets: Vec<Arc<dyn Append>>) -> ForwardAppender {
        ForwardAppender {
            name: name.into(),
            targets,
        }
    }

    fn each(&self, what: &'static str, f: impl Fn(&dyn Append) -> Result<(), Error>) -> Result<(), Error> {
        let mut failed = Error::new(what).with_context("appender", &self.name);
        let mut any_failed = false;
        for target in &self.targets {
            if let Err(err) = f(target.as_ref()) {
                any_failed = true;
                failed = failed.with_source(err);
            }
        }
        if any_failed { Err(failed) } else { Ok(()) }
    }
}

impl Append for ForwardAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        self.each("failed to forward record", |target| target.append(record))
    }

    fn flush(&self) -> Result<(), Error> {
        self.each("failed to flush forwarded appenders", |target| target.flush())
    }

    fn close(&self) -> Result<(), Error> {
        self.each("failed to close forwarded appenders", |target| target.close())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::MemoryAppender;
    use crate::level::Level;

    #[derive(Debug)]
    struct Failing;

    impl Append for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn append(&self, _record: &Record) -> Result<(), Error> {
            Err(Error::new("sink unavailable"))
        }
    }

    #[test]
    fn test_failing_target_does_not_block_siblings() {
        let healthy = Arc::new(MemoryAppender::new("healthy"));
        let forward = ForwardAppender::from_targets(
            "fanout",
            vec![Arc::new(Failing) as Arc<dyn Append>, healthy.clone()],
        );

        let record = Record::builder(Level::INFO, "payload").build();
        let err = forward.append(&record).unwrap_err();
        assert_eq!(err.sources().len(), 1);
        assert_eq!(healthy.len(), 1);
    }

    #[test]
    fn test_all_targets_receive_in_order() {
        let first = Arc::new(MemoryAppender::new("first"));
        let second = Arc::new(MemoryAppender::new("second"));
        let forward = ForwardAppender::new("fanout", vec![first.clone(), second.clone()]);

        for i in 0..3 {
            forward
                .append(&Record::builder(Level::INFO, format!("event {i}")).build())
                .unwrap();
        }
        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 3);
    }
}

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

use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::Error;
use crate::append::Append;
use crate::record::Record;

/// An appender that buffers records in memory, preserving arrival order.
///
/// Useful for tests and for sinks that inspect records after the fact.
///
/// # Examples
///
/// ```
/// use logtree::Level;
/// use logtree::Record;
/// use logtree::append::Append;
/// use logtree::append::MemoryAppender;
///
/// let appender = MemoryAppender::new("captured");
/// appender.append(&Record::builder(Level::INFO, "hello").build()).unwrap();
/// assert_eq!(appender.drain().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryAppender {
    name: String,
    records: Mutex<Vec<Record>>,
    closed: AtomicBool,
}

impl MemoryAppender {
    /// Create an empty memory appender.
    pub fn new(name: impl Into<String>) -> MemoryAppender {
        MemoryAppender {
            name: name.into(),
            records: Mutex::new(vec![]),
            closed: AtomicBool::new(false),
        }
    }

    /// Take all buffered records in arrival order.
    pub fn drain(&self) -> Vec<Record> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *records)
    }

    /// Copy the buffered records without draining them.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The number of buffered records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no records are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Append for MemoryAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::new("appender is closed").with_context("appender", &self.name));
        }
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(record.clone());
        Ok(())
    }

    fn close(&self) -> Result<(), Error> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;

    #[test]
    fn test_drain_preserves_order() {
        let appender = MemoryAppender::new("mem");
        for i in 0..5 {
            appender
                .append(&Record::builder(Level::INFO, format!("event {i}")).build())
                .unwrap();
        }
        let payloads: Vec<String> = appender
            .drain()
            .iter()
            .map(|r| r.payload().to_string())
            .collect();
        assert_eq!(payloads, vec!["event 0", "event 1", "event 2", "event 3", "event 4"]);
        assert!(appender.is_empty());
    }

    #[test]
    fn test_append_after_close_fails() {
        let appender = MemoryAppender::new("mem");
        appender.close().unwrap();
        appender.close().unwrap();
        assert!(
            appender
                .append(&Record::builder(Level::INFO, "late").build())
                .is_err()
        );
    }
}

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
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;

use crate::Error;
use crate::append::Append;
use crate::record::Record;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// Overflow policy for [`AsyncAppender`].
///
/// When the channel is full, an incoming operation is handled according to
/// the specified policy.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum Overflow {
    /// Blocks until the channel is not full.
    Block,
    /// Drops the incoming operation.
    DropIncoming,
}

enum Task {
    Log(Record),
    Flush,
}

/// A composable appender, logging and flushing asynchronously.
///
/// Records are queued on the calling thread and delivered to the wrapped
/// targets by a single worker thread, so arrival order is preserved. This is
/// an explicit opt-in: plain dispatch stays synchronous.
#[derive(Debug)]
pub struct AsyncAppender {
    name: String,
    overflow: Overflow,
    state: Mutex<Option<AsyncState>>,
}

#[derive(Debug)]
struct AsyncState {
    sender: Sender<Task>,
    handle: JoinHandle<()>,
}

impl AsyncAppender {
    fn send_task(&self, task: Task) -> Result<(), Error> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let Some(state) = state.as_ref() else {
            return Err(Error::new("appender is closed").with_context("appender", &self.name));
        };
        match self.overflow {
            Overflow::Block => state.sender.send(task).map_err(|_| {
                Error::new("failed to queue task").with_context("appender", &self.name)
            }),
            Overflow::DropIncoming => match state.sender.try_send(task) {
                Ok(()) => Ok(()),
                Err(crossbeam_channel::TrySendError::Full(_)) => Ok(()),
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => Err(
                    Error::new("failed to queue task").with_context("appender", &self.name),
                ),
            },
        }
    }
}

impl Append for AsyncAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        self.send_task(Task::Log(record.clone()))
    }

    fn flush(&self) -> Result<(), Error> {
        self.send_task(Task::Flush)
    }

    fn close(&self) -> Result<(), Error> {
        let state = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.take()
        };
        if let Some(AsyncState { sender, handle }) = state {
            // the worker drains remaining tasks, then breaks its loop
            drop(sender);
            handle
                .join()
                .map_err(|_| Error::new("async appender worker panicked"))?;
        }
        Ok(())
    }
}

impl Drop for AsyncAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A builder for configuring an [`AsyncAppender`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use logtree::append::AsyncBuilder;
/// use logtree::append::MemoryAppender;
///
/// let appender = AsyncBuilder::new("async")
///     .target(Arc::new(MemoryAppender::new("mem")))
///     .build();
/// ```
#[derive(Debug)]
pub struct AsyncBuilder {
    name: String,
    targets: Vec<Arc<dyn Append>>,
    buffered_records_limit: Option<usize>,
    trap: Box<dyn Trap>,
    overflow: Overflow,
}

impl AsyncBuilder {
    /// Create a new async appender builder.
    pub fn new(name: impl Into<String>) -> AsyncBuilder {
        AsyncBuilder {
            name: name.into(),
            targets: vec![],
            buffered_records_limit: None,
            trap: Box::new(DefaultTrap::default()),
            overflow: Overflow::Block,
        }
    }

    /// Add a target appender.
    pub fn target(mut self, target: Arc<dyn Append>) -> Self {
        self.targets.push(target);
        self
    }

    /// Bound the queue of pending records.
    ///
    /// Default to unbounded.
    pub fn buffered_records_limit(mut self, limit: usize) -> Self {
        self.buffered_records_limit = Some(limit);
        self
    }

    /// Set the overflow policy applied when the bounded queue is full.
    pub fn overflow(mut self, overflow: Overflow) -> Self {
        self.overflow = overflow;
        self
    }

    /// Set the trap receiving errors raised by the wrapped targets.
    ///
    /// Default to [`DefaultTrap`].
    pub fn trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = trap.into();
        self
    }

    /// Build the async appender and spawn its worker thread.
    pub fn build(self) -> AsyncAppender {
        let Self {
            name,
            targets,
            buffered_records_limit,
            trap,
            overflow,
        } = self;

        let (sender, receiver) = match buffered_records_limit {
            Some(limit) => crossbeam_channel::bounded(limit),
            None => crossbeam_channel::unbounded(),
        };

        let worker = Worker {
            receiver,
            targets,
            trap,
        };
        let handle = std::thread::Builder::new()
            .name(format!("logtree-async-{name}"))
            .spawn(move || worker.run())
            .expect("failed to spawn async appender thread");

        AsyncAppender {
            name,
            overflow,
            state: Mutex::new(Some(AsyncState { sender, handle })),
        }
    }
}

struct Worker {
    receiver: Receiver<Task>,
    targets: Vec<Arc<dyn Append>>,
    trap: Box<dyn Trap>,
}

impl Worker {
    fn run(self) {
        let Self {
            receiver,
            targets,
            trap,
        } = self;

        while let Ok(task) = receiver.recv() {
            match task {
                Task::Log(record) => {
                    for target in &targets {
                        if let Err(err) = target.append(&record) {
                            let err = Error::new("failed to append record")
                                .with_context("appender", target.name())
                                .with_source(err);
                            trap.trap(&err);
                        }
                    }
                }
                Task::Flush => {
                    for target in &targets {
                        if let Err(err) = target.flush() {
                            let err = Error::new("failed to flush")
                                .with_context("appender", target.name())
                                .with_source(err);
                            trap.trap(&err);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::append::MemoryAppender;
    use crate::level::Level;

    #[test]
    fn test_preserves_submission_order() {
        let target = Arc::new(MemoryAppender::new("mem"));
        let appender = AsyncBuilder::new("async").target(target.clone()).build();

        for i in 0..100 {
            appender
                .append(&Record::builder(Level::INFO, format!("event {i}")).build())
                .unwrap();
        }
        appender.close().unwrap();

        let payloads: Vec<String> = target
            .drain()
            .iter()
            .map(|r| r.payload().to_string())
            .collect();
        let expected: Vec<String> = (0..100).map(|i| format!("event {i}")).collect();
        assert_eq!(payloads, expected);
    }

    #[test]
    fn test_append_after_close_fails() {
        let appender = AsyncBuilder::new("async")
            .target(Arc::new(MemoryAppender::new("mem")))
            .build();
        appender.close().unwrap();
        appender.close().unwrap();
        assert!(
            appender
                .append(&Record::builder(Level::INFO, "late").build())
                .is_err()
        );
    }
}

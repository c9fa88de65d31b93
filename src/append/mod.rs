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

//! Appenders turn log records into external effects.

use std::fmt;

use crate::Error;
use crate::record::Record;

mod asynchronous;
mod datagram;
mod file;
mod forward;
mod memory;
pub mod rolling;

pub use self::asynchronous::AsyncAppender;
pub use self::asynchronous::AsyncBuilder;
pub use self::asynchronous::Overflow;
pub use self::datagram::DatagramAppender;
pub use self::datagram::DatagramBuilder;
pub use self::file::FileAppender;
pub use self::file::FileBuilder;
pub use self::forward::ForwardAppender;
pub use self::memory::MemoryAppender;
pub use self::rolling::RollingFile;
pub use self::rolling::RollingFileBuilder;

/// An appender that can process log records.
///
/// One appender instance may be attached to several loggers and must tolerate
/// concurrent [`append`](Append::append) calls. Failures are reported through
/// the returned error; dispatch traps them so they never reach the logging
/// call site.
pub trait Append: fmt::Debug + Send + Sync + 'static {
    /// A stable name, used in configuration references and error context.
    fn name(&self) -> &str;

    /// Dispatch a log record to the append target.
    fn append(&self, record: &Record) -> Result<(), Error>;

    /// Flush any buffered records.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Release the appender's resources.
    ///
    /// Closing an already-closed appender is a no-op; appending after close
    /// is an error.
    fn close(&self) -> Result<(), Error> {
        Ok(())
    }
}

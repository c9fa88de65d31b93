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

//! Logtree is a hierarchical logging runtime: applications emit records
//! through named loggers organized as a dotted-name tree, the runtime filters
//! them by severity, fans them out along the additive ancestor chain, renders
//! them through pattern layouts, and rotates file sinks without losing data.
//!
//! # Overview
//!
//! A [`Repository`] owns the logger tree. Loggers are created on first
//! lookup, inherit their effective level from the nearest configured
//! ancestor, and dispatch each record to every appender attached along the
//! way. Appender failures are reported to a diagnostic [`Trap`] and never
//! reach the logging call site.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use logtree::Level;
//! use logtree::Repository;
//! use logtree::append::MemoryAppender;
//!
//! let repo = Repository::new();
//! repo.root().set_level(Some(Level::INFO));
//!
//! let sink = Arc::new(MemoryAppender::new("sink"));
//! repo.root().add_appender(sink.clone());
//!
//! let logger = repo.logger("db.pool");
//! logger.info("pool ready");
//! logger.debug("not recorded");
//!
//! assert_eq!(sink.len(), 1);
//! repo.shutdown();
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod append;
pub mod config;
pub mod diagnostic;
pub mod kv;
pub mod layout;
pub mod level;
pub mod logger;
pub mod record;
pub mod trap;

mod error;

pub use append::Append;
pub use error::Error;
pub use layout::Layout;
pub use level::Level;
pub use logger::Logger;
pub use logger::Repository;
pub use record::Record;
pub use trap::Trap;

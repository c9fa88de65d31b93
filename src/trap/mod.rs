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

//! The internal diagnostic channel.
//!
//! Errors raised inside appenders must never reach the application's logging
//! call site. Dispatch catches them and hands them to the repository's trap.

use std::fmt;

use crate::Error;

mod buffer;
mod default;

pub use self::buffer::BufferTrap;
pub use self::default::DefaultTrap;

/// A sink for errors the runtime swallows on behalf of the application.
pub trait Trap: fmt::Debug + Send + Sync + 'static {
    /// Report an error to the diagnostic channel.
    fn trap(&self, err: &Error);
}

impl<T: Trap> From<T> for Box<dyn Trap> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

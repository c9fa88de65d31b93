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

use crate::Error;
use crate::trap::Trap;

/// A trap that buffers reported errors for later inspection.
///
/// Clones share the same buffer, so a test can keep one handle while the
/// repository owns another.
///
/// # Examples
///
/// ```
/// use logtree::trap::BufferTrap;
/// use logtree::trap::Trap;
///
/// let trap = BufferTrap::new();
/// trap.trap(&logtree::Error::new("sink failed"));
/// assert_eq!(trap.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferTrap {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BufferTrap {
    /// Create an empty buffer trap.
    pub fn new() -> BufferTrap {
        BufferTrap::default()
    }

    /// Take all buffered messages in arrival order.
    pub fn drain(&self) -> Vec<String> {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *messages)
    }

    /// The number of buffered messages.
    pub fn len(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no messages are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Trap for BufferTrap {
    fn trap(&self, err: &Error) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages.push(err.to_string());
    }
}

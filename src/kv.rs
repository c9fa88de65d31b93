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

//! Named values carried by log records.

use std::fmt;

use value_bag::OwnedValueBag;
use value_bag::ValueBag;

/// Represents a borrowed property value.
pub type Value<'a> = ValueBag<'a>;

/// Represents an owned property value.
pub type ValueOwned = OwnedValueBag;

/// Capture an owned value from anything that displays.
pub fn display_value<T: fmt::Display + 'static>(value: &T) -> ValueOwned {
    ValueBag::capture_display(value).to_owned()
}

/// Capture an owned value from a string slice.
pub fn str_value(value: &str) -> ValueOwned {
    ValueBag::from(value).to_owned()
}

/// An ordered collection of named values.
///
/// Entries keep first-insertion order; setting an existing key replaces its
/// value in place, so a later scope can override an earlier one without
/// disturbing the order of the bag.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    entries: Vec<(String, ValueOwned)>,
}

impl Properties {
    /// Create an empty property bag.
    pub fn new() -> Properties {
        Properties { entries: vec![] }
    }

    /// Set a value, replacing in place if the key is already present.
    pub fn set(&mut self, key: impl Into<String>, value: ValueOwned) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&ValueOwned> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueOwned)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

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

//! Severity levels and the per-repository level map.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A severity value with a display name.
///
/// Levels are ordered by their numeric value; a higher value is more severe.
/// Two levels compare equal when their values are equal, regardless of name,
/// so a custom level can alias a built-in one.
///
/// # Examples
///
/// ```
/// use logtree::Level;
///
/// assert!(Level::ERROR > Level::INFO);
/// let notice = Level::new(45_000, "NOTICE");
/// assert!(notice > Level::INFO);
/// assert!(notice < Level::WARN);
/// ```
#[derive(Clone)]
pub struct Level {
    value: i32,
    name: Cow<'static, str>,
}

impl Level {
    /// Matches every record; lower than any other level.
    pub const ALL: Level = Level::from_static(i32::MIN, "ALL");
    /// Designates very low priority, often extremely verbose, information.
    pub const TRACE: Level = Level::from_static(20_000, "TRACE");
    /// Designates lower priority information.
    pub const DEBUG: Level = Level::from_static(30_000, "DEBUG");
    /// Designates useful information.
    pub const INFO: Level = Level::from_static(40_000, "INFO");
    /// Designates hazardous situations.
    pub const WARN: Level = Level::from_static(60_000, "WARN");
    /// Designates serious errors.
    pub const ERROR: Level = Level::from_static(70_000, "ERROR");
    /// Designates errors the application cannot recover from.
    pub const FATAL: Level = Level::from_static(110_000, "FATAL");
    /// Matches no record; higher than any other level.
    pub const OFF: Level = Level::from_static(i32::MAX, "OFF");

    const fn from_static(value: i32, name: &'static str) -> Level {
        Level {
            value,
            name: Cow::Borrowed(name),
        }
    }

    /// Create a custom level with the given value and name.
    pub fn new(value: i32, name: impl Into<String>) -> Level {
        Level {
            value,
            name: Cow::Owned(name.into()),
        }
    }

    /// The numeric severity value.
    pub fn value(&self) -> i32 {
        self.value
    }

    /// The display name of the level.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Level {}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A case-insensitive mapping from level names to [`Level`]s.
///
/// Each repository owns one level map, seeded with the built-in levels.
/// Custom levels registered here become resolvable by configuration.
#[derive(Debug, Clone)]
pub struct LevelMap {
    levels: HashMap<String, Level>,
}

impl Default for LevelMap {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelMap {
    /// Create a level map seeded with the built-in levels.
    pub fn new() -> LevelMap {
        let mut map = LevelMap {
            levels: HashMap::new(),
        };
        for level in [
            Level::ALL,
            Level::TRACE,
            Level::DEBUG,
            Level::INFO,
            Level::WARN,
            Level::ERROR,
            Level::FATAL,
            Level::OFF,
        ] {
            map.insert(level);
        }
        map
    }

    /// Register a level, replacing any level previously known by the same name.
    pub fn insert(&mut self, level: Level) {
        self.levels.insert(level.name().to_ascii_uppercase(), level);
    }

    /// Look up a level by name, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<Level> {
        self.levels.get(&name.to_ascii_uppercase()).cloned()
    }

    /// Look up a level by name, resolving unknown names to the supplied default.
    pub fn get_or(&self, name: &str, default: &Level) -> Level {
        self.get(name).unwrap_or_else(|| default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::TRACE < Level::DEBUG);
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
        assert!(Level::ERROR < Level::FATAL);
        assert!(Level::ALL < Level::TRACE);
        assert!(Level::FATAL < Level::OFF);
    }

    #[test]
    fn test_level_equality_ignores_name() {
        let alias = Level::new(40_000, "NOTE");
        assert_eq!(alias, Level::INFO);
    }

    #[test]
    fn test_map_resolves_case_insensitively() {
        let map = LevelMap::new();
        assert_eq!(map.get("warn"), Some(Level::WARN));
        assert_eq!(map.get("Warn"), Some(Level::WARN));
        assert_eq!(map.get("WARN"), Some(Level::WARN));
    }

    #[test]
    fn test_map_unknown_name_resolves_to_default() {
        let map = LevelMap::new();
        assert_eq!(map.get("verbose"), None);
        assert_eq!(map.get_or("verbose", &Level::DEBUG), Level::DEBUG);
    }

    #[test]
    fn test_map_custom_level() {
        let mut map = LevelMap::new();
        map.insert(Level::new(50_000, "Notice"));
        let notice = map.get("NOTICE").unwrap();
        assert_eq!(notice.value(), 50_000);
        assert_eq!(notice.name(), "Notice");
    }
}

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

use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;

/// A policy deciding how the live file and its backups are renamed or
/// discarded during rotation.
pub trait RollingStrategy: fmt::Debug + Send + Sync + 'static {
    /// Move the live file at `path` out of the way so a fresh one can be
    /// opened at the same path.
    fn roll(&self, path: &Path) -> Result<(), Error>;
}

impl<T: RollingStrategy> From<T> for Box<dyn RollingStrategy> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

/// Keeps backups as `<path>.0` (most recent) through `<path>.<max_index>`
/// (oldest).
///
/// Rolling first shifts every existing backup up one index, recursing from
/// index 0 so room is cleared before anything moves into it; a backup already
/// at the maximum index is deleted. Only then does the live file move to
/// `<path>.0`. Shifting before moving is what keeps history intact: renaming
/// the live file first would either fail on an occupied target or overwrite
/// an older backup.
#[derive(Debug, Clone, Copy)]
pub struct IndexStrategy {
    max_index: u32,
}

impl IndexStrategy {
    /// Create a strategy keeping backups up to the given index.
    pub fn new(max_index: u32) -> IndexStrategy {
        IndexStrategy { max_index }
    }

    /// The highest backup index kept.
    pub fn max_index(&self) -> u32 {
        self.max_index
    }

    fn shift_up(&self, path: &Path, index: u32) -> Result<(), Error> {
        let occupant = backup_path(path, index);
        if !occupant.exists() {
            return Ok(());
        }
        if index >= self.max_index {
            return fs::remove_file(&occupant).map_err(|err| {
                Error::new("failed to delete oldest backup")
                    .with_context("path", occupant.display())
                    .with_source(err)
            });
        }
        self.shift_up(path, index + 1)?;
        let target = backup_path(path, index + 1);
        fs::rename(&occupant, &target).map_err(|err| {
            Error::new("failed to renumber backup")
                .with_context("from", occupant.display())
                .with_context("to", target.display())
                .with_source(err)
        })
    }
}

impl RollingStrategy for IndexStrategy {
    fn roll(&self, path: &Path) -> Result<(), Error> {
        if !path.exists() {
            return Ok(());
        }
        self.shift_up(path, 0)?;
        let target = backup_path(path, 0);
        fs::rename(path, &target).map_err(|err| {
            Error::new("failed to move live file to backup")
                .with_context("from", path.display())
                .with_context("to", target.display())
                .with_source(err)
        })
    }
}

fn backup_path(path: &Path, index: u32) -> PathBuf {
    let mut backup = path.as_os_str().to_os_string();
    backup.push(format!(".{index}"));
    PathBuf::from(backup)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn touch(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_first_roll_creates_index_zero() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("logfile.log");
        touch(&live, "one");

        IndexStrategy::new(10).roll(&live).unwrap();
        assert!(!live.exists());
        assert_eq!(fs::read_to_string(backup_path(&live, 0)).unwrap(), "one");
    }

    #[test]
    fn test_backups_shift_up_and_oldest_drops() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("logfile.log");
        let strategy = IndexStrategy::new(10);

        for i in 1..=11 {
            touch(&live, &format!("generation {i}"));
            strategy.roll(&live).unwrap();
        }

        // eleven backups exist, numbered 0 (newest) through 10 (oldest)
        for index in 0..=10u32 {
            let content = fs::read_to_string(backup_path(&live, index)).unwrap();
            assert_eq!(content, format!("generation {}", 11 - index));
        }

        // a twelfth roll drops the oldest and creates nothing past the cap
        touch(&live, "generation 12");
        strategy.roll(&live).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 11);
        assert!(!backup_path(&live, 11).exists());
        assert_eq!(
            fs::read_to_string(backup_path(&live, 0)).unwrap(),
            "generation 12"
        );
        assert_eq!(
            fs::read_to_string(backup_path(&live, 10)).unwrap(),
            "generation 2"
        );
    }

    #[test]
    fn test_roll_without_live_file_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("absent.log");
        IndexStrategy::new(3).roll(&live).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

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

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Error;
use crate::append::Append;
use crate::layout::Layout;
use crate::layout::PatternLayout;
use crate::record::Record;

/// A builder to configure and create a [`FileAppender`].
#[derive(Debug)]
pub struct FileBuilder {
    path: PathBuf,
    name: Option<String>,
    layout: Box<dyn Layout>,
}

impl FileBuilder {
    /// Create a new file appender builder for the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            layout: Box::new(PatternLayout::default()),
        }
    }

    /// Set the appender name used in configuration references.
    ///
    /// Default to the display form of the path.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the layout for the logs.
    ///
    /// Default to [`PatternLayout`].
    pub fn layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = layout.into();
        self
    }

    /// Build the [`FileAppender`].
    ///
    /// # Errors
    ///
    /// Return an error if the parent directory cannot be created or the file
    /// cannot be opened for appending.
    pub fn build(self) -> Result<FileAppender, Error> {
        let Self { path, name, layout } = self;
        let name = name.unwrap_or_else(|| path.display().to_string());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    Error::new("failed to create log directory")
                        .with_context("path", parent.display())
                        .with_source(err)
                })?;
            }
        }

        let fresh = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|err| {
                Error::new("failed to open log file")
                    .with_context("path", path.display())
                    .with_source(err)
            })?;

        if fresh {
            if let Some(header) = layout.header() {
                file.write_all(&header).map_err(Error::from_io_error)?;
            }
        }

        Ok(FileAppender {
            name,
            layout,
            state: Mutex::new(FileState {
                file: Some(file),
                closed: false,
            }),
        })
    }
}

/// An appender that writes log records to one file.
///
/// # Examples
///
/// ```no_run
/// use logtree::append::FileBuilder;
///
/// let appender = FileBuilder::new("logs/app.log").build().unwrap();
/// ```
#[derive(Debug)]
pub struct FileAppender {
    name: String,
    layout: Box<dyn Layout>,
    state: Mutex<FileState>,
}

#[derive(Debug)]
struct FileState {
    file: Option<File>,
    closed: bool,
}

impl FileAppender {
    fn state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Append for FileAppender {
    fn name(&self) -> &str {
        &self.name
    }

    fn append(&self, record: &Record) -> Result<(), Error> {
        let bytes = self.layout.format(record)?;
        let mut state = self.state();
        let Some(file) = state.file.as_mut() else {
            return Err(Error::new("appender is closed").with_context("appender", &self.name));
        };
        file.write_all(&bytes).map_err(Error::from_io_error)
    }

    fn flush(&self) -> Result<(), Error> {
        let mut state = self.state();
        match state.file.as_mut() {
            Some(file) => file.flush().map_err(Error::from_io_error),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<(), Error> {
        let mut state = self.state();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        if let Some(mut file) = state.file.take() {
            if let Some(footer) = self.layout.footer() {
                file.write_all(&footer).map_err(Error::from_io_error)?;
            }
            file.flush().map_err(Error::from_io_error)?;
        }
        Ok(())
    }
}

impl Drop for FileAppender {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by test-replay.

use camino::{FromPathBufError, Utf8PathBuf};
use config::ConfigError;
use miette::{Diagnostic, SourceSpan};
use std::{fmt, num::ParseFloatError};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse test-replay config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),
}

/// An error that occurred while determining the directory relative paths are resolved against.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CurrentDirError {
    /// Failed to retrieve the current directory.
    #[error("failed to retrieve current directory")]
    GetCurrentDir(#[source] std::io::Error),

    /// The current directory was invalid UTF-8.
    #[error("current directory is invalid UTF-8")]
    InvalidUtf8(#[source] FromPathBufError),
}

/// A worker ID that can't be used as part of a record file name.
#[derive(Clone, Debug, Error)]
#[error("invalid worker ID `{input}`: {reason}")]
pub struct InvalidWorkerId {
    input: String,
    reason: &'static str,
}

impl InvalidWorkerId {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// An error that occurred while setting up the per-run context of a worker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunContextError {
    /// The process is a worker, but the controller didn't hand over the session start.
    #[error(
        "worker `{worker_id}` started without a session start reference \
         (hint: the controlling process must set {var})"
    )]
    MissingSessionStart {
        /// The worker that was being set up.
        worker_id: String,

        /// The environment variable that was expected.
        var: &'static str,
    },

    /// The session start reference could not be parsed.
    #[error("session start `{value}` in {var} is not a number")]
    InvalidSessionStart {
        /// The environment variable that was read.
        var: &'static str,

        /// The value that was read.
        value: String,

        /// The parse error.
        #[source]
        error: ParseFloatError,
    },

    /// The worker ID in the environment was invalid.
    #[error("invalid worker ID in {var}")]
    InvalidWorkerId {
        /// The environment variable that was read.
        var: &'static str,

        /// The underlying error.
        #[source]
        error: InvalidWorkerId,
    },
}

/// An error that occurred while operating on record files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordStoreError {
    /// The record directory could not be created.
    #[error("error creating record directory `{dir}`")]
    DirCreate {
        /// The directory that couldn't be created.
        dir: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// The record directory could not be listed during cleanup.
    #[error("error reading record directory `{dir}`")]
    DirRead {
        /// The directory that couldn't be read.
        dir: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// A previous record file could not be removed during cleanup.
    #[error("error removing record file `{path}`")]
    Remove {
        /// The file that couldn't be removed.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// A record file could not be opened for appending.
    #[error("error opening record file `{path}`")]
    Open {
        /// The file that couldn't be opened.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// A line could not be written to a record file, or could not be synced to disk.
    #[error("error writing to record file `{path}`")]
    Write {
        /// The file being written to.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },
}

/// An error that occurred while recording a lifecycle event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordEventError {
    /// The record for a test could not be serialized.
    #[error("error serializing record for `{nodeid}`")]
    Serialize {
        /// The test whose record couldn't be serialized.
        nodeid: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The record could not be written out.
    #[error(transparent)]
    Store(#[from] RecordStoreError),
}

/// An error that occurred while loading replay files.
#[derive(Debug, Error, Diagnostic)]
#[non_exhaustive]
pub enum ReplayLoadError {
    /// A replay file could not be read.
    #[error("error reading replay file `{path}`")]
    Read {
        /// The file that couldn't be read.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// A line in a replay file was not a valid record.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(Box<ReplayParseError>),
}

/// A line in a replay file that is neither blank, a comment, nor a valid record.
#[derive(Debug, Error, Diagnostic)]
#[error("malformed record at `{path}` line {line_number}")]
pub struct ReplayParseError {
    path: Utf8PathBuf,
    line_number: usize,
    #[source_code]
    line: String,
    #[label("invalid record")]
    span: SourceSpan,
    #[source]
    error: serde_json::Error,
}

impl ReplayParseError {
    pub(crate) fn new(
        path: impl Into<Utf8PathBuf>,
        line_number: usize,
        line: impl Into<String>,
        error: serde_json::Error,
    ) -> Self {
        let line = line.into();
        // serde_json reports 1-based columns, and 0 if the error isn't tied to a position.
        let offset = error.column().saturating_sub(1).min(line.len());
        let len = usize::from(offset < line.len());
        Self {
            path: path.into(),
            line_number,
            line,
            span: (offset, len).into(),
            error,
        }
    }

    /// Returns the replay file containing the malformed line.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// Returns the 1-based line number of the malformed line.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Returns the malformed line, with surrounding whitespace removed.
    pub fn line(&self) -> &str {
        &self.line
    }
}

/// An error produced while planning a multi-file replay.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum WorkerPlanError {
    /// Several replay files were passed, but the host can't run tests in parallel.
    #[error(
        "cannot replay {num_files} files without parallel execution support \
         (each file is assigned to its own worker)"
    )]
    ParallelUnavailable {
        /// The number of replay files passed in.
        num_files: usize,
    },

    /// Several replay files were passed together with explicit worker flags.
    #[error(
        "cannot combine several replay files with {}: the worker count and distribution \
         mode are derived from the replay files",
        DisplayFlags(.flags)
    )]
    ConflictingFlags {
        /// The conflicting arguments, as passed in.
        flags: Vec<String>,
    },
}

struct DisplayFlags<'a>(&'a [String]);

impl fmt::Display for DisplayFlags<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "`{flag}`")?;
        }
        Ok(())
    }
}

// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use camino::Utf8PathBuf;
use miette::GraphicalReportHandler;
use owo_colors::OwoColorize;
use replay_metadata::ReplayExitCode;
use replay_runner::errors::*;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An expected failure of a test-replay invocation.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirError {
        #[from]
        err: CurrentDirError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("no record directory configured")]
    RecordDirNotSet,
    #[error("run context error")]
    RunContextError {
        #[from]
        err: RunContextError,
    },
    #[error("error reading lifecycle events")]
    EventReadError { err: std::io::Error },
    #[error("malformed lifecycle event")]
    EventParseError {
        line_number: usize,
        err: serde_json::Error,
    },
    #[error("error reading collected tests")]
    CollectedReadError {
        path: Option<Utf8PathBuf>,
        err: std::io::Error,
    },
    #[error("replay load error")]
    ReplayLoadError {
        #[from]
        err: ReplayLoadError,
    },
    #[error("worker plan error")]
    WorkerPlanError {
        #[from]
        err: WorkerPlanError,
    },
    #[error("record store error")]
    RecordStoreError {
        #[from]
        err: RecordStoreError,
    },
    #[error("record event error")]
    RecordEventError {
        #[from]
        err: RecordEventError,
    },
    #[error("error writing output")]
    WriteOutputError { err: std::io::Error },
    #[error("error serializing output")]
    SerializeOutputError { err: serde_json::Error },
}

impl ExpectedError {
    pub(crate) fn event_parse_error(line_number: usize, err: serde_json::Error) -> Self {
        Self::EventParseError { line_number, err }
    }

    pub(crate) fn collected_read_error(path: Option<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::CollectedReadError { path, err }
    }

    pub(crate) fn write_output_error(err: std::io::Error) -> Self {
        Self::WriteOutputError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirError { .. }
            | Self::ConfigParseError { .. }
            | Self::RecordDirNotSet
            | Self::RunContextError { .. }
            | Self::EventReadError { .. }
            | Self::EventParseError { .. }
            | Self::CollectedReadError { .. } => ReplayExitCode::SETUP_ERROR,
            Self::WorkerPlanError { .. } => ReplayExitCode::USAGE_ERROR,
            Self::ReplayLoadError { .. } => ReplayExitCode::REPLAY_LOAD_FAILED,
            Self::RecordStoreError { .. } | Self::RecordEventError { .. } => {
                ReplayExitCode::WRITE_RECORD_FAILED
            }
            Self::WriteOutputError { .. } | Self::SerializeOutputError { .. } => {
                ReplayExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirError { err } => {
                error!("{err}");
                err.source()
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse test-replay config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::RecordDirNotSet => {
                error!(
                    "no record directory configured \
                     (hint: pass {} or set `record.dir` in .config/test-replay.toml)",
                    "--replay-record-dir".style(styles.bold)
                );
                None
            }
            Self::RunContextError { err } => {
                error!("{err}");
                err.source()
            }
            Self::EventReadError { err } => {
                error!("failed to read lifecycle events from standard input");
                Some(err as &dyn Error)
            }
            Self::EventParseError { line_number, err } => {
                error!("malformed lifecycle event on line {line_number} of standard input");
                Some(err as &dyn Error)
            }
            Self::CollectedReadError { path, err } => {
                match path {
                    Some(path) => {
                        error!("failed to read collected tests from `{}`", path.style(styles.bold))
                    }
                    None => error!("failed to read collected tests from standard input"),
                }
                Some(err as &dyn Error)
            }
            Self::ReplayLoadError { err } => match err {
                ReplayLoadError::Parse(parse_error) => {
                    let mut report = String::new();
                    let handler = GraphicalReportHandler::new_themed(styles.graphical_theme());
                    match handler.render_report(&mut report, parse_error.as_ref()) {
                        Ok(()) => error!(target: NO_HEADING, "{report}"),
                        Err(_) => error!("{parse_error}"),
                    }
                    None
                }
                other => {
                    error!("{other}");
                    other.source()
                }
            },
            Self::WorkerPlanError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RecordStoreError { err } => {
                error!("{err}");
                err.source()
            }
            Self::RecordEventError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutputError { err } => {
                error!("failed to write to standard output");
                Some(err as &dyn Error)
            }
            Self::SerializeOutputError { err } => {
                error!("failed to serialize output");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

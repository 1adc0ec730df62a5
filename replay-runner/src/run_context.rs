// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-run state: who this process is within a run, and the clock it measures time with.

use crate::{
    clock::{MonotonicClock, SESSION_START_ENV, SessionClock, SessionStart},
    errors::{InvalidWorkerId, RunContextError},
};
use std::fmt;

/// The environment variable the parallel layer sets to the identity of each worker.
pub const WORKER_ENV: &str = "TEST_REPLAY_WORKER";

/// The identity of one worker process in a parallel run, for example `gw0`.
///
/// Worker IDs become part of record file names, so they can't be empty or contain path
/// separators.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct WorkerId(String);

impl WorkerId {
    /// Creates a new worker ID, validating it.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidWorkerId> {
        let id = id.into();
        if id.is_empty() {
            return Err(InvalidWorkerId::new(id, "worker ID is empty"));
        }
        if id.contains(['/', '\\']) {
            return Err(InvalidWorkerId::new(id, "worker ID contains a path separator"));
        }
        if id.chars().any(char::is_control) {
            return Err(InvalidWorkerId::new(
                id,
                "worker ID contains a control character",
            ));
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role of the current process within a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunRole {
    /// The only process of a serial run. It cleans up and records.
    Serial,

    /// The controlling process of a parallel run. It cleans up, but doesn't record: its workers
    /// do.
    Controller {
        /// The number of workers in the run.
        num_workers: usize,
    },

    /// One worker of a parallel run. It records into its own file and never cleans up.
    Worker {
        /// The identity of this worker.
        id: WorkerId,
    },
}

/// Per-run state shared by everything that records.
#[derive(Debug)]
pub struct RunContext {
    role: RunRole,
    session_start: SessionStart,
    clock: Box<dyn SessionClock>,
}

impl RunContext {
    /// Creates the context for the process that starts a run, taking the session start reading.
    ///
    /// A run with more than one worker is parallel; this process then becomes its controller.
    pub fn controller(clock: Box<dyn SessionClock>, num_workers: usize) -> Self {
        let session_start = SessionStart::capture(clock.as_ref());
        let role = if num_workers > 1 {
            RunRole::Controller { num_workers }
        } else {
            RunRole::Serial
        };
        Self {
            role,
            session_start,
            clock,
        }
    }

    /// Creates the context for a worker, using the session start handed over by its controller.
    pub fn worker(clock: Box<dyn SessionClock>, id: WorkerId, session_start: SessionStart) -> Self {
        Self {
            role: RunRole::Worker { id },
            session_start,
            clock,
        }
    }

    /// Creates the context for the current process from the environment and the monotonic
    /// clock.
    ///
    /// See [`Self::from_env_with`].
    pub fn from_env(num_workers: usize) -> Result<Self, RunContextError> {
        Self::from_env_with(Box::new(MonotonicClock), num_workers, |var| {
            std::env::var(var).ok()
        })
    }

    /// Creates the context for the current process, reading variables through `env`.
    ///
    /// If [`WORKER_ENV`] is set, this process is a worker and [`SESSION_START_ENV`] must be set
    /// as well. Otherwise, this process starts the run.
    pub fn from_env_with(
        clock: Box<dyn SessionClock>,
        num_workers: usize,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, RunContextError> {
        let Some(worker) = env(WORKER_ENV) else {
            return Ok(Self::controller(clock, num_workers));
        };
        let id = WorkerId::new(worker).map_err(|error| RunContextError::InvalidWorkerId {
            var: WORKER_ENV,
            error,
        })?;
        let session_start = match env(SESSION_START_ENV) {
            Some(value) => SessionStart::from_env_value(&value)?,
            None => {
                return Err(RunContextError::MissingSessionStart {
                    worker_id: id.to_string(),
                    var: SESSION_START_ENV,
                });
            }
        };
        Ok(Self::worker(clock, id, session_start))
    }

    /// Returns the role of this process.
    pub fn role(&self) -> &RunRole {
        &self.role
    }

    /// Returns the worker identity of this process, if it is a worker.
    pub fn worker_id(&self) -> Option<&WorkerId> {
        match &self.role {
            RunRole::Worker { id } => Some(id),
            RunRole::Serial | RunRole::Controller { .. } => None,
        }
    }

    /// Returns true if the run this process belongs to is spread across several workers.
    pub fn is_parallel(&self) -> bool {
        !matches!(self.role, RunRole::Serial)
    }

    /// Returns true if this process writes records.
    pub fn records(&self) -> bool {
        !matches!(self.role, RunRole::Controller { .. })
    }

    /// Returns true if this process removes the record files of previous runs.
    pub fn performs_cleanup(&self) -> bool {
        self.worker_id().is_none()
    }

    /// Returns the session start reference.
    pub fn session_start(&self) -> SessionStart {
        self.session_start
    }

    /// Returns the seconds elapsed since the session start.
    pub fn elapsed(&self) -> f64 {
        self.session_start.elapsed(self.clock.as_ref())
    }
}

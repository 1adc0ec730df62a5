// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Planning parallel execution for a replay of several record files.
//!
//! Each record file passed to a replay was written by one worker. To reproduce the conditions of
//! the original run, every file gets a worker of its own, and the tests from that file are
//! pinned to it through their worker group.

use crate::{
    clock::{SESSION_START_ENV, SessionStart},
    errors::WorkerPlanError,
    run_context::{WORKER_ENV, WorkerId},
};
use itertools::Itertools;
use std::fmt;

/// Host arguments that set the number of workers or the way tests are distributed.
pub const WORKER_FLAGS: &[&str] = &["-n", "--numprocesses", "--maxprocesses", "--dist"];

/// Whether the host can run tests across several worker processes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParallelSupport {
    /// Parallel execution is available.
    Available,

    /// Parallel execution is not available.
    Unavailable,
}

/// How the parallel layer hands tests to workers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistributionMode {
    /// All tests pinned to the same group run on the same worker.
    LoadGroup,
}

impl DistributionMode {
    /// Returns the name of this mode as passed to `--dist`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoadGroup => "loadgroup",
        }
    }
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parallel layout a replay needs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplayPlan {
    /// A single file: run the host as the user asked.
    Unchanged,

    /// Several files: run one worker per file.
    Grouped(WorkerPlan),
}

/// The number of workers and distribution mode for a multi-file replay.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WorkerPlan {
    /// The number of workers to start.
    pub num_workers: usize,

    /// How tests are handed to workers.
    pub distribution: DistributionMode,
}

impl WorkerPlan {
    /// Returns the arguments to append to the host's command line.
    pub fn host_args(&self) -> Vec<String> {
        vec![
            "-n".to_owned(),
            self.num_workers.to_string(),
            "--dist".to_owned(),
            self.distribution.to_string(),
        ]
    }
}

/// Validates the command line of a replay and plans its workers.
#[derive(Clone, Copy, Debug)]
pub struct WorkerCoordinator {
    num_files: usize,
    parallel_support: ParallelSupport,
}

impl WorkerCoordinator {
    /// Creates a coordinator for a replay of `num_files` record files.
    pub fn new(num_files: usize, parallel_support: ParallelSupport) -> Self {
        Self {
            num_files,
            parallel_support,
        }
    }

    /// Plans the workers for this replay, given the rest of the host's arguments.
    ///
    /// With more than one file, parallel execution must be available and `host_args` must not
    /// set the worker count or distribution mode themselves.
    pub fn plan<S: AsRef<str>>(&self, host_args: &[S]) -> Result<ReplayPlan, WorkerPlanError> {
        if self.num_files <= 1 {
            return Ok(ReplayPlan::Unchanged);
        }
        if self.parallel_support == ParallelSupport::Unavailable {
            return Err(WorkerPlanError::ParallelUnavailable {
                num_files: self.num_files,
            });
        }

        let conflicting = host_args
            .iter()
            .map(AsRef::as_ref)
            .filter(|arg| is_worker_flag(arg))
            .map(ToOwned::to_owned)
            .collect_vec();
        if !conflicting.is_empty() {
            return Err(WorkerPlanError::ConflictingFlags { flags: conflicting });
        }

        Ok(ReplayPlan::Grouped(WorkerPlan {
            num_workers: self.num_files,
            distribution: DistributionMode::LoadGroup,
        }))
    }

    /// Returns the environment a worker process should be started with.
    pub fn worker_env(
        session_start: SessionStart,
        worker_id: &WorkerId,
    ) -> Vec<(&'static str, String)> {
        vec![
            (WORKER_ENV, worker_id.to_string()),
            (SESSION_START_ENV, session_start.to_env_value()),
        ]
    }
}

fn is_worker_flag(arg: &str) -> bool {
    let flag = arg.split_once('=').map_or(arg, |(flag, _)| flag);
    WORKER_FLAGS.contains(&flag)
}

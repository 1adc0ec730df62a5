// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use super::commands::{CleanOpts, FilterOpts, ListOpts, PlanOpts, RecordOpts};
use crate::{
    Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::Subcommand;

/// Record test runs as they happen, and replay them later in the same order.
///
/// Host test frameworks pipe their lifecycle events into `test-replay record`, and consult
/// `test-replay filter` to decide which collected tests to run when replaying.
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct TestReplayApp {
    #[command(flatten)]
    output: OutputOpts,

    /// Config file [default: .config/test-replay.toml in the current directory]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

impl TestReplayApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let config_file = self.config_file.as_deref();
        match self.command {
            Command::Record(opts) => opts.exec(config_file, output_writer),
            Command::List(opts) => opts.exec(output, output_writer),
            Command::Filter(opts) => opts.exec(output_writer),
            Command::Plan(opts) => opts.exec(output_writer),
            Command::Clean(opts) => opts.exec(config_file, output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record lifecycle events read from standard input
    ///
    /// Each line of input is a JSON object with an `event` key: `test-started`,
    /// `phase-finished` or `metadata`. A start line and a finish line are appended to the
    /// record file for every test, so that a run that dies midway still leaves a usable record.
    Record(RecordOpts),

    /// List the tests of a replay, in replay order
    List(ListOpts),

    /// Narrow a collected test list down to the tests of a replay
    ///
    /// Reads node IDs one per line and prints the ones being replayed, in replay order. With
    /// more than one replay file, each node ID is followed by a tab and the worker group it is
    /// pinned to.
    Filter(FilterOpts),

    /// Print the worker layout a replay of several files needs
    ///
    /// Prints the host arguments with the worker count and distribution mode appended, followed
    /// by the environment of each worker.
    Plan(PlanOpts),

    /// Remove record files left behind by previous runs
    Clean(CleanOpts),
}

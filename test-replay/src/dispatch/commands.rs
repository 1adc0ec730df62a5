// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{NO_HEADING, OutputContext, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, ValueEnum};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style, style};
use replay_metadata::{LifecycleEvent, ReplayExitCode, TestOutcome, TestRecord};
use replay_runner::{
    clock::{MonotonicClock, SessionStart},
    config::{RecordOverrides, ReplayConfig, current_dir},
    coordinator::{ParallelSupport, ReplayPlan, WorkerCoordinator},
    errors::RunContextError,
    filter::{CollectedTest, ReplayFilter},
    record::{EventRecorder, LifecycleListener, ReplayIndex, ReplayLoader},
    run_context::{RunContext, RunRole, WORKER_ENV, WorkerId},
};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
};
use tracing::{debug, info, warn};

/// Where record files go.
#[derive(Debug, Args)]
pub(super) struct StoreOpts {
    /// Directory to write record files to [default: `record.dir` from the config]
    #[arg(
        long = "replay-record-dir",
        value_name = "DIR",
        env = "TEST_REPLAY_RECORD_DIR"
    )]
    record_dir: Option<Utf8PathBuf>,

    /// Base name of record files [default: .test-replay]
    #[arg(
        long = "replay-base-name",
        value_name = "NAME",
        env = "TEST_REPLAY_BASE_NAME"
    )]
    base_name: Option<String>,
}

impl StoreOpts {
    fn load_config(
        &self,
        config_file: Option<&Utf8Path>,
        skip_cleanup: bool,
    ) -> Result<ReplayConfig> {
        let workspace_root = current_dir()?;
        let overrides = RecordOverrides {
            dir: self.record_dir.clone(),
            base_name: self.base_name.clone(),
            skip_cleanup,
        };
        Ok(ReplayConfig::from_sources(
            &workspace_root,
            config_file,
            &overrides,
        )?)
    }
}

/// The record files of a replay.
#[derive(Debug, Args)]
pub(super) struct ReplayOpts {
    /// Record files to replay, in order
    ///
    /// With more than one file, every file is replayed on a worker of its own.
    #[arg(long = "replay", value_name = "FILE", num_args = 1.., required = true)]
    files: Vec<Utf8PathBuf>,
}

impl ReplayOpts {
    fn load(&self) -> Result<ReplayIndex> {
        Ok(ReplayLoader::new(self.files.iter().cloned()).load()?)
    }
}

#[derive(Debug, Args)]
pub(super) struct RecordOpts {
    #[command(flatten)]
    store: StoreOpts,

    /// Keep record files of previous runs and append to them
    #[arg(long = "replay-skip-cleanup", env = "TEST_REPLAY_SKIP_CLEANUP")]
    skip_cleanup: bool,

    /// Number of workers in the run; 0 or 1 for a serial run
    #[arg(long, value_name = "N", default_value_t = 1)]
    workers: usize,

    /// Worker identity of this process, set for each worker of a parallel run
    #[arg(long, value_name = "ID", env = WORKER_ENV)]
    worker_id: Option<String>,
}

impl RecordOpts {
    pub(super) fn exec(
        self,
        config_file: Option<&Utf8Path>,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let config = self.store.load_config(config_file, self.skip_cleanup)?;
        let store = config
            .record_store()
            .ok_or(ExpectedError::RecordDirNotSet)?;

        let worker_id = self.worker_id;
        let context = RunContext::from_env_with(Box::new(MonotonicClock), self.workers, |var| {
            if var == WORKER_ENV {
                worker_id.clone()
            } else {
                std::env::var(var).ok()
            }
        })?;

        if let Some(header) = config.report_header() {
            info!(target: NO_HEADING, "{header}");
        }

        if let RunRole::Controller { num_workers } = context.role() {
            debug!("controlling a run of {num_workers} workers");
            let env = session_env_line(context.session_start());
            let mut writer = output_writer.stdout_writer();
            writeln!(writer, "{env}").map_err(ExpectedError::write_output_error)?;
            writer.flush().map_err(ExpectedError::write_output_error)?;
        }

        let mut recorder = EventRecorder::initialize(context, store, config.skip_cleanup())?;
        process_events(&mut recorder, io::stdin().lock())?;

        let summary = recorder.finish();
        if let Some(path) = &summary.path {
            debug!("recorded {} finished tests to {path}", summary.finished);
        }
        if !summary.unfinished.is_empty() {
            warn!(
                "{} tests started but never finished: {}",
                summary.unfinished.len(),
                summary.unfinished.iter().join(", "),
            );
        }

        Ok(ReplayExitCode::OK)
    }
}

/// Feeds lifecycle events, one JSON object per line, to `recorder`.
///
/// Blank lines are skipped.
pub(super) fn process_events(recorder: &mut EventRecorder, input: impl BufRead) -> Result<()> {
    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|err| ExpectedError::EventReadError { err })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: LifecycleEvent = serde_json::from_str(line)
            .map_err(|err| ExpectedError::event_parse_error(index + 1, err))?;

        match event {
            LifecycleEvent::TestStarted { nodeid } => recorder.on_test_start(&nodeid)?,
            LifecycleEvent::PhaseFinished {
                nodeid,
                phase,
                outcome,
            } => recorder.on_test_phase_finished(&nodeid, phase, outcome)?,
            LifecycleEvent::Metadata { nodeid, key, value } => {
                if recorder.context().records() {
                    recorder.metadata_mut(&nodeid).insert(key, value);
                }
            }
        }
    }
    Ok(())
}

fn session_env_line(session_start: SessionStart) -> String {
    format!(
        "{}={}",
        replay_runner::clock::SESSION_START_ENV,
        session_start.to_env_value()
    )
}

/// Output formats for `list`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(super) enum MessageFormat {
    /// A line per test, for people
    #[default]
    Human,
    /// A JSON array of records
    Json,
}

#[derive(Debug, Args)]
pub(super) struct ListOpts {
    #[command(flatten)]
    replay: ReplayOpts,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormat,

    /// Only list tests that ran to completion
    #[arg(long)]
    completed_only: bool,
}

impl ListOpts {
    pub(super) fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let index = self.replay.load()?;
        let records: Vec<&TestRecord> = if self.completed_only {
            index.completed().collect()
        } else {
            index.iter().collect()
        };

        let mut writer = output_writer.stdout_writer();
        match self.message_format {
            MessageFormat::Human => {
                let styles = ListStyles::new(output);
                for record in &records {
                    write_human_record(&mut writer, record, &styles)
                        .map_err(ExpectedError::write_output_error)?;
                }
            }
            MessageFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, &records)
                    .map_err(|err| ExpectedError::SerializeOutputError { err })?;
                writeln!(writer).map_err(ExpectedError::write_output_error)?;
            }
        }
        writer.flush().map_err(ExpectedError::write_output_error)?;

        Ok(ReplayExitCode::OK)
    }
}

#[derive(Debug, Default)]
struct ListStyles {
    nodeid: Style,
    passed: Style,
    failed: Style,
    skipped: Style,
    unfinished: Style,
}

impl ListStyles {
    fn new(output: OutputContext) -> Self {
        if !output.color.should_colorize(supports_color::Stream::Stdout) {
            return Self::default();
        }
        Self {
            nodeid: style().bold(),
            passed: style().green(),
            failed: style().red().bold(),
            skipped: style().yellow(),
            unfinished: style().magenta().bold(),
        }
    }
}

fn write_human_record(
    writer: &mut impl Write,
    record: &TestRecord,
    styles: &ListStyles,
) -> io::Result<()> {
    write!(writer, "{}", record.nodeid.style(styles.nodeid))?;
    match (record.finish, record.outcome) {
        (Some(finish), outcome) => {
            let (label, style) = match outcome {
                Some(TestOutcome::Passed) | None => ("passed", styles.passed),
                Some(TestOutcome::Failed) => ("failed", styles.failed),
                Some(TestOutcome::Skipped) => ("skipped", styles.skipped),
            };
            write!(
                writer,
                "  {} [{:.3}s]",
                label.style(style),
                finish - record.start
            )?;
        }
        (None, _) => write!(writer, "  {}", "unfinished".style(styles.unfinished))?,
    }
    if let Some(group) = &record.worker_group {
        write!(writer, "  ({group})")?;
    }
    writeln!(writer)
}

#[derive(Debug, Args)]
pub(super) struct FilterOpts {
    #[command(flatten)]
    replay: ReplayOpts,

    /// File listing collected node IDs, one per line [default: standard input]
    #[arg(long, value_name = "PATH")]
    collected: Option<Utf8PathBuf>,
}

impl FilterOpts {
    pub(super) fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let index = self.replay.load()?;
        let collected = match &self.collected {
            Some(path) => {
                let file = File::open(path)
                    .map_err(|err| ExpectedError::collected_read_error(Some(path.clone()), err))?;
                read_collected(BufReader::new(file))
                    .map_err(|err| ExpectedError::collected_read_error(Some(path.clone()), err))?
            }
            None => read_collected(io::stdin().lock())
                .map_err(|err| ExpectedError::collected_read_error(None, err))?,
        };

        let outcome = ReplayFilter::new(&index).on_collection_built(collected);
        info!(
            "replaying {} tests, {} deselected",
            outcome.remaining.len(),
            outcome.deselected.len()
        );

        let mut writer = output_writer.stdout_writer();
        for item in &outcome.remaining {
            match &item.group {
                Some(group) => writeln!(writer, "{}\t{group}", item.nodeid),
                None => writeln!(writer, "{}", item.nodeid),
            }
            .map_err(ExpectedError::write_output_error)?;
        }
        writer.flush().map_err(ExpectedError::write_output_error)?;

        Ok(ReplayExitCode::OK)
    }
}

fn read_collected(input: impl BufRead) -> io::Result<Vec<CollectedTest>> {
    let mut collected = Vec::new();
    for line in input.lines() {
        let line = line?;
        let nodeid = line.trim();
        if !nodeid.is_empty() {
            collected.push(CollectedTest::new(nodeid));
        }
    }
    Ok(collected)
}

#[derive(Debug, Args)]
pub(super) struct PlanOpts {
    #[command(flatten)]
    replay: ReplayOpts,

    /// The host can't run tests across several worker processes
    #[arg(long)]
    no_parallel_support: bool,

    /// Arguments the host was invoked with
    #[arg(last = true, value_name = "HOST_ARGS")]
    host_args: Vec<String>,
}

impl PlanOpts {
    pub(super) fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let support = if self.no_parallel_support {
            ParallelSupport::Unavailable
        } else {
            ParallelSupport::Available
        };
        let plan = WorkerCoordinator::new(self.replay.files.len(), support).plan(&self.host_args)?;

        let mut writer = output_writer.stdout_writer();
        match plan {
            ReplayPlan::Unchanged => {
                writeln!(writer, "{}", shell_words::join(&self.host_args))
                    .map_err(ExpectedError::write_output_error)?;
            }
            ReplayPlan::Grouped(plan) => {
                let args = self.host_args.iter().cloned().chain(plan.host_args());
                writeln!(writer, "{}", shell_words::join(args))
                    .map_err(ExpectedError::write_output_error)?;

                let session_start = SessionStart::capture(&MonotonicClock);
                for i in 0..plan.num_workers {
                    let worker_id = WorkerId::new(format!("gw{i}")).map_err(|error| {
                        RunContextError::InvalidWorkerId {
                            var: WORKER_ENV,
                            error,
                        }
                    })?;
                    writeln!(writer, "{}", env_assignments(session_start, &worker_id))
                        .map_err(ExpectedError::write_output_error)?;
                }
            }
        }
        writer.flush().map_err(ExpectedError::write_output_error)?;

        Ok(ReplayExitCode::OK)
    }
}

/// Renders a worker's environment as shell assignments that can prefix a command.
///
/// Only values are quoted: a quoted `VAR=value` word is an argument, not an assignment.
fn env_assignments(session_start: SessionStart, worker_id: &WorkerId) -> String {
    WorkerCoordinator::worker_env(session_start, worker_id)
        .into_iter()
        .map(|(var, value)| format!("{var}={}", shell_words::quote(&value)))
        .join(" ")
}

#[derive(Debug, Args)]
pub(super) struct CleanOpts {
    #[command(flatten)]
    store: StoreOpts,

    /// Remove the files of parallel runs (`<base>-<worker>.txt`) instead of `<base>.txt`
    #[arg(long)]
    parallel: bool,
}

impl CleanOpts {
    pub(super) fn exec(
        self,
        config_file: Option<&Utf8Path>,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let config = self.store.load_config(config_file, false)?;
        let store = config
            .record_store()
            .ok_or(ExpectedError::RecordDirNotSet)?;

        let removed = store.cleanup(self.parallel)?;
        let mut writer = output_writer.stdout_writer();
        for path in &removed {
            writeln!(writer, "{path}").map_err(ExpectedError::write_output_error)?;
        }
        writer.flush().map_err(ExpectedError::write_output_error)?;

        Ok(ReplayExitCode::OK)
    }
}

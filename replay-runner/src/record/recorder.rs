// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::store::{RecordFile, RecordStore};
use crate::{
    errors::{RecordEventError, RecordStoreError},
    run_context::RunContext,
};
use camino::Utf8PathBuf;
use indexmap::{IndexMap, IndexSet};
use replay_metadata::{TestOutcome, TestPhase, TestRecord};
use tracing::debug;

/// Receives the lifecycle events of a test run.
///
/// Events for a single process arrive sequentially: `on_test_start` once per test, followed by
/// `on_test_phase_finished` for each of its phases, the last of which is the teardown.
pub trait LifecycleListener {
    /// Called when a test is about to run its first phase.
    fn on_test_start(&mut self, nodeid: &str) -> Result<(), RecordEventError>;

    /// Called when one phase of a test has finished.
    fn on_test_phase_finished(
        &mut self,
        nodeid: &str,
        phase: TestPhase,
        outcome: TestOutcome,
    ) -> Result<(), RecordEventError>;
}

/// Combines the outcome recorded so far with the outcome of a phase that just finished.
///
/// A failure sticks. Otherwise a skip or failure replaces what was there, and a pass never
/// replaces anything.
pub fn resolve_outcome(current: Option<TestOutcome>, phase: TestOutcome) -> TestOutcome {
    match (current, phase) {
        (Some(TestOutcome::Failed), _) => TestOutcome::Failed,
        (_, TestOutcome::Failed | TestOutcome::Skipped) => phase,
        (Some(current), TestOutcome::Passed) => current,
        (None, TestOutcome::Passed) => TestOutcome::Passed,
    }
}

/// Writes a start line and a finish line for every test to the record store.
#[derive(Debug)]
pub struct EventRecorder {
    context: RunContext,
    store: RecordStore,
    file: Option<RecordFile>,
    records: IndexMap<String, TestRecord>,
    written: IndexSet<String>,
}

impl EventRecorder {
    /// Creates a new recorder without touching the file system.
    ///
    /// The record file is opened on the first write.
    pub fn new(context: RunContext, store: RecordStore) -> Self {
        Self {
            context,
            store,
            file: None,
            records: IndexMap::new(),
            written: IndexSet::new(),
        }
    }

    /// Creates a new recorder for the start of a run.
    ///
    /// Unless `skip_cleanup` is set, record files left behind by a previous run of the same kind
    /// are removed first. Workers never clean up: their controller has already done so.
    pub fn initialize(
        context: RunContext,
        store: RecordStore,
        skip_cleanup: bool,
    ) -> Result<Self, RecordStoreError> {
        if context.performs_cleanup() && !skip_cleanup {
            store.cleanup(context.is_parallel())?;
        }
        Ok(Self::new(context, store))
    }

    /// Returns the run context.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Returns the store records are written to.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Returns the record for `nodeid`, creating an empty one if this is the first time the test
    /// is seen.
    pub fn record_mut(&mut self, nodeid: &str) -> &mut TestRecord {
        if !self.records.contains_key(nodeid) {
            self.records
                .insert(nodeid.to_owned(), TestRecord::new(nodeid));
        }
        // The key was inserted above if it was missing.
        &mut self.records[nodeid]
    }

    /// Returns the metadata of `nodeid`.
    ///
    /// Values stored here are part of every line written for the test afterwards. Set them
    /// while the test runs to have them land in its finish line.
    pub fn metadata_mut(&mut self, nodeid: &str) -> &mut IndexMap<String, serde_json::Value> {
        &mut self.record_mut(nodeid).metadata
    }

    /// Returns the record of `nodeid`, if any event was seen for it.
    pub fn record(&self, nodeid: &str) -> Option<&TestRecord> {
        self.records.get(nodeid)
    }

    /// Finishes recording, returning a summary of what was written.
    pub fn finish(self) -> RecordSummary {
        let unfinished: Vec<_> = self
            .written
            .iter()
            .filter(|nodeid| !self.records[nodeid.as_str()].is_complete())
            .cloned()
            .collect();
        RecordSummary {
            path: self.file.map(|file| file.path().to_owned()),
            finished: self.written.len() - unfinished.len(),
            unfinished,
        }
    }

    fn append(&mut self, nodeid: &str) -> Result<(), RecordEventError> {
        let line = self.records[nodeid]
            .to_json_line()
            .map_err(|error| RecordEventError::Serialize {
                nodeid: nodeid.to_owned(),
                error,
            })?;

        let file = match self.file.take() {
            Some(file) => file,
            None => self.store.open_for_append(self.context.worker_id())?,
        };
        self.file.insert(file).write_line(&line)?;
        self.written.insert(nodeid.to_owned());
        Ok(())
    }
}

impl LifecycleListener for EventRecorder {
    fn on_test_start(&mut self, nodeid: &str) -> Result<(), RecordEventError> {
        if !self.context.records() {
            return Ok(());
        }
        let start = self.context.elapsed();
        let record = self.record_mut(nodeid);
        // Metadata set before the test started is kept; timing and outcome start afresh.
        record.start = start;
        record.finish = None;
        record.outcome = None;
        debug!("{nodeid} started at {start:.6}s");
        self.append(nodeid)
    }

    fn on_test_phase_finished(
        &mut self,
        nodeid: &str,
        phase: TestPhase,
        outcome: TestOutcome,
    ) -> Result<(), RecordEventError> {
        if !self.context.records() {
            return Ok(());
        }
        let finish = phase.is_last().then(|| self.context.elapsed());
        let record = self.record_mut(nodeid);
        record.outcome = Some(resolve_outcome(record.outcome, outcome));
        let Some(finish) = finish else {
            return Ok(());
        };
        record.finish = Some(finish);
        debug!(
            "{nodeid} finished at {finish:.6}s: {}",
            record.outcome.map_or("unknown", TestOutcome::as_str)
        );
        self.append(nodeid)
    }
}

/// What an [`EventRecorder`] wrote over its lifetime.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordSummary {
    /// The record file written to, if anything was written.
    pub path: Option<Utf8PathBuf>,

    /// The number of tests whose last line written was a finish line.
    pub finished: usize,

    /// Tests that started but never finished, in the order they started.
    pub unfinished: Vec<String>,
}

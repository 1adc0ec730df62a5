// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use replay_metadata::{TestOutcome, TestPhase};
use replay_runner::{
    clock::{SessionStart, SteppingClock},
    errors::RecordEventError,
    filter::CollectedTest,
    record::{EventRecorder, LifecycleListener, RecordStore, RecordSummary},
    run_context::{RunContext, WorkerId},
};
use std::fs;

pub(crate) const BASE_NAME: &str = ".test-replay";

/// A test as the simulated host runs it.
#[derive(Clone, Debug)]
pub(crate) struct SimTest {
    pub(crate) nodeid: &'static str,
    pub(crate) phases: [TestOutcome; 3],
    pub(crate) metadata: Option<(&'static str, serde_json::Value)>,
}

impl SimTest {
    pub(crate) fn passing(nodeid: &'static str) -> Self {
        Self {
            nodeid,
            phases: [TestOutcome::Passed; 3],
            metadata: None,
        }
    }

    pub(crate) fn with_phases(nodeid: &'static str, phases: [TestOutcome; 3]) -> Self {
        Self {
            nodeid,
            phases,
            metadata: None,
        }
    }

    pub(crate) fn with_metadata(mut self, key: &'static str, value: serde_json::Value) -> Self {
        self.metadata = Some((key, value));
        self
    }
}

/// Runs a single test through the listener, the way a host framework reports it.
pub(crate) fn run_test(
    recorder: &mut EventRecorder,
    test: &SimTest,
) -> Result<(), RecordEventError> {
    recorder.on_test_start(test.nodeid)?;
    let phases = [TestPhase::Setup, TestPhase::Call, TestPhase::Teardown];
    for (phase, outcome) in phases.into_iter().zip(test.phases) {
        if phase == TestPhase::Call
            && let Some((key, value)) = &test.metadata
        {
            recorder
                .metadata_mut(test.nodeid)
                .insert((*key).to_owned(), value.clone());
        }
        recorder.on_test_phase_finished(test.nodeid, phase, outcome)?;
    }
    Ok(())
}

/// Runs a whole serial session, cleaning up first unless `skip_cleanup` is set.
pub(crate) fn run_serial(
    store: &RecordStore,
    tests: &[SimTest],
    skip_cleanup: bool,
) -> RecordSummary {
    let context = RunContext::controller(Box::new(SteppingClock::new(0.0, 1.0)), 1);
    let mut recorder =
        EventRecorder::initialize(context, store.clone(), skip_cleanup).expect("cleanup succeeded");
    for test in tests {
        run_test(&mut recorder, test).expect("test recorded");
    }
    recorder.finish()
}

/// Runs a parallel session: the controller cleans up, then each worker runs its share.
pub(crate) fn run_parallel(
    store: &RecordStore,
    workers: &[(&str, &[SimTest])],
) -> Vec<RecordSummary> {
    let controller = RunContext::controller(Box::new(SteppingClock::new(0.0, 1.0)), workers.len());
    let session_start = controller.session_start();
    let controller =
        EventRecorder::initialize(controller, store.clone(), false).expect("cleanup succeeded");
    assert_eq!(controller.finish(), RecordSummary::default());

    workers
        .iter()
        .map(|(id, tests)| worker_session(store, id, session_start, tests))
        .collect()
}

pub(crate) fn worker_session(
    store: &RecordStore,
    id: &str,
    session_start: SessionStart,
    tests: &[SimTest],
) -> RecordSummary {
    let context = RunContext::worker(
        Box::new(SteppingClock::new(session_start.reading() + 1.0, 1.0)),
        WorkerId::new(id).expect("valid worker ID"),
        session_start,
    );
    let mut recorder =
        EventRecorder::initialize(context, store.clone(), false).expect("workers don't clean up");
    for test in tests {
        run_test(&mut recorder, test).expect("test recorded");
    }
    recorder.finish()
}

pub(crate) fn read_lines(path: &Utf8Path) -> Vec<serde_json::Value> {
    fs::read_to_string(path)
        .expect("record file is readable")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is valid JSON"))
        .collect()
}

pub(crate) fn collected(ids: &[&str]) -> Vec<CollectedTest> {
    ids.iter().map(|id| CollectedTest::new(*id)).collect()
}

pub(crate) fn file_names(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<_> = dir
        .read_dir_utf8()
        .expect("record dir is readable")
        .map(|entry| entry.expect("dir entry is readable").file_name().to_owned())
        .collect();
    names.sort();
    names
}

pub(crate) fn record_path(dir: &Utf8Path, worker: Option<&str>) -> Utf8PathBuf {
    match worker {
        Some(worker) => dir.join(format!("{BASE_NAME}-{worker}.txt")),
        None => dir.join(format!("{BASE_NAME}.txt")),
    }
}

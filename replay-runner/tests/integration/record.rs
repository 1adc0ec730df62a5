// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use pretty_assertions::assert_eq;
use replay_metadata::TestOutcome::{Failed, Passed, Skipped};
use replay_runner::{
    clock::SteppingClock,
    config::{RecordOverrides, ReplayConfig},
    record::{EventRecorder, LifecycleListener, RecordStore, ReplayLoader},
    run_context::RunContext,
};
use serde_json::json;

#[test]
fn each_test_writes_start_then_finish() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);

    let summary = run_serial(
        &store,
        &[
            SimTest::passing("test_1.py::test_foo"),
            SimTest::with_phases("test_1.py::test_bar", [Passed, Failed, Skipped]),
        ],
        false,
    );

    let path = record_path(temp.path(), None);
    assert_eq!(summary.path.as_deref(), Some(path.as_path()));
    assert_eq!(
        read_lines(&path),
        [
            json!({"nodeid": "test_1.py::test_foo", "start": 1.0}),
            json!({"nodeid": "test_1.py::test_foo", "start": 1.0, "finish": 2.0, "outcome": "passed"}),
            json!({"nodeid": "test_1.py::test_bar", "start": 3.0}),
            json!({"nodeid": "test_1.py::test_bar", "start": 3.0, "finish": 4.0, "outcome": "failed"}),
        ]
    );
}

#[test]
fn serial_and_parallel_files_coexist() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);
    let gw0 = [SimTest::passing("test_1.py::test_foo")];
    let gw1 = [SimTest::passing("test_1.py::test_bar")];

    run_serial(&store, &[SimTest::passing("test_1.py::test_foo")], false);
    run_parallel(&store, &[("gw0", &gw0[..]), ("gw1", &gw1[..])]);
    assert_eq!(
        file_names(temp.path()),
        [".test-replay-gw0.txt", ".test-replay-gw1.txt", ".test-replay.txt"]
    );

    // Another serial run only replaces the serial file, and another parallel run only the
    // worker files.
    run_serial(&store, &[SimTest::passing("test_2.py::test_baz")], false);
    run_parallel(&store, &[("gw0", &gw1[..]), ("gw1", &gw0[..])]);

    assert_eq!(
        file_names(temp.path()),
        [".test-replay-gw0.txt", ".test-replay-gw1.txt", ".test-replay.txt"]
    );
    assert_eq!(read_lines(&record_path(temp.path(), None))[0]["nodeid"], "test_2.py::test_baz");
    assert_eq!(
        read_lines(&record_path(temp.path(), Some("gw0")))[0]["nodeid"],
        "test_1.py::test_bar"
    );
    assert_eq!(read_lines(&record_path(temp.path(), Some("gw1"))).len(), 2);
}

#[test]
fn workers_measure_from_shared_session_start() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);
    let gw0 = [SimTest::passing("a")];
    let gw1 = [SimTest::passing("b")];

    run_parallel(&store, &[("gw0", &gw0[..]), ("gw1", &gw1[..])]);

    for worker in ["gw0", "gw1"] {
        let lines = read_lines(&record_path(temp.path(), Some(worker)));
        assert_eq!(lines[0]["start"], 1.0, "worker {worker}");
        assert_eq!(lines[1]["finish"], 2.0, "worker {worker}");
    }
}

#[test]
fn skip_cleanup_appends() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);

    run_serial(&store, &[SimTest::passing("test_1.py::test_foo")], false);
    run_serial(&store, &[SimTest::passing("test_1.py::test_bar")], true);

    let nodeids: Vec<_> = read_lines(&record_path(temp.path(), None))
        .into_iter()
        .map(|line| line["nodeid"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(
        nodeids,
        [
            "test_1.py::test_foo",
            "test_1.py::test_foo",
            "test_1.py::test_bar",
            "test_1.py::test_bar",
        ]
    );

    // Without skip-cleanup, the previous run's lines are gone.
    run_serial(&store, &[SimTest::passing("test_1.py::test_baz")], false);
    assert_eq!(read_lines(&record_path(temp.path(), None)).len(), 2);
}

#[test]
fn crash_leaves_start_line_only() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);
    let context = RunContext::controller(Box::new(SteppingClock::new(0.0, 1.0)), 1);
    let mut recorder = EventRecorder::initialize(context, store, false).unwrap();

    run_test(&mut recorder, &SimTest::passing("test_1.py::test_ok")).unwrap();
    recorder.on_test_start("test_1.py::test_crash").unwrap();
    // The process goes away without running any further hooks.
    drop(recorder);

    let path = record_path(temp.path(), None);
    let lines = read_lines(&path);
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[2],
        json!({"nodeid": "test_1.py::test_crash", "start": 3.0})
    );

    let index = ReplayLoader::new([&path]).load().unwrap();
    assert_eq!(
        index.nodeids().collect::<Vec<_>>(),
        ["test_1.py::test_ok", "test_1.py::test_crash"]
    );
    assert_eq!(
        index
            .completed()
            .map(|record| record.nodeid.as_str())
            .collect::<Vec<_>>(),
        ["test_1.py::test_ok"]
    );
    assert_eq!(index.get("test_1.py::test_crash").unwrap().outcome, None);
}

#[test]
fn metadata_round_trips() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);

    run_serial(
        &store,
        &[
            SimTest::passing("test_1.py::test_seeded").with_metadata("seed", json!(1234)),
            SimTest::passing("test_1.py::test_plain"),
        ],
        false,
    );

    let path = record_path(temp.path(), None);
    let lines = read_lines(&path);
    assert_eq!(lines[1]["metadata"], json!({"seed": 1234}));
    assert!(lines[3].get("metadata").is_none());

    let index = ReplayLoader::new([&path]).load().unwrap();
    assert_eq!(
        index.metadata("test_1.py::test_seeded").unwrap()["seed"],
        json!(1234)
    );
    assert!(index.metadata("test_1.py::test_plain").unwrap().is_empty());
}

#[test]
fn working_directory_change_does_not_move_records() {
    let workspace = Utf8TempDir::new().unwrap();
    let elsewhere = Utf8TempDir::new().unwrap();
    let overrides = RecordOverrides {
        dir: Some("records".into()),
        ..Default::default()
    };
    let config = ReplayConfig::from_sources(workspace.path(), None, &overrides).unwrap();
    let store = config.record_store().expect("recording is enabled");
    assert!(store.dir().is_absolute());

    let context = RunContext::controller(Box::new(SteppingClock::new(0.0, 1.0)), 1);
    let mut recorder =
        EventRecorder::initialize(context, store, config.skip_cleanup()).unwrap();
    recorder.on_test_start("test_1.py::test_chdir").unwrap();

    // The test under record changes the working directory before finishing.
    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(elsewhere.path()).unwrap();
    let result = run_test(&mut recorder, &SimTest::passing("test_1.py::test_after"));
    std::env::set_current_dir(original).unwrap();
    result.unwrap();

    assert_eq!(
        file_names(&workspace.path().join("records")),
        [".test-replay.txt"]
    );
    assert_eq!(file_names(elsewhere.path()), Vec::<String>::new());
    assert_eq!(
        read_lines(&workspace.path().join("records").join(".test-replay.txt")).len(),
        3
    );
}

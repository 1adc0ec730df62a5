// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use replay_metadata::TestOutcome::{Failed, Passed, Skipped};
use replay_runner::{
    coordinator::{ParallelSupport, ReplayPlan, WorkerCoordinator},
    errors::{ReplayLoadError, WorkerPlanError},
    filter::ReplayFilter,
    record::{RecordStore, ReplayLoader},
};
use std::fs;

#[test]
fn round_trip_preserves_order() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);
    run_serial(
        &store,
        &[
            SimTest::passing("test_2.py::test_b"),
            SimTest::with_phases("test_1.py::test_a", [Passed, Failed, Passed]),
            SimTest::with_phases("test_1.py::test_c", [Skipped, Passed, Passed]),
        ],
        false,
    );

    let index = ReplayLoader::new([record_path(temp.path(), None)])
        .load()
        .unwrap();
    // The host collects in its own order.
    let outcome = ReplayFilter::new(&index).on_collection_built(collected(&[
        "test_1.py::test_a",
        "test_1.py::test_c",
        "test_2.py::test_b",
    ]));

    let completed: Vec<_> = index
        .completed()
        .map(|record| record.nodeid.as_str())
        .collect();
    let remaining: Vec<_> = outcome
        .remaining
        .iter()
        .map(|item| item.nodeid.as_str())
        .collect();
    assert_eq!(remaining, completed);
    assert_eq!(
        remaining,
        ["test_2.py::test_b", "test_1.py::test_a", "test_1.py::test_c"]
    );
    assert!(outcome.deselected.is_empty());
    assert_eq!(
        index
            .iter()
            .map(|record| record.outcome)
            .collect::<Vec<_>>(),
        [Some(Passed), Some(Failed), Some(Skipped)]
    );
}

#[test]
fn order_follows_file_not_collection() {
    let temp = Utf8TempDir::new().unwrap();
    let path = temp.path().join("replay.txt");
    fs::write(
        &path,
        indoc! {r#"
            # Written by hand.
            {"nodeid": "test_1.py::test_bar", "start": 0.0}
            {"nodeid": "test_1.py::test_foo", "start": 0.0}

            // Uncollected tests are ignored.
            {"nodeid": "test_1.py::test_gone", "start": 0.0}
        "#},
    )
    .unwrap();

    let index = ReplayLoader::new([&path]).load().unwrap();
    let outcome = ReplayFilter::new(&index).on_collection_built(collected(&[
        "test_1.py::test_foo",
        "test_1.py::test_bar",
        "test_1.py::test_baz",
    ]));

    assert_eq!(
        outcome.remaining,
        collected(&["test_1.py::test_bar", "test_1.py::test_foo"])
    );
    assert_eq!(outcome.deselected, collected(&["test_1.py::test_baz"]));
}

#[test]
fn multiple_files_fan_out_to_workers() {
    let temp = Utf8TempDir::new().unwrap();
    let store = RecordStore::new(temp.path(), BASE_NAME);
    let gw0 = [
        SimTest::passing("test_1.py::test_1"),
        SimTest::passing("test_1.py::test_2"),
    ];
    let gw1 = [
        SimTest::passing("test_2.py::test_1"),
        SimTest::passing("test_2.py::test_2"),
    ];
    run_parallel(&store, &[("gw0", &gw0[..]), ("gw1", &gw1[..])]);

    let paths = [
        record_path(temp.path(), Some("gw0")),
        record_path(temp.path(), Some("gw1")),
    ];
    let plan = WorkerCoordinator::new(paths.len(), ParallelSupport::Available)
        .plan(&["-v"])
        .unwrap();
    let ReplayPlan::Grouped(plan) = plan else {
        panic!("two files need a grouped plan, found {plan:?}");
    };
    assert_eq!(plan.host_args(), ["-n", "2", "--dist", "loadgroup"]);

    let index = ReplayLoader::new(paths).load().unwrap();
    let outcome = ReplayFilter::new(&index).on_collection_built(collected(&[
        "test_2.py::test_2",
        "test_2.py::test_1",
        "test_1.py::test_2",
        "test_1.py::test_1",
    ]));

    let pinned: Vec<_> = outcome
        .remaining
        .iter()
        .map(|item| (item.nodeid.as_str(), item.group.as_deref()))
        .collect();
    assert_eq!(
        pinned,
        [
            ("test_1.py::test_1", Some("replay-group-0")),
            ("test_1.py::test_2", Some("replay-group-0")),
            ("test_2.py::test_1", Some("replay-group-1")),
            ("test_2.py::test_2", Some("replay-group-1")),
        ]
    );
    assert!(outcome.deselected.is_empty());
}

#[test]
fn multiple_files_reject_worker_flags() {
    let coordinator = WorkerCoordinator::new(2, ParallelSupport::Available);
    let error = coordinator.plan(&["-x", "--dist=load"]).unwrap_err();
    assert!(
        matches!(error, WorkerPlanError::ConflictingFlags { ref flags } if flags == &["--dist=load"]),
        "unexpected error: {error:?}"
    );
    assert_eq!(
        error.to_string(),
        "cannot combine several replay files with `--dist=load`: the worker count and \
         distribution mode are derived from the replay files"
    );
}

#[test]
fn malformed_file_is_fatal() {
    let temp = Utf8TempDir::new().unwrap();
    let good = temp.path().join("good.txt");
    let bad = temp.path().join("bad.txt");
    fs::write(&good, "{\"nodeid\": \"a\", \"start\": 0.0}\n").unwrap();
    fs::write(&bad, "{\"nodeid\": \"b\", \"start\": 0.0}\nnot json\n").unwrap();

    let error = ReplayLoader::new([&good, &bad]).load().unwrap_err();
    match error {
        ReplayLoadError::Parse(error) => {
            assert_eq!(error.path(), &bad);
            assert_eq!(error.line_number(), 2);
            assert_eq!(error.line(), "not json");
        }
        other => panic!("expected a parse error, found {other:?}"),
    }
}

// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{TestOutcome, TestPhase};
use serde::{Deserialize, Serialize};

/// A lifecycle event emitted by a host test framework.
///
/// `test-replay record` reads a stream of these, one JSON object per line, and forwards them to
/// the event recorder. Hosts written in Rust call the recorder directly instead.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    /// A test is about to run its first phase.
    TestStarted {
        /// The test's node ID.
        nodeid: String,
    },

    /// One phase of a test finished.
    PhaseFinished {
        /// The test's node ID.
        nodeid: String,

        /// The phase that finished.
        phase: TestPhase,

        /// The outcome of that phase alone.
        outcome: TestOutcome,
    },

    /// The test attached a metadata value to its record.
    Metadata {
        /// The test's node ID.
        nodeid: String,

        /// The metadata key.
        key: String,

        /// The metadata value.
        value: serde_json::Value,
    },
}

impl LifecycleEvent {
    /// Returns the node ID this event refers to.
    pub fn nodeid(&self) -> &str {
        match self {
            Self::TestStarted { nodeid }
            | Self::PhaseFinished { nodeid, .. }
            | Self::Metadata { nodeid, .. } => nodeid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_event_stream() {
        let input = indoc! {r#"
            {"event": "test-started", "nodeid": "test_1.py::test_foo"}
            {"event": "metadata", "nodeid": "test_1.py::test_foo", "key": "seed", "value": 1234}
            {"event": "phase-finished", "nodeid": "test_1.py::test_foo", "phase": "teardown", "outcome": "passed"}
        "#};

        let events: Vec<LifecycleEvent> = input
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(
            events,
            vec![
                LifecycleEvent::TestStarted {
                    nodeid: "test_1.py::test_foo".to_owned(),
                },
                LifecycleEvent::Metadata {
                    nodeid: "test_1.py::test_foo".to_owned(),
                    key: "seed".to_owned(),
                    value: serde_json::json!(1234),
                },
                LifecycleEvent::PhaseFinished {
                    nodeid: "test_1.py::test_foo".to_owned(),
                    phase: TestPhase::Teardown,
                    outcome: TestOutcome::Passed,
                },
            ]
        );
        assert!(events.iter().all(|e| e.nodeid() == "test_1.py::test_foo"));
    }
}

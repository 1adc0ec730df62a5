// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::{fmt, str::FromStr};

/// The base name used for record files if none is configured.
pub const DEFAULT_BASE_NAME: &str = ".test-replay";

/// The extension used for record files, without the leading dot.
pub const RECORD_FILE_EXTENSION: &str = "txt";

/// A single line in a record file.
///
/// Records are written "clean": fields without a value are omitted rather than serialized as
/// `null`. A start line therefore only contains `nodeid` and `start`, and the finish line for the
/// same test is a superset of it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestRecord {
    /// The identifier of the test, as provided by the host framework.
    pub nodeid: String,

    /// Seconds between the session start and the moment the test started.
    #[serde(default)]
    pub start: f64,

    /// Seconds between the session start and the end of the test's last phase.
    ///
    /// `None` until the teardown phase finishes. A record without a finish time belongs to a
    /// test that was still running when its process went away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<f64>,

    /// The resolved outcome across all phases seen so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TestOutcome>,

    /// Free-form data attached by the test itself, for example a random seed.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub metadata: IndexMap<String, serde_json::Value>,

    /// The worker group this test is pinned to.
    ///
    /// Only set on records loaded from a replay of several files.
    #[serde(
        rename = "xdist_group",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub worker_group: Option<String>,
}

impl TestRecord {
    /// Creates an empty record for the given node ID.
    pub fn new(nodeid: impl Into<String>) -> Self {
        Self {
            nodeid: nodeid.into(),
            start: 0.0,
            finish: None,
            outcome: None,
            metadata: IndexMap::new(),
            worker_group: None,
        }
    }

    /// Returns true if the test ran to completion, i.e. a finish time was recorded.
    pub fn is_complete(&self) -> bool {
        self.finish.is_some()
    }

    /// Serializes this record as a single JSON line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The outcome of a test, or of a single phase of a test.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was skipped.
    Skipped,
}

impl TestOutcome {
    /// Returns the string representation used in record files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Returns all known outcomes.
    pub fn variants() -> &'static [&'static str] {
        &["passed", "failed", "skipped"]
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestOutcome {
    type Err = UnknownOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(UnknownOutcome {
                input: other.to_owned(),
            }),
        }
    }
}

/// Error returned while parsing a [`TestOutcome`] from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownOutcome {
    /// The input that couldn't be parsed.
    pub input: String,
}

impl fmt::Display for UnknownOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognized test outcome: {}\n(known values: {})",
            self.input,
            TestOutcome::variants().join(", ")
        )
    }
}

impl std::error::Error for UnknownOutcome {}

/// A phase of a single test's execution.
///
/// Every test goes through all three phases in order. The record for a test is finalized once
/// the teardown phase finishes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestPhase {
    /// Fixtures and other preconditions are being set up.
    Setup,

    /// The test body itself.
    Call,

    /// Fixtures are being torn down. This is always the last phase.
    Teardown,
}

impl TestPhase {
    /// Returns true if this is the final phase of a test.
    pub fn is_last(self) -> bool {
        matches!(self, Self::Teardown)
    }
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => f.write_str("setup"),
            Self::Call => f.write_str("call"),
            Self::Teardown => f.write_str("teardown"),
        }
    }
}

#[cfg(feature = "proptest1")]
mod proptest_impls {
    use super::*;
    use proptest::prelude::*;

    impl Arbitrary for TestOutcome {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                Just(TestOutcome::Passed),
                Just(TestOutcome::Failed),
                Just(TestOutcome::Skipped),
            ]
            .boxed()
        }
    }

    impl Arbitrary for TestPhase {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
            prop_oneof![
                Just(TestPhase::Setup),
                Just(TestPhase::Call),
                Just(TestPhase::Teardown),
            ]
            .boxed()
        }
    }
}

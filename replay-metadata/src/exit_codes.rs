// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `test-replay` failures.
///
/// `test-replay` may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ReplayExitCode {}

impl ReplayExitCode {
    /// No errors occurred and test-replay exited normally.
    pub const OK: i32 = 0;

    /// The command line was invalid: for example, several replay files were passed together with
    /// explicit worker-count or distribution flags, or parallel execution isn't available.
    ///
    /// This matches the usage-error status of common test frameworks, so host adapters can
    /// forward it unchanged.
    pub const USAGE_ERROR: i32 = 4;

    /// A user issue happened while setting up a test-replay invocation, such as an invalid
    /// configuration file.
    pub const SETUP_ERROR: i32 = 96;

    /// A replay file could not be read, or contained a malformed line.
    pub const REPLAY_LOAD_FAILED: i32 = 107;

    /// Writing to a record file produced an error.
    pub const WRITE_RECORD_FAILED: i32 = 110;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 111;
}

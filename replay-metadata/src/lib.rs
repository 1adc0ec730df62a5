// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to test-replay record files.
//!
//! A record file is UTF-8 text holding one JSON object per line. Each object is a
//! [`TestRecord`]: written once when a test starts and once more when its last phase finishes.
//! See the `replay-runner` crate for the recorder and the replay loader built on these types.

mod events;
mod exit_codes;
mod record;

pub use events::*;
pub use exit_codes::*;
pub use record::*;

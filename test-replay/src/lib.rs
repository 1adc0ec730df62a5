// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record test runs as they happen, and replay them later in the same order.
//!
//! `test-replay` is the command-line face of the `replay-runner` crate, for host test frameworks
//! that aren't written in Rust. A host pipes its lifecycle events into `test-replay record`, and
//! asks `test-replay filter` which of its collected tests to run, in which order, when replaying.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;

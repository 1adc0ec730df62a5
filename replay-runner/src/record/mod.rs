// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording test runs to disk, and loading them back for replay.
//!
//! The write path is the [`EventRecorder`], which turns lifecycle events into lines of a record
//! file managed by the [`RecordStore`]. The read path is the [`ReplayLoader`], which turns one or
//! more record files into a [`ReplayIndex`]. The two paths share nothing but the file format.

mod loader;
mod recorder;
mod store;

pub use loader::*;
pub use recorder::*;
pub use store::*;

// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for test-replay: recording the tests of a run to disk as they start and
//! finish, and replaying them later in the same order.
//!
//! The write path starts at [`record::EventRecorder`], which a host test framework feeds with
//! lifecycle events. The read path starts at [`record::ReplayLoader`], whose output is used by
//! [`filter::ReplayFilter`] to narrow down a collected test list. Replays of several files are
//! planned by [`coordinator::WorkerCoordinator`].

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod filter;
pub mod record;
pub mod run_context;

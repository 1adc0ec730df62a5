// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for recording and replaying.
//!
//! These tests drive the recorder the way a host framework would, using a simulated host from
//! [`fixtures`], and then read the resulting files back through the replay loader.

mod fixtures;
mod record;
mod replay;

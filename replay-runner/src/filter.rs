// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Narrowing a collected test list down to the tests of a replay.

use crate::record::ReplayIndex;
use std::collections::{HashMap, hash_map::Entry};
use tracing::{debug, warn};

/// A test collected by the host framework.
pub trait CollectedItem {
    /// Returns the node ID of this test.
    fn node_id(&self) -> &str;

    /// Pins this test to a worker group, so that the parallel layer runs it on the same worker
    /// as every other test in that group.
    fn pin_to_group(&mut self, group: &str);
}

/// A minimal [`CollectedItem`]: a node ID and the group it is pinned to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CollectedTest {
    /// The node ID of the test.
    pub nodeid: String,

    /// The worker group the test is pinned to.
    pub group: Option<String>,
}

impl CollectedTest {
    /// Creates a new, unpinned test.
    pub fn new(nodeid: impl Into<String>) -> Self {
        Self {
            nodeid: nodeid.into(),
            group: None,
        }
    }
}

impl CollectedItem for CollectedTest {
    fn node_id(&self) -> &str {
        &self.nodeid
    }

    fn pin_to_group(&mut self, group: &str) {
        self.group = Some(group.to_owned());
    }
}

/// The result of [`ReplayFilter::on_collection_built`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterOutcome<T> {
    /// The items to run, in replay order.
    pub remaining: Vec<T>,

    /// The items not being replayed, in collection order.
    pub deselected: Vec<T>,
}

/// Filters and reorders a collected test list according to a [`ReplayIndex`].
#[derive(Clone, Copy, Debug)]
pub struct ReplayFilter<'a> {
    index: &'a ReplayIndex,
}

impl<'a> ReplayFilter<'a> {
    /// Creates a new filter for the given replay.
    pub fn new(index: &'a ReplayIndex) -> Self {
        Self { index }
    }

    /// Splits `items` into the tests to replay and the rest.
    ///
    /// Remaining items are ordered as in the replay and pinned to their worker group, if they
    /// have one. Node IDs that are part of the replay but weren't collected are skipped. If the
    /// same node ID was collected more than once, only the first item is kept.
    pub fn on_collection_built<T: CollectedItem>(&self, items: Vec<T>) -> FilterOutcome<T> {
        let mut positions = HashMap::with_capacity(items.len());
        let mut slots = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            match positions.entry(item.node_id().to_owned()) {
                Entry::Vacant(entry) => {
                    entry.insert(position);
                }
                Entry::Occupied(entry) => {
                    warn!(
                        "test {} was collected more than once, deselecting the duplicate",
                        entry.key()
                    );
                }
            }
            slots.push(Some(item));
        }

        let mut remaining = Vec::with_capacity(self.index.len().min(positions.len()));
        let mut not_collected = 0_usize;
        for nodeid in self.index.nodeids() {
            let Some(&position) = positions.get(nodeid) else {
                debug!("{nodeid} is part of the replay but wasn't collected");
                not_collected += 1;
                continue;
            };
            // Each position is taken at most once because node IDs in the index are unique.
            let Some(mut item) = slots[position].take() else {
                continue;
            };
            if let Some(group) = self.index.worker_group(nodeid) {
                item.pin_to_group(group);
            }
            remaining.push(item);
        }

        let deselected: Vec<_> = slots.into_iter().flatten().collect();
        debug!(
            "replaying {} tests, deselected {}, {} not collected",
            remaining.len(),
            deselected.len(),
            not_collected,
        );
        FilterOutcome {
            remaining,
            deselected,
        }
    }
}

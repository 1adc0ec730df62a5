// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ReplayLoadError, ReplayParseError};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::{IndexMap, map::Entry};
use replay_metadata::TestRecord;
use std::fs;
use tracing::debug;

/// Returns the worker group label for the replay file at position `index`.
pub fn worker_group_label(index: usize) -> String {
    format!("replay-group-{index}")
}

/// Loads record files into a [`ReplayIndex`].
#[derive(Clone, Debug, Default)]
pub struct ReplayLoader {
    paths: Vec<Utf8PathBuf>,
}

impl ReplayLoader {
    /// Creates a loader for the given record files, in replay order.
    pub fn new(paths: impl IntoIterator<Item = impl Into<Utf8PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the files this loader reads.
    pub fn paths(&self) -> &[Utf8PathBuf] {
        &self.paths
    }

    /// Reads and parses every file.
    ///
    /// With more than one file, each record is tagged with the worker group of the file it came
    /// from (see [`worker_group_label`]).
    pub fn load(&self) -> Result<ReplayIndex, ReplayLoadError> {
        let tag_groups = self.paths.len() > 1;
        let mut index = ReplayIndex::default();
        for (file_index, path) in self.paths.iter().enumerate() {
            let contents = fs::read_to_string(path).map_err(|error| ReplayLoadError::Read {
                path: path.clone(),
                error,
            })?;
            let group = tag_groups.then(|| worker_group_label(file_index));
            index.add_contents(path, &contents, group.as_deref())?;
        }
        debug!(
            "loaded {} tests ({} completed) from {} replay file(s)",
            index.len(),
            index.completed().count(),
            self.paths.len(),
        );
        Ok(index)
    }
}

/// Tests listed in one or more record files, in replay order.
///
/// The order is the order in which node IDs were first seen, file by file. Each node ID maps to
/// its latest complete record, or to its first record if it never completed.
#[derive(Clone, Debug, Default)]
pub struct ReplayIndex {
    records: IndexMap<String, TestRecord>,
}

impl ReplayIndex {
    /// Parses the contents of a single record file and appends them to this index.
    ///
    /// `path` is only used for error messages. If `group` is set, every record is tagged with it.
    pub fn add_contents(
        &mut self,
        path: &Utf8Path,
        contents: &str,
        group: Option<&str>,
    ) -> Result<(), ReplayLoadError> {
        for (line_index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }

            let mut record: TestRecord = serde_json::from_str(line).map_err(|error| {
                ReplayLoadError::Parse(Box::new(ReplayParseError::new(
                    path,
                    line_index + 1,
                    line,
                    error,
                )))
            })?;
            if let Some(group) = group {
                record.worker_group = Some(group.to_owned());
            }
            self.insert(record);
        }
        Ok(())
    }

    fn insert(&mut self, record: TestRecord) {
        match self.records.entry(record.nodeid.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(record);
            }
            // Keeps the position of the first occurrence.
            Entry::Occupied(mut entry) if record.is_complete() => {
                entry.insert(record);
            }
            Entry::Occupied(_) => {}
        }
    }

    /// Returns the number of tests in this index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if this index contains no tests.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if `nodeid` is listed.
    pub fn contains(&self, nodeid: &str) -> bool {
        self.records.contains_key(nodeid)
    }

    /// Returns the record stored for `nodeid`.
    pub fn get(&self, nodeid: &str) -> Option<&TestRecord> {
        self.records.get(nodeid)
    }

    /// Returns the worker group `nodeid` is pinned to, if any.
    pub fn worker_group(&self, nodeid: &str) -> Option<&str> {
        self.get(nodeid)?.worker_group.as_deref()
    }

    /// Returns the metadata recorded for `nodeid`, for tests that want to reuse it while being
    /// replayed.
    pub fn metadata(&self, nodeid: &str) -> Option<&IndexMap<String, serde_json::Value>> {
        self.get(nodeid).map(|record| &record.metadata)
    }

    /// Iterates over node IDs in replay order.
    pub fn nodeids(&self) -> impl ExactSizeIterator<Item = &str> + '_ {
        self.records.keys().map(String::as_str)
    }

    /// Iterates over records in replay order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestRecord> + '_ {
        self.records.values()
    }

    /// Iterates over the records of tests that ran to completion, in replay order.
    ///
    /// Tests that only have a start line were still running when their process went away, and
    /// are left out.
    pub fn completed(&self) -> impl Iterator<Item = &TestRecord> + '_ {
        self.iter().filter(|record| record.is_complete())
    }
}

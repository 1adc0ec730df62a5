// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage of record files on disk.

use crate::{errors::RecordStoreError, run_context::WorkerId};
use camino::{Utf8Path, Utf8PathBuf};
use replay_metadata::RECORD_FILE_EXTENSION;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
};
use tracing::{debug, info};

/// Manages the record files of one directory and base name.
#[derive(Clone, Debug)]
pub struct RecordStore {
    dir: Utf8PathBuf,
    base_name: String,
}

impl RecordStore {
    /// Creates a new store.
    ///
    /// `dir` should be absolute, so that writes keep landing in the same place if the process
    /// changes its working directory. [`ReplayConfig`](crate::config::ReplayConfig) takes care
    /// of this.
    pub fn new(dir: impl Into<Utf8PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
        }
    }

    /// Returns the directory record files are stored in.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the base name of record files.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Returns the path of the record file for a worker, or for a serial run if `worker` is
    /// `None`.
    pub fn file_path(&self, worker: Option<&WorkerId>) -> Utf8PathBuf {
        let file_name = match worker {
            Some(worker) => format!("{}-{worker}.{RECORD_FILE_EXTENSION}", self.base_name),
            None => format!("{}.{RECORD_FILE_EXTENSION}", self.base_name),
        };
        self.dir.join(file_name)
    }

    /// Removes the record files a previous run of the same kind left behind.
    ///
    /// A serial run removes `<base>.txt`, and a parallel run removes every `<base>-*.txt`. Files
    /// of the other kind are kept. The directory is created if it doesn't exist.
    ///
    /// Returns the paths of the removed files, sorted.
    pub fn cleanup(&self, is_parallel: bool) -> Result<Vec<Utf8PathBuf>, RecordStoreError> {
        self.ensure_dir()?;

        let entries = self.dir.read_dir_utf8().map_err(|error| RecordStoreError::DirRead {
            dir: self.dir.clone(),
            error,
        })?;

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| RecordStoreError::DirRead {
                dir: self.dir.clone(),
                error,
            })?;
            if !self.matches_family(entry.file_name(), is_parallel) {
                continue;
            }
            let path = entry.into_path();
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                // Someone else got there first.
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(error) => return Err(RecordStoreError::Remove { path, error }),
            }
        }
        removed.sort_unstable();

        if !removed.is_empty() {
            info!(
                "removed {} record file(s) from previous runs in {}",
                removed.len(),
                self.dir
            );
        }
        Ok(removed)
    }

    /// Opens the record file for `worker` for appending, creating the directory and the file if
    /// necessary.
    pub fn open_for_append(
        &self,
        worker: Option<&WorkerId>,
    ) -> Result<RecordFile, RecordStoreError> {
        self.ensure_dir()?;
        let path = self.file_path(worker);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| RecordStoreError::Open {
                path: path.clone(),
                error,
            })?;
        debug!("opened record file {path} for appending");
        Ok(RecordFile { path, file })
    }

    fn ensure_dir(&self) -> Result<(), RecordStoreError> {
        fs::create_dir_all(&self.dir).map_err(|error| RecordStoreError::DirCreate {
            dir: self.dir.clone(),
            error,
        })
    }

    fn matches_family(&self, file_name: &str, is_parallel: bool) -> bool {
        let Some(stem) = file_name
            .strip_suffix(RECORD_FILE_EXTENSION)
            .and_then(|rest| rest.strip_suffix('.'))
        else {
            return false;
        };
        if is_parallel {
            stem.strip_prefix(self.base_name.as_str())
                .is_some_and(|rest| rest.starts_with('-'))
        } else {
            stem == self.base_name
        }
    }
}

/// A record file open for appending.
///
/// Every line written is synced to disk before [`write_line`](Self::write_line) returns, so the
/// file stays valid line by line even if the process is killed.
#[derive(Debug)]
pub struct RecordFile {
    path: Utf8PathBuf,
    file: File,
}

impl RecordFile {
    /// Returns the path of this file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Appends `line` followed by a newline.
    pub fn write_line(&mut self, line: &str) -> Result<(), RecordStoreError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        self.file
            .write_all(buf.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(|error| RecordStoreError::Write {
                path: self.path.clone(),
                error,
            })
    }
}

// Copyright (c) The test-replay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for test-replay.
//!
//! Configuration is layered, from lowest to highest priority:
//!
//! 1. the [default config](ReplayConfig::DEFAULT_CONFIG) embedded in the binary,
//! 2. `.config/test-replay.toml` in the workspace root, or the file passed in explicitly,
//! 3. [`RecordOverrides`], typically from the command line or the environment.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind, CurrentDirError},
    record::RecordStore,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigError, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Resolved configuration for recording.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayConfig {
    record_dir: Option<Utf8PathBuf>,
    base_name: String,
    skip_cleanup: bool,
}

impl ReplayConfig {
    /// The default location of the config within the workspace root.
    pub const CONFIG_PATH: &'static str = ".config/test-replay.toml";

    /// Contains the default config as a TOML file.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from `config_file`, or if not specified from
    /// `.config/test-replay.toml` in the workspace root, then applies `overrides`.
    ///
    /// `workspace_root` must be absolute: relative record directories are resolved against it.
    /// A missing `.config/test-replay.toml` is not an error, but an explicitly passed config
    /// file has to exist.
    pub fn from_sources(
        workspace_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        overrides: &RecordOverrides,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, required) = match config_file {
            Some(file) => (file.to_owned(), true),
            None => (workspace_root.join(Self::CONFIG_PATH), false),
        };

        let builder = Config::builder()
            .add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));

        let (deserialized, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        for path in &ignored {
            warn!("in config file {config_file}, ignoring unknown configuration key '{path}'");
        }

        let RecordConfigDeserialize {
            dir,
            base_name,
            skip_cleanup,
        } = deserialized.record;
        let record_dir = overrides.dir.as_ref().or(dir.as_ref());

        Ok(Self {
            record_dir: record_dir.map(|dir| absolutize(workspace_root, dir)),
            base_name: overrides.base_name.clone().unwrap_or(base_name),
            skip_cleanup: overrides.skip_cleanup || skip_cleanup,
        })
    }

    /// Returns the default config, with no record directory.
    pub fn default_config() -> Self {
        Self {
            record_dir: None,
            base_name: replay_metadata::DEFAULT_BASE_NAME.to_owned(),
            skip_cleanup: false,
        }
    }

    /// Returns the absolute directory records are written to, if recording is enabled.
    pub fn record_dir(&self) -> Option<&Utf8Path> {
        self.record_dir.as_deref()
    }

    /// Returns the base name of record files.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Returns true if record files of previous runs should be kept and appended to.
    pub fn skip_cleanup(&self) -> bool {
        self.skip_cleanup
    }

    /// Returns a store for the record directory, if recording is enabled.
    pub fn record_store(&self) -> Option<RecordStore> {
        self.record_dir
            .as_ref()
            .map(|dir| RecordStore::new(dir.clone(), self.base_name.clone()))
    }

    /// Returns the line hosts print at the top of their report while recording.
    pub fn report_header(&self) -> Option<String> {
        self.record_dir
            .as_ref()
            .map(|dir| format!("replay dir: {dir}"))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &config::ConfigBuilder<DefaultState>,
    ) -> Result<(ReplayConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: ReplayConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // serde_path_to_error already reports the key, so drop it from the config error.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// Settings that take precedence over config files.
#[derive(Clone, Debug, Default)]
pub struct RecordOverrides {
    /// The directory to write records to. Relative paths are resolved against the workspace
    /// root.
    pub dir: Option<Utf8PathBuf>,

    /// The base name of record files.
    pub base_name: Option<String>,

    /// Keep record files of previous runs.
    pub skip_cleanup: bool,
}

/// Returns the current directory, which relative paths passed on the command line are resolved
/// against.
pub fn current_dir() -> Result<Utf8PathBuf, CurrentDirError> {
    let dir = std::env::current_dir().map_err(CurrentDirError::GetCurrentDir)?;
    Utf8PathBuf::try_from(dir).map_err(CurrentDirError::InvalidUtf8)
}

fn absolutize(root: &Utf8Path, dir: &Utf8Path) -> Utf8PathBuf {
    if dir.is_absolute() {
        dir.to_owned()
    } else {
        root.join(dir)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReplayConfigDeserialize {
    record: RecordConfigDeserialize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RecordConfigDeserialize {
    #[serde(default)]
    dir: Option<Utf8PathBuf>,
    base_name: String,
    skip_cleanup: bool,
}

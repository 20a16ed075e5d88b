//! Persistent checkpoint file for provisioning progress.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::checkpoint::Checkpoint;

/// Default checkpoint file name, resolved against the working directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = "gateway_config.json";

/// Errors raised while reading or writing the checkpoint file.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// Raised when no checkpoint has been written yet.
    #[error("no checkpoint found at {path}")]
    NotFound {
        /// Location that was probed.
        path: Utf8PathBuf,
    },
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the checkpoint is not valid JSON.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the JSON has an unexpected shape.
    #[error("invalid checkpoint in {path}: {message}")]
    InvalidStructure {
        /// Path that had invalid content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

impl ConfigStoreError {
    /// Returns `true` when the error only means "no progress yet".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Abstraction over checkpoint persistence for dependency injection.
pub trait CheckpointStore {
    /// Location of the checkpoint, used in summaries and messages.
    fn path(&self) -> &Utf8Path;

    /// Reads the full checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::NotFound`] when no checkpoint exists, and
    /// other variants when the file cannot be read or parsed.
    fn load(&self) -> Result<Checkpoint, ConfigStoreError>;

    /// Merges `partial` into the stored checkpoint and writes it back.
    ///
    /// A missing or unreadable existing file is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError`] when the merged checkpoint cannot be
    /// written.
    fn save(&self, partial: Checkpoint) -> Result<Utf8PathBuf, ConfigStoreError>;

    /// Deletes the checkpoint, returning whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError::Io`] when an existing file cannot be
    /// removed.
    fn discard(&self) -> Result<bool, ConfigStoreError>;
}

/// JSON checkpoint file accessed through `cap-std`.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    path: Utf8PathBuf,
}

impl ConfigStore {
    /// Builds a store for the given checkpoint path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_FILE)
    }
}

impl CheckpointStore for ConfigStore {
    fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<Checkpoint, ConfigStoreError> {
        let contents = read_checkpoint(&self.path)?;
        parse_checkpoint(&self.path, &contents)
    }

    fn save(&self, partial: Checkpoint) -> Result<Utf8PathBuf, ConfigStoreError> {
        let mut current = match self.load() {
            Ok(existing) => existing,
            Err(ConfigStoreError::NotFound { .. }) => Checkpoint::default(),
            Err(err) => {
                warn!(path = %self.path, error = %err, "⚠️ Existing checkpoint unreadable, starting from empty");
                Checkpoint::default()
            }
        };
        current.merge(partial);
        write_checkpoint(&self.path, &current)?;
        Ok(self.path.clone())
    }

    fn discard(&self) -> Result<bool, ConfigStoreError> {
        let (dir, file_name) = match open_parent(&self.path) {
            Ok(opened) => opened,
            Err(ConfigStoreError::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };
        match dir.remove_file(file_name) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ConfigStoreError::Io {
                path: self.path.clone(),
                message: err.to_string(),
            }),
        }
    }
}

fn parent_of(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}

fn file_name_of(path: &Utf8Path) -> Result<&str, ConfigStoreError> {
    path.file_name()
        .ok_or_else(|| ConfigStoreError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("checkpoint path is missing a filename"),
        })
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), ConfigStoreError> {
    let parent = parent_of(path);
    let file_name = file_name_of(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => Ok((dir, file_name)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ConfigStoreError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(ConfigStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn read_checkpoint(path: &Utf8Path) -> Result<String, ConfigStoreError> {
    let (dir, file_name) = open_parent(path)?;
    dir.read_to_string(file_name).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            ConfigStoreError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigStoreError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    })
}

fn parse_checkpoint(path: &Utf8Path, contents: &str) -> Result<Checkpoint, ConfigStoreError> {
    let value: Value = serde_json::from_str(contents).map_err(|err| ConfigStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    if !value.is_object() {
        return Err(ConfigStoreError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("checkpoint root is not a JSON object"),
        });
    }

    serde_json::from_value(value).map_err(|err| ConfigStoreError::InvalidStructure {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn write_checkpoint(path: &Utf8Path, checkpoint: &Checkpoint) -> Result<(), ConfigStoreError> {
    let parent = parent_of(path);
    Dir::create_ambient_dir_all(parent, ambient_authority()).map_err(|err| {
        ConfigStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }
    })?;

    let file_name = file_name_of(path)?;
    let dir =
        Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ConfigStoreError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;

    let mut rendered =
        serde_json::to_string_pretty(checkpoint).map_err(|err| ConfigStoreError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    rendered.push('\n');

    // Readers only ever observe the old file or the complete new one.
    let staging = format!(".{file_name}.tmp");
    dir.write(&staging, rendered)
        .map_err(|err| ConfigStoreError::Io {
            path: parent.join(&staging),
            message: err.to_string(),
        })?;
    dir.rename(&staging, &dir, file_name)
        .map_err(|err| ConfigStoreError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

//! Per-machine state records under the store path.
//!
//! The orchestrator addresses machines by name across separate invocations;
//! the store keeps one JSON record per machine holding the provider instance
//! identifier. A record is written exactly once per created instance, which
//! preserves the single-handle invariant across processes.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MACHINES_DIR: &str = "machines";
const RECORD_FILE: &str = "machine.json";
const SSH_KEY_FILE: &str = "id_ed25519";

/// Errors raised while accessing the machine store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when parsing an existing record fails.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when a machine already has a recorded instance.
    #[error("machine {machine_name} already has instance {instance_id} recorded")]
    AlreadyRecorded {
        /// Machine name.
        machine_name: String,
        /// Instance identifier already on record.
        instance_id: String,
    },
}

/// Persistent record for one machine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MachineRecord {
    /// Machine name the orchestrator uses.
    pub machine_name: String,
    /// Provider instance identifier.
    pub instance_id: String,
}

/// Filesystem-backed store of machine records.
#[derive(Clone, Debug)]
pub struct MachineStore {
    root: Utf8PathBuf,
}

impl MachineStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding one machine's record and keys.
    #[must_use]
    pub fn machine_dir(&self, machine_name: &str) -> Utf8PathBuf {
        self.root.join(MACHINES_DIR).join(machine_name)
    }

    /// Path the machine's SSH private key is written to.
    #[must_use]
    pub fn ssh_key_path(&self, machine_name: &str) -> Utf8PathBuf {
        self.machine_dir(machine_name).join(SSH_KEY_FILE)
    }

    /// Loads the record for `machine_name`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem failures and
    /// [`StoreError::Parse`] when an existing record is malformed.
    pub fn load(&self, machine_name: &str) -> Result<Option<MachineRecord>, StoreError> {
        let record_path = self.machine_dir(machine_name).join(RECORD_FILE);
        let Some(dir) = self.open_machine_dir(machine_name)? else {
            return Ok(None);
        };
        if !dir.exists(RECORD_FILE) {
            return Ok(None);
        }
        let contents = dir.read_to_string(RECORD_FILE).map_err(|err| StoreError::Io {
            path: record_path.clone(),
            message: err.to_string(),
        })?;
        let record = serde_json::from_str(&contents).map_err(|err| StoreError::Parse {
            path: record_path,
            message: err.to_string(),
        })?;
        Ok(Some(record))
    }

    /// Saves a record for a newly created instance.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyRecorded`] when a record exists for the
    /// machine and [`StoreError::Io`] on filesystem failures.
    pub fn save(&self, record: &MachineRecord) -> Result<(), StoreError> {
        if let Some(existing) = self.load(&record.machine_name)? {
            return Err(StoreError::AlreadyRecorded {
                machine_name: existing.machine_name,
                instance_id: existing.instance_id,
            });
        }

        let machine_dir = self.machine_dir(&record.machine_name);
        std::fs::create_dir_all(&machine_dir).map_err(|err| StoreError::Io {
            path: machine_dir.clone(),
            message: err.to_string(),
        })?;
        let dir = Dir::open_ambient_dir(&machine_dir, ambient_authority()).map_err(|err| {
            StoreError::Io {
                path: machine_dir.clone(),
                message: err.to_string(),
            }
        })?;

        let contents = serde_json::to_string_pretty(record).map_err(|err| StoreError::Io {
            path: machine_dir.join(RECORD_FILE),
            message: err.to_string(),
        })?;
        dir.write(RECORD_FILE, contents.as_bytes())
            .map_err(|err| StoreError::Io {
                path: machine_dir.join(RECORD_FILE),
                message: err.to_string(),
            })
    }

    /// Removes the machine's record directory, including generated keys.
    /// Removing an absent machine is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem failures.
    pub fn remove(&self, machine_name: &str) -> Result<(), StoreError> {
        let machine_dir = self.machine_dir(machine_name);
        match std::fs::remove_dir_all(&machine_dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io {
                path: machine_dir,
                message: err.to_string(),
            }),
        }
    }

    fn open_machine_dir(&self, machine_name: &str) -> Result<Option<Dir>, StoreError> {
        let machine_dir = self.machine_dir(machine_name);
        match Dir::open_ambient_dir(&machine_dir, ambient_authority()) {
            Ok(dir) => Ok(Some(dir)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io {
                path: machine_dir,
                message: err.to_string(),
            }),
        }
    }
}

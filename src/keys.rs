//! SSH key-pair generation for created nodes.
//!
//! Each created instance gets a fresh Ed25519 key pair: the public half is
//! injected into instance metadata as an `authorized_keys` line and the
//! private half is written under the machine store path with owner-only
//! permissions.

use std::io::Write as _;

use camino::Utf8Path;
use cap_std::fs::OpenOptions;
use cap_std::{ambient_authority, fs_utf8::Dir};
use ssh_key::rand_core::OsRng;
use ssh_key::{Algorithm, LineEnding, PrivateKey};
use thiserror::Error;

/// Errors raised while generating or persisting SSH keys.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Raised when key generation or encoding fails.
    #[error("failed to generate SSH key pair: {0}")]
    Generate(String),
    /// Raised when writing key material to disk fails.
    #[error("failed to write {path}: {message}")]
    Write {
        /// Path that could not be written.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// A freshly generated SSH key pair.
pub struct SshKeyPair {
    private_openssh: String,
    public_openssh: String,
}

impl SshKeyPair {
    /// Generates a new Ed25519 key pair.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Generate`] when generation or encoding fails.
    pub fn generate() -> Result<Self, KeyError> {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519)
            .map_err(|err| KeyError::Generate(err.to_string()))?;
        let private_openssh = key
            .to_openssh(LineEnding::LF)
            .map_err(|err| KeyError::Generate(err.to_string()))?
            .to_string();
        let public_openssh = key
            .public_key()
            .to_openssh()
            .map_err(|err| KeyError::Generate(err.to_string()))?;
        Ok(Self {
            private_openssh,
            public_openssh,
        })
    }

    /// Returns the `authorized_keys` line for the public half.
    #[must_use]
    pub fn authorized_key(&self) -> &str {
        &self.public_openssh
    }

    /// Writes the private key to `path` with mode 0600 and the public key
    /// next to it with a `.pub` suffix. Parent directories are created as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Write`] when any filesystem operation fails.
    pub fn write_to(&self, path: &Utf8Path) -> Result<(), KeyError> {
        let parent = path.parent().ok_or_else(|| KeyError::Write {
            path: path.to_string(),
            message: String::from("path has no parent directory"),
        })?;
        let file_name = path.file_name().ok_or_else(|| KeyError::Write {
            path: path.to_string(),
            message: String::from("path has no file name"),
        })?;

        std::fs::create_dir_all(parent).map_err(|err| KeyError::Write {
            path: parent.to_string(),
            message: err.to_string(),
        })?;
        let dir =
            Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| KeyError::Write {
                path: parent.to_string(),
                message: err.to_string(),
            })?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use cap_std::fs::OpenOptionsExt as _;
            options.mode(0o600);
        }
        let mut private_file =
            dir.open_with(file_name, &options)
                .map_err(|err| KeyError::Write {
                    path: path.to_string(),
                    message: err.to_string(),
                })?;
        private_file
            .write_all(self.private_openssh.as_bytes())
            .map_err(|err| KeyError::Write {
                path: path.to_string(),
                message: err.to_string(),
            })?;

        let public_name = format!("{file_name}.pub");
        dir.write(&public_name, self.public_openssh.as_bytes())
            .map_err(|err| KeyError::Write {
                path: format!("{parent}/{public_name}"),
                message: err.to_string(),
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for SshKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Private key material stays out of debug output.
        f.debug_struct("SshKeyPair")
            .field("public_openssh", &self.public_openssh)
            .finish_non_exhaustive()
    }
}

//! Startup-script generation and user-data resolution.
//!
//! Created nodes receive a generated bootstrap script through instance
//! metadata. Callers may substitute their own cloud-init payload either
//! inline or via a file path; this module centralises the branching and
//! file loading logic so CLI and configuration paths stay consistent.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Errors raised while resolving cloud-init user-data.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CloudInitError {
    /// Raised when both inline and file sources are provided.
    #[error("cloud-init user-data cannot be provided both inline and via file")]
    BothProvided,
    /// Raised when an inline payload is empty or only whitespace.
    #[error("cloud-init user-data must not be empty")]
    InlineEmpty,
    /// Raised when a file path is empty or only whitespace.
    #[error("cloud-init user-data file path must not be empty")]
    FilePathEmpty,
    /// Raised when a file resolves to empty or only whitespace.
    #[error("cloud-init user-data file must not be empty")]
    FileEmpty,
    /// Raised when reading the file source fails.
    #[error("failed to read cloud-init user-data file `{path}`: {message}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Builds the default bootstrap script for a node.
///
/// The script relaxes the OS firewall, installs Docker, and grants the SSH
/// user access to the Docker socket, matching what the orchestrator expects
/// from a freshly provisioned node.
#[must_use]
pub fn bootstrap_script(ssh_user: &str) -> String {
    [
        "#!/bin/sh",
        "sudo /usr/sbin/ethtool --offload $(/usr/sbin/ip -o -4 route show to default | awk '{print $5}') tx off",
        "sudo iptables -F",
        "sudo setenforce 0",
        "sudo systemctl stop firewalld.service",
        "sudo systemctl disable firewalld.service",
        "curl https://releases.rancher.com/install-docker/18.09.9.sh | sh",
        &format!("sudo usermod -aG docker {ssh_user}"),
        "sudo systemctl enable docker",
        "sudo sysctl -w vm.max_map_count=262144",
    ]
    .join("\n")
}

/// Encodes a user-data payload the way the launch metadata expects it.
#[must_use]
pub fn encode_user_data(payload: &str) -> String {
    BASE64.encode(payload.as_bytes())
}

/// Resolves cloud-init user-data from either an inline value or a file.
///
/// Inline and file sources are mutually exclusive. Both values are trimmed
/// for emptiness checks, but the returned payload preserves the original
/// content.
///
/// # Errors
///
/// Returns [`CloudInitError`] when the inputs are invalid or the file cannot
/// be read.
pub fn resolve_user_data(
    inline: Option<&str>,
    file: Option<&str>,
) -> Result<Option<String>, CloudInitError> {
    if inline.is_some() && file.is_some() {
        return Err(CloudInitError::BothProvided);
    }

    if let Some(payload) = inline {
        validate_payload(payload)?;
        return Ok(Some(payload.to_owned()));
    }

    let Some(path) = file else {
        return Ok(None);
    };

    if path.trim().is_empty() {
        return Err(CloudInitError::FilePathEmpty);
    }

    let content = read_to_string_ambient(path).map_err(|message| CloudInitError::FileRead {
        path: path.to_owned(),
        message,
    })?;

    validate_payload(&content).map_err(|err| match err {
        CloudInitError::InlineEmpty => CloudInitError::FileEmpty,
        other => other,
    })?;

    Ok(Some(content))
}

/// Validates that a user-data payload is not empty/whitespace.
pub(crate) fn validate_payload(payload: &str) -> Result<(), CloudInitError> {
    if payload.trim().is_empty() {
        return Err(CloudInitError::InlineEmpty);
    }
    Ok(())
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_script_targets_the_ssh_user() {
        let script = bootstrap_script("opc");
        assert!(script.starts_with("#!/bin/sh"));
        assert!(script.contains("sudo usermod -aG docker opc"));
    }

    #[test]
    fn encode_user_data_produces_base64() {
        assert_eq!(encode_user_data("#!/bin/sh"), "IyEvYmluL3No");
    }

    #[test]
    fn inline_and_file_are_mutually_exclusive() {
        let result = resolve_user_data(Some("#cloud-config"), Some("payload.yml"));
        assert_eq!(result, Err(CloudInitError::BothProvided));
    }

    #[test]
    fn blank_inline_payload_is_rejected() {
        let result = resolve_user_data(Some("   "), None);
        assert_eq!(result, Err(CloudInitError::InlineEmpty));
    }

    #[test]
    fn absent_sources_resolve_to_none() {
        let result = resolve_user_data(None, None);
        assert_eq!(result, Ok(None));
    }
}

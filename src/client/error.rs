//! Error types for the OCI client.

use crate::config::ConfigError;
use crate::machine::RequestError;
use thiserror::Error;

use super::api::ApiError;

/// Errors raised by the OCI client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a lookup is attempted with missing inputs.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Raised when the requested image name cannot be resolved.
    #[error("no available image named '{name}' in compartment {compartment_id}")]
    ImageNotFound {
        /// Image name passed by the caller.
        name: String,
        /// Compartment used for the lookup.
        compartment_id: String,
    },
    /// Raised when a convergence wait exceeds its deadline.
    ///
    /// Distinct from [`ClientError::Api`]: the provider kept answering, but
    /// never reported the target state in time.
    #[error("timeout waiting for {action} on instance {instance_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Provider instance identifier.
        instance_id: String,
    },
    /// Raised when an instance has no configured VNICs.
    #[error("instance {instance_id} does not have any configured VNICs")]
    MissingVnic {
        /// Provider instance identifier.
        instance_id: String,
    },
    /// Raised when a VNIC carries no usable IP address.
    #[error("instance {instance_id} has a VNIC without an IP address")]
    MissingIp {
        /// Provider instance identifier.
        instance_id: String,
    },
    /// Wrapper for provider-level failures.
    #[error("provider error: {0}")]
    Api(#[from] ApiError),
}

impl From<RequestError> for ClientError {
    fn from(value: RequestError) -> Self {
        match value {
            RequestError::Validation(field) => Self::Validation(field),
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

//! Provider API surface consumed by the client.
//!
//! The compute, virtual-network, and identity services are collaborators
//! external to this crate; [`ProviderApi`] is the seam they are consumed
//! through, so lifecycle logic can be exercised against scripted fakes.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use super::types::{
    AvailabilityDomain, ImagePage, Instance, InstanceAction, LaunchDetails, Vnic, VnicAttachment,
};

/// Future returned by provider API calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Transport-level failures surfaced by a provider API implementation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when the request never produced an HTTP response.
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying error message.
        message: String,
    },
    /// Raised when the provider answered with a non-2xx status.
    #[error("provider returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },
    /// Raised when a 2xx response body could not be decoded.
    #[error("failed to decode provider response: {message}")]
    Decode {
        /// Underlying error message.
        message: String,
    },
}

impl ApiError {
    /// Whether a retry policy may re-issue the failed call.
    ///
    /// Transport failures and non-2xx statuses are retryable; a malformed
    /// 2xx body is not, since re-reading it would decode the same bytes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }
}

/// Minimal provider surface required by the lifecycle operations.
pub trait ProviderApi: Send + Sync {
    /// Submits a launch request and returns the created instance.
    fn launch_instance<'a>(&'a self, details: &'a LaunchDetails) -> ApiFuture<'a, Instance>;

    /// Reads one instance by identifier.
    fn get_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Instance>;

    /// Requests a power action against an instance.
    fn instance_action<'a>(
        &'a self,
        instance_id: &'a str,
        action: InstanceAction,
    ) -> ApiFuture<'a, Instance>;

    /// Terminates an instance. The provider completes the operation
    /// asynchronously; no convergence wait is implied.
    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()>;

    /// Lists one page of available images in a compartment, most recently
    /// created first.
    fn list_images<'a>(
        &'a self,
        compartment_id: &'a str,
        page: Option<&'a str>,
    ) -> ApiFuture<'a, ImagePage>;

    /// Lists the availability domains visible in a compartment.
    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ApiFuture<'a, Vec<AvailabilityDomain>>;

    /// Lists the VNIC attachments of an instance.
    fn list_vnic_attachments<'a>(
        &'a self,
        compartment_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VnicAttachment>>;

    /// Reads one VNIC by identifier.
    fn get_vnic<'a>(&'a self, vnic_id: &'a str) -> ApiFuture<'a, Vnic>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_and_status_are_retryable() {
        assert!(
            ApiError::Transport {
                message: String::from("connection reset")
            }
            .is_retryable()
        );
        assert!(
            ApiError::Status {
                status: 503,
                message: String::from("unavailable")
            }
            .is_retryable()
        );
    }

    #[test]
    fn decode_is_not_retryable() {
        assert!(
            !ApiError::Decode {
                message: String::from("missing field `id`")
            }
            .is_retryable()
        );
    }
}

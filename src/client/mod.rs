//! OCI client: lifecycle operations, convergence polling, and lookups.

mod api;
mod error;
mod lifecycle;
mod resolve;
mod rest;
mod sign;
mod types;

use std::time::Duration;

use crate::config::OciConfig;

pub use api::{ApiError, ApiFuture, ProviderApi};
pub use error::ClientError;
pub use rest::RestApi;
pub use types::{
    AgentConfig, AvailabilityDomain, CreateVnicDetails, Image, ImagePage, Instance,
    InstanceAction, InstanceSourceDetails, LaunchDetails, LifecycleState, Vnic, VnicAttachment,
};

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(300);
const PAGE_RETRY_ATTEMPTS: u32 = 3;
const PAGE_RETRY_BACKOFF: Duration = Duration::from_secs(3);

/// Fixed availability domain used on rover devices, which expose exactly one.
const ROVER_AVAILABILITY_DOMAIN: &str = "OREI-1-AD-1";
/// Fixed fault domain used on rover devices.
const ROVER_FAULT_DOMAIN: &str = "FAULT-DOMAIN-1";
/// Boot volume size requested on rover devices, in gigabytes.
const ROVER_BOOT_VOLUME_GB: i64 = 50;

/// Client implementing the instance lifecycle over a [`ProviderApi`].
///
/// The client holds no per-instance state; callers pass instance
/// identifiers explicitly and serialise concurrent operations against the
/// same instance themselves.
#[derive(Clone, Debug)]
pub struct OciClient<A> {
    api: A,
    is_rover: bool,
    poll_interval: Duration,
    wait_timeout: Duration,
    page_retry_attempts: u32,
    page_retry_backoff: Duration,
}

impl<A: ProviderApi> OciClient<A> {
    /// Constructs a client over the given provider API.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            is_rover: false,
            poll_interval: POLL_INTERVAL,
            wait_timeout: WAIT_TIMEOUT,
            page_retry_attempts: PAGE_RETRY_ATTEMPTS,
            page_retry_backoff: PAGE_RETRY_BACKOFF,
        }
    }

    /// Enables or disables rover launch semantics.
    #[must_use]
    pub const fn with_rover(mut self, is_rover: bool) -> Self {
        self.is_rover = is_rover;
        self
    }

    /// Overrides the convergence polling interval.
    ///
    /// This is primarily used by tests to keep wait scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Overrides the convergence wait deadline.
    ///
    /// This is primarily used by tests to keep timeout scenarios fast.
    #[must_use]
    pub const fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Overrides the backoff between image-listing retry attempts.
    ///
    /// This is primarily used by tests to keep retry scenarios fast.
    #[must_use]
    pub const fn with_page_retry_backoff(mut self, backoff: Duration) -> Self {
        self.page_retry_backoff = backoff;
        self
    }

    /// Returns the underlying provider API.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }
}

impl OciClient<RestApi> {
    /// Builds a client wired to the REST transport described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the configuration is incomplete
    /// or its key/certificate material cannot be loaded.
    pub fn from_config(config: &OciConfig) -> Result<Self, ClientError> {
        config.validate().map_err(ClientError::from)?;
        let api = RestApi::from_config(config).map_err(ClientError::from)?;
        Ok(Self::new(api).with_rover(config.is_rover()))
    }
}

//! Machine-lifecycle seam invoked by an external orchestrator.
//!
//! A [`Machine`] provisions, queries, and tears down one compute instance.
//! The driver implementation owns the provider-specific plumbing; the
//! orchestrator only sees this trait plus the [`MachineState`] enumeration.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use thiserror::Error;

/// External lifecycle state reported to the orchestrator.
///
/// Provider states are folded onto this smaller enumeration; values the
/// provider adds later fold onto [`MachineState::Unknown`] rather than
/// failing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MachineState {
    /// Instance is up and serving.
    Running,
    /// Instance is stopped or terminated.
    Stopped,
    /// Instance is on its way down.
    Stopping,
    /// Instance is provisioning or powering on.
    Starting,
    /// Provider reported a state with no external mapping.
    Unknown,
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Stopping => "stopping",
            Self::Starting => "starting",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Parameters required to launch a new instance.
///
/// The descriptor is immutable once built and submitted at most once; a
/// failed submission is reported to the caller without resubmission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchRequest {
    /// Display name for the instance.
    pub display_name: String,
    /// Availability domain, possibly abbreviated; the client resolves it
    /// against the compartment's domain list.
    pub availability_domain: String,
    /// Compartment in which the instance is created.
    pub compartment_id: String,
    /// Compute shape to request.
    pub shape: String,
    /// Pre-existing subnet for the primary VNIC.
    pub subnet_id: String,
    /// Human-readable image name. The client resolves this to a provider
    /// image identifier.
    pub image_name: String,
    /// OpenSSH `authorized_keys` line injected into instance metadata.
    pub ssh_authorized_keys: String,
    /// Startup script delivered as base64 user data, when present.
    pub user_data: Option<String>,
}

impl LaunchRequest {
    /// Starts a builder for a [`LaunchRequest`].
    #[must_use]
    pub fn builder() -> LaunchRequestBuilder {
        LaunchRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing. No network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any required field is empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.display_name.is_empty() {
            return Err(RequestError::Validation("display_name".to_owned()));
        }
        if self.availability_domain.is_empty() {
            return Err(RequestError::Validation("availability_domain".to_owned()));
        }
        if self.compartment_id.is_empty() {
            return Err(RequestError::Validation("compartment_id".to_owned()));
        }
        if self.shape.is_empty() {
            return Err(RequestError::Validation("shape".to_owned()));
        }
        if self.subnet_id.is_empty() {
            return Err(RequestError::Validation("subnet_id".to_owned()));
        }
        if self.image_name.is_empty() {
            return Err(RequestError::Validation("image_name".to_owned()));
        }
        if self.ssh_authorized_keys.is_empty() {
            return Err(RequestError::Validation("ssh_authorized_keys".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`LaunchRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchRequestBuilder {
    display_name: String,
    availability_domain: String,
    compartment_id: String,
    shape: String,
    subnet_id: String,
    image_name: String,
    ssh_authorized_keys: String,
    user_data: Option<String>,
}

impl LaunchRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, value: impl Into<String>) -> Self {
        self.display_name = value.into();
        self
    }

    /// Sets the availability domain.
    #[must_use]
    pub fn availability_domain(mut self, value: impl Into<String>) -> Self {
        self.availability_domain = value.into();
        self
    }

    /// Sets the compartment identifier.
    #[must_use]
    pub fn compartment_id(mut self, value: impl Into<String>) -> Self {
        self.compartment_id = value.into();
        self
    }

    /// Sets the compute shape.
    #[must_use]
    pub fn shape(mut self, value: impl Into<String>) -> Self {
        self.shape = value.into();
        self
    }

    /// Sets the subnet identifier.
    #[must_use]
    pub fn subnet_id(mut self, value: impl Into<String>) -> Self {
        self.subnet_id = value.into();
        self
    }

    /// Sets the image name.
    #[must_use]
    pub fn image_name(mut self, value: impl Into<String>) -> Self {
        self.image_name = value.into();
        self
    }

    /// Sets the SSH authorized-keys line.
    #[must_use]
    pub fn ssh_authorized_keys(mut self, value: impl Into<String>) -> Self {
        self.ssh_authorized_keys = value.into();
        self
    }

    /// Sets the optional user-data payload (already base64 encoded).
    #[must_use]
    pub fn user_data(mut self, value: Option<String>) -> Self {
        self.user_data = value;
        self
    }

    /// Builds and validates the [`LaunchRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when any required field is empty.
    pub fn build(self) -> Result<LaunchRequest, RequestError> {
        let request = LaunchRequest {
            display_name: self.display_name.trim().to_owned(),
            availability_domain: self.availability_domain.trim().to_owned(),
            compartment_id: self.compartment_id.trim().to_owned(),
            shape: self.shape.trim().to_owned(),
            subnet_id: self.subnet_id.trim().to_owned(),
            image_name: self.image_name.trim().to_owned(),
            ssh_authorized_keys: self.ssh_authorized_keys.trim().to_owned(),
            user_data: self.user_data,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Errors raised while constructing launch requests.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by machine operations.
pub type MachineFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Lifecycle interface a machine driver exposes to the orchestrator.
///
/// Concurrent operations against the *same* instance are the caller's
/// responsibility to serialise; the driver imposes no internal locking.
pub trait Machine {
    /// Driver-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short identifier for this driver (for example `oci`).
    fn driver_name(&self) -> &'static str;

    /// Username used for SSH connections to created instances.
    fn ssh_username(&self) -> String;

    /// TCP port used for SSH connections to created instances.
    fn ssh_port(&self) -> u16;

    /// Creates the instance this machine represents. The instance handle is
    /// recorded exactly once; a second create is an error.
    fn create(&mut self) -> MachineFuture<'_, (), Self::Error>;

    /// Starts the instance and waits until it reports Running.
    fn start(&self) -> MachineFuture<'_, (), Self::Error>;

    /// Stops the instance gracefully and waits until it reports Stopped.
    fn stop(&self) -> MachineFuture<'_, (), Self::Error>;

    /// Stops then starts the instance. A failed stop short-circuits; start
    /// is never attempted in that case.
    fn restart(&self) -> MachineFuture<'_, (), Self::Error>;

    /// Terminates the instance without waiting for convergence.
    fn remove(&self) -> MachineFuture<'_, (), Self::Error>;

    /// Forcefully stops the instance. Delegates to [`Machine::remove`].
    fn kill(&self) -> MachineFuture<'_, (), Self::Error>;

    /// Returns the instance's IP address, caching the first resolution.
    fn ip(&mut self) -> MachineFuture<'_, IpAddr, Self::Error>;

    /// Returns the external lifecycle state of the instance.
    fn state(&self) -> MachineFuture<'_, MachineState, Self::Error>;

    /// Returns a `tcp://<ip>:<port>` connection string for the instance.
    fn url(&mut self) -> MachineFuture<'_, String, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> LaunchRequestBuilder {
        LaunchRequest::builder()
            .display_name("node-1")
            .availability_domain("AD-1")
            .compartment_id("ocid1.compartment.oc1..aaaa")
            .shape("VM.Standard2.1")
            .subnet_id("ocid1.subnet.oc1..bbbb")
            .image_name("Oracle-Linux-7.7")
            .ssh_authorized_keys("ssh-ed25519 AAAA test")
    }

    #[test]
    fn build_trims_and_validates() {
        let request = base_builder()
            .display_name("  node-1  ")
            .build()
            .unwrap_or_else(|err| panic!("request should build: {err}"));
        assert_eq!(request.display_name, "node-1");
        assert!(request.user_data.is_none());
    }

    #[test]
    fn empty_builder_fails_on_first_field() {
        let error = LaunchRequest::builder().build();
        assert_eq!(
            error,
            Err(RequestError::Validation(String::from("display_name")))
        );
    }

    #[test]
    fn missing_image_name_is_reported() {
        let error = base_builder().image_name("").build();
        assert_eq!(
            error,
            Err(RequestError::Validation(String::from("image_name")))
        );
    }

    #[test]
    fn machine_state_display_labels() {
        assert_eq!(MachineState::Running.to_string(), "running");
        assert_eq!(MachineState::Unknown.to_string(), "unknown");
    }
}

//! Driver facade adapting the machine-lifecycle seam to OCI calls.
//!
//! The driver owns configuration plus one per-instance state record: the
//! provider instance identifier (set exactly once per created instance) and
//! a transiently cached IP address. The driver is the record's only writer,
//! and every lifecycle call addresses the recorded instance.

use std::net::IpAddr;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ClientError, LifecycleState, OciClient, RestApi};
use crate::cloud_init;
use crate::config::{ConfigError, OciConfig};
use crate::keys::{KeyError, SshKeyPair};
use crate::machine::{LaunchRequest, Machine, MachineFuture, MachineState, RequestError};
use crate::store::{MachineRecord, MachineStore, StoreError};

/// Prefix applied to generated instance display names.
const NODE_NAME_PREFIX: &str = "oci-node-driver-";

/// Errors raised by the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Raised when configuration is incomplete or unparseable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when a provider operation fails.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Raised when SSH key generation or persistence fails.
    #[error(transparent)]
    Key(#[from] KeyError),
    /// Raised when the machine store cannot be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Raised when a launch request cannot be built.
    #[error(transparent)]
    Request(#[from] RequestError),
    /// Raised when create is called on a machine that already has an
    /// instance recorded.
    #[error("machine {machine_name} already has a created instance")]
    AlreadyCreated {
        /// Machine name.
        machine_name: String,
    },
    /// Raised when a lifecycle call is made before any instance exists.
    #[error("machine {machine_name} has no created instance")]
    InstanceMissing {
        /// Machine name.
        machine_name: String,
    },
}

/// Per-instance runtime state owned by the driver.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct InstanceRecord {
    /// Provider identifier, set exactly once by create (or restore).
    instance_id: Option<String>,
    /// Cached IP, filled by the first successful lookup.
    ip_address: Option<IpAddr>,
}

/// Machine driver for OCI compute instances.
pub struct Driver {
    config: OciConfig,
    machine_name: String,
    store: MachineStore,
    record: InstanceRecord,
    user_data_override: Option<String>,
}

impl Driver {
    /// Creates a driver for a machine with no recorded instance.
    #[must_use]
    pub fn new(config: OciConfig, machine_name: impl Into<String>, store_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            config,
            machine_name: machine_name.into(),
            store: MachineStore::new(store_path),
            record: InstanceRecord::default(),
            user_data_override: None,
        }
    }

    /// Replaces the generated bootstrap script with a caller-supplied
    /// cloud-init payload for the next create.
    #[must_use]
    pub fn with_user_data(mut self, user_data: Option<String>) -> Self {
        self.user_data_override = user_data;
        self
    }

    /// Creates a driver and restores the machine's recorded instance from
    /// the store, when one exists.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Store`] when the record cannot be read.
    pub fn open(
        config: OciConfig,
        machine_name: impl Into<String>,
        store_path: impl Into<Utf8PathBuf>,
    ) -> Result<Self, DriverError> {
        let mut driver = Self::new(config, machine_name, store_path);
        if let Some(record) = driver.store.load(&driver.machine_name)? {
            debug!(
                machine_name = %driver.machine_name,
                instance_id = %record.instance_id,
                "restored machine record"
            );
            driver.record.instance_id = Some(record.instance_id);
        }
        Ok(driver)
    }

    /// Machine name this driver represents.
    #[must_use]
    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    /// Recorded instance identifier, when one exists.
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.record.instance_id.as_deref()
    }

    /// Verifies the configured image resolves in the node compartment,
    /// which also validates the credentials. Skipped in rover mode, where
    /// the device catalogue is not listable ahead of launch.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Client`] when resolution fails.
    pub async fn pre_create_check(&self) -> Result<(), DriverError> {
        if self.config.is_rover() {
            return Ok(());
        }
        info!("verifying node image availability");
        let client = self.client()?;
        client
            .resolve_image_id(&self.config.node_compartment_id, &self.config.node_image)
            .await?;
        Ok(())
    }

    fn client(&self) -> Result<OciClient<RestApi>, DriverError> {
        Ok(OciClient::from_config(&self.config)?)
    }

    fn required_instance_id(&self) -> Result<String, DriverError> {
        self.record
            .instance_id
            .clone()
            .ok_or_else(|| DriverError::InstanceMissing {
                machine_name: self.machine_name.clone(),
            })
    }

    async fn create_impl(&mut self) -> Result<(), DriverError> {
        debug!(machine_name = %self.machine_name, "oci create");
        if let Some(instance_id) = &self.record.instance_id {
            debug!(instance_id = %instance_id, "create refused; instance already recorded");
            return Err(DriverError::AlreadyCreated {
                machine_name: self.machine_name.clone(),
            });
        }

        let client = self.client()?;

        let key_pair = SshKeyPair::generate()?;
        key_pair.write_to(&self.store.ssh_key_path(&self.machine_name))?;

        let script = match &self.user_data_override {
            Some(payload) => payload.clone(),
            None => cloud_init::bootstrap_script(&self.config.ssh_user()),
        };
        let request = LaunchRequest::builder()
            .display_name(format!("{NODE_NAME_PREFIX}{}", self.machine_name))
            .availability_domain(&self.config.node_availability_domain)
            .compartment_id(&self.config.node_compartment_id)
            .shape(&self.config.node_shape)
            .subnet_id(&self.config.subnet_id)
            .image_name(&self.config.node_image)
            .ssh_authorized_keys(key_pair.authorized_key())
            .user_data(Some(cloud_init::encode_user_data(&script)))
            .build()?;

        let instance_id = client.launch(&request).await?;
        self.record.instance_id = Some(instance_id.clone());
        self.store.save(&MachineRecord {
            machine_name: self.machine_name.clone(),
            instance_id: instance_id.clone(),
        })?;
        info!(instance_id = %instance_id, "created instance");
        Ok(())
    }

    async fn start_impl(&self) -> Result<(), DriverError> {
        debug!(machine_name = %self.machine_name, "oci start");
        let instance_id = self.required_instance_id()?;
        Ok(self.client()?.start_instance(&instance_id).await?)
    }

    async fn stop_impl(&self) -> Result<(), DriverError> {
        debug!(machine_name = %self.machine_name, "oci stop");
        let instance_id = self.required_instance_id()?;
        Ok(self.client()?.stop_instance(&instance_id).await?)
    }

    async fn restart_impl(&self) -> Result<(), DriverError> {
        debug!(machine_name = %self.machine_name, "oci restart");
        let instance_id = self.required_instance_id()?;
        Ok(self.client()?.restart_instance(&instance_id).await?)
    }

    async fn remove_impl(&self) -> Result<(), DriverError> {
        debug!(machine_name = %self.machine_name, "oci remove");
        let instance_id = self.required_instance_id()?;
        self.client()?.terminate_instance(&instance_id).await?;
        self.store.remove(&self.machine_name)?;
        Ok(())
    }

    async fn ip_impl(&mut self) -> Result<IpAddr, DriverError> {
        debug!(machine_name = %self.machine_name, "oci ip");
        if let Some(address) = self.record.ip_address {
            return Ok(address);
        }
        let instance_id = self.required_instance_id()?;
        let address = self
            .client()?
            .instance_ip(&self.config.node_compartment_id, &instance_id)
            .await?;
        self.record.ip_address = Some(address);
        Ok(address)
    }

    async fn state_impl(&self) -> Result<MachineState, DriverError> {
        debug!(machine_name = %self.machine_name, "oci state");
        let instance_id = self.required_instance_id()?;
        let instance = self.client()?.instance(&instance_id).await?;
        Ok(machine_state(instance.lifecycle_state))
    }

    async fn url_impl(&mut self) -> Result<String, DriverError> {
        debug!(machine_name = %self.machine_name, "oci url");
        let address = self.ip_impl().await?;
        Ok(format!("tcp://{address}:{}", self.config.docker_port()))
    }
}

impl Machine for Driver {
    type Error = DriverError;

    fn driver_name(&self) -> &'static str {
        "oci"
    }

    fn ssh_username(&self) -> String {
        self.config.ssh_user()
    }

    fn ssh_port(&self) -> u16 {
        self.config.ssh_port()
    }

    fn create(&mut self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.create_impl())
    }

    fn start(&self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.start_impl())
    }

    fn stop(&self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.stop_impl())
    }

    fn restart(&self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.restart_impl())
    }

    fn remove(&self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.remove_impl())
    }

    fn kill(&self) -> MachineFuture<'_, (), Self::Error> {
        Box::pin(self.remove_impl())
    }

    fn ip(&mut self) -> MachineFuture<'_, IpAddr, Self::Error> {
        Box::pin(self.ip_impl())
    }

    fn state(&self) -> MachineFuture<'_, MachineState, Self::Error> {
        Box::pin(self.state_impl())
    }

    fn url(&mut self) -> MachineFuture<'_, String, Self::Error> {
        Box::pin(self.url_impl())
    }
}

/// Maps a provider lifecycle state onto the external state enumeration.
///
/// The mapping is total: every provider value, including ones added after
/// this driver was written, produces a [`MachineState`].
#[must_use]
pub const fn machine_state(state: LifecycleState) -> MachineState {
    match state {
        LifecycleState::Running => MachineState::Running,
        LifecycleState::Stopped | LifecycleState::Terminated => MachineState::Stopped,
        LifecycleState::Stopping | LifecycleState::Terminating => MachineState::Stopping,
        LifecycleState::Starting | LifecycleState::Provisioning | LifecycleState::CreatingImage => {
            MachineState::Starting
        }
        LifecycleState::Other => MachineState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_maps_to_stopped() {
        assert_eq!(
            machine_state(LifecycleState::Terminated),
            MachineState::Stopped
        );
    }

    #[test]
    fn unrecognised_states_map_to_unknown() {
        assert_eq!(machine_state(LifecycleState::Other), MachineState::Unknown);
    }
}

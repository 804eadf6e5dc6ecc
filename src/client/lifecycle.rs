//! Instance lifecycle operations and the state-convergence wait.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Instant;

use tokio::time::sleep;
use tracing::{debug, info};

use crate::machine::LaunchRequest;

use super::types::{
    AgentConfig, CreateVnicDetails, Instance, InstanceAction, InstanceSourceDetails,
    LaunchDetails, LifecycleState,
};
use super::{
    ClientError, OciClient, ProviderApi, ROVER_AVAILABILITY_DOMAIN, ROVER_BOOT_VOLUME_GB,
    ROVER_FAULT_DOMAIN,
};

/// Metadata key the provider recognises for SSH authorised keys.
const METADATA_SSH_KEYS: &str = "ssh_authorized_keys";
/// Metadata key the provider recognises for base64 user data.
const METADATA_USER_DATA: &str = "user_data";

impl<A: ProviderApi> OciClient<A> {
    /// Launches an instance and waits until it reports Running.
    ///
    /// The launch payload is submitted exactly once; a submission failure
    /// leaves no instance behind and is surfaced without resubmission. A
    /// status-read failure *after* submission aborts the wait immediately,
    /// which can leave a created instance behind for the caller to remove.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for an incomplete request,
    /// [`ClientError::ImageNotFound`] when the image cannot be resolved,
    /// [`ClientError::Timeout`] when the instance does not reach Running
    /// before the deadline, and [`ClientError::Api`] for provider failures.
    pub async fn launch(&self, request: &LaunchRequest) -> Result<String, ClientError> {
        request.validate()?;

        let availability_domain = if self.is_rover {
            ROVER_AVAILABILITY_DOMAIN.to_owned()
        } else {
            self.resolve_availability_domain(
                &request.compartment_id,
                &request.availability_domain,
            )
            .await?
        };
        let image_id = self
            .resolve_image_id(&request.compartment_id, &request.image_name)
            .await?;

        let details = self.build_launch_details(request, availability_domain, image_id);
        let instance = self.api().launch_instance(&details).await?;
        info!(instance_id = %instance.id, shape = %details.shape, "submitted launch request");

        self.wait_for_state(&instance.id, LifecycleState::Running, "launch")
            .await?;
        Ok(instance.id)
    }

    /// Reads the current instance record.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the read fails.
    pub async fn instance(&self, instance_id: &str) -> Result<Instance, ClientError> {
        Ok(self.api().get_instance(instance_id).await?)
    }

    /// Starts an instance and waits until it reports Running.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] when convergence misses the deadline
    /// and [`ClientError::Api`] for provider failures.
    pub async fn start_instance(&self, instance_id: &str) -> Result<(), ClientError> {
        self.power_action(instance_id, InstanceAction::Start).await
    }

    /// Stops an instance gracefully and waits until it reports Stopped.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Timeout`] when convergence misses the deadline
    /// and [`ClientError::Api`] for provider failures.
    pub async fn stop_instance(&self, instance_id: &str) -> Result<(), ClientError> {
        self.power_action(instance_id, InstanceAction::Stop).await
    }

    /// Stops then starts an instance, waiting for convergence after each
    /// action. A failed stop short-circuits: the start action is never
    /// issued and stop's error is returned.
    ///
    /// # Errors
    ///
    /// Propagates the first failing action's error.
    pub async fn restart_instance(&self, instance_id: &str) -> Result<(), ClientError> {
        self.stop_instance(instance_id).await?;
        self.start_instance(instance_id).await
    }

    /// Terminates an instance without waiting for the provider to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the terminate call fails.
    pub async fn terminate_instance(&self, instance_id: &str) -> Result<(), ClientError> {
        info!(instance_id, "terminating instance");
        Ok(self.api().terminate_instance(instance_id).await?)
    }

    /// Returns the instance's IP address: the public IP of its first VNIC
    /// with one, falling back to the private IP.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingVnic`] when no VNIC is attached,
    /// [`ClientError::MissingIp`] when the VNIC carries no parseable
    /// address, and [`ClientError::Api`] for provider failures.
    pub async fn instance_ip(
        &self,
        compartment_id: &str,
        instance_id: &str,
    ) -> Result<IpAddr, ClientError> {
        let attachments = self
            .api()
            .list_vnic_attachments(compartment_id, instance_id)
            .await?;
        let vnic_id = attachments
            .iter()
            .find_map(|attachment| attachment.vnic_id.clone())
            .ok_or_else(|| ClientError::MissingVnic {
                instance_id: instance_id.to_owned(),
            })?;

        let vnic = self.api().get_vnic(&vnic_id).await?;
        vnic.public_ip
            .or(vnic.private_ip)
            .and_then(|address| IpAddr::from_str(&address).ok())
            .ok_or_else(|| ClientError::MissingIp {
                instance_id: instance_id.to_owned(),
            })
    }

    /// Polls the instance until it reports `target`.
    ///
    /// Each iteration issues one status read. A read that errors aborts the
    /// wait immediately and propagates; the read is never retried. When the
    /// deadline passes without convergence a [`ClientError::Timeout`] is
    /// returned instead.
    pub(super) async fn wait_for_state(
        &self,
        instance_id: &str,
        target: LifecycleState,
        action: &str,
    ) -> Result<(), ClientError> {
        let deadline = Instant::now() + self.wait_timeout;
        loop {
            let instance = self.api().get_instance(instance_id).await?;
            if instance.lifecycle_state == target {
                debug!(instance_id, state = %target, "instance converged");
                return Ok(());
            }
            if Instant::now() > deadline {
                return Err(ClientError::Timeout {
                    action: action.to_owned(),
                    instance_id: instance_id.to_owned(),
                });
            }
            debug!(
                instance_id,
                state = %instance.lifecycle_state,
                target = %target,
                "waiting for convergence"
            );
            sleep(self.poll_interval).await;
        }
    }

    async fn power_action(
        &self,
        instance_id: &str,
        action: InstanceAction,
    ) -> Result<(), ClientError> {
        info!(instance_id, action = action.as_str(), "requesting power action");
        self.api().instance_action(instance_id, action).await?;
        self.wait_for_state(instance_id, action.target_state(), action.as_str())
            .await
    }

    fn build_launch_details(
        &self,
        request: &LaunchRequest,
        availability_domain: String,
        image_id: String,
    ) -> LaunchDetails {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            METADATA_SSH_KEYS.to_owned(),
            request.ssh_authorized_keys.clone(),
        );
        if let Some(user_data) = &request.user_data {
            metadata.insert(METADATA_USER_DATA.to_owned(), user_data.clone());
        }

        let (vnic_public_ip, fault_domain, boot_volume, agent_config) = if self.is_rover {
            (
                Some(true),
                Some(ROVER_FAULT_DOMAIN.to_owned()),
                Some(ROVER_BOOT_VOLUME_GB),
                Some(AgentConfig {
                    is_monitoring_disabled: true,
                }),
            )
        } else {
            (None, None, None, None)
        };

        LaunchDetails {
            availability_domain,
            compartment_id: request.compartment_id.clone(),
            shape: request.shape.clone(),
            display_name: request.display_name.clone(),
            create_vnic_details: CreateVnicDetails {
                subnet_id: request.subnet_id.clone(),
                assign_public_ip: vnic_public_ip,
            },
            metadata,
            source_details: InstanceSourceDetails {
                source_type: String::from("image"),
                image_id,
                boot_volume_size_in_g_bs: boot_volume,
            },
            fault_domain,
            agent_config,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::machine::LaunchRequest;
    use crate::test_support::ScriptedApi;

    use super::super::{ClientError, LifecycleState, OciClient};

    fn fast_client(api: ScriptedApi) -> OciClient<ScriptedApi> {
        OciClient::new(api)
            .with_poll_interval(Duration::from_millis(1))
            .with_wait_timeout(Duration::from_millis(50))
            .with_page_retry_backoff(Duration::from_millis(1))
    }

    fn request() -> LaunchRequest {
        LaunchRequest::builder()
            .display_name("node-1")
            .availability_domain("AD-1")
            .compartment_id("ocid1.compartment.oc1..aaaa")
            .shape("VM.Standard2.1")
            .subnet_id("ocid1.subnet.oc1..bbbb")
            .image_name("Oracle-Linux-7.7")
            .ssh_authorized_keys("ssh-ed25519 AAAA test")
            .build()
            .expect("request should build")
    }

    #[test]
    fn rover_launch_details_pin_fault_domain() {
        let client = fast_client(ScriptedApi::new()).with_rover(true);
        let details = client.build_launch_details(
            &request(),
            String::from("OREI-1-AD-1"),
            String::from("ocid1.image.oc1..cccc"),
        );
        assert_eq!(details.fault_domain.as_deref(), Some("FAULT-DOMAIN-1"));
        assert_eq!(details.create_vnic_details.assign_public_ip, Some(true));
        assert_eq!(details.source_details.boot_volume_size_in_g_bs, Some(50));
    }

    #[test]
    fn standard_launch_details_leave_rover_fields_unset() {
        let client = fast_client(ScriptedApi::new());
        let details = client.build_launch_details(
            &request(),
            String::from("Uocm:PHX-AD-1"),
            String::from("ocid1.image.oc1..cccc"),
        );
        assert!(details.fault_domain.is_none());
        assert!(details.create_vnic_details.assign_public_ip.is_none());
        assert!(details.agent_config.is_none());
        assert_eq!(
            details.metadata.get("ssh_authorized_keys").map(String::as_str),
            Some("ssh-ed25519 AAAA test")
        );
    }

    #[tokio::test]
    async fn wait_for_state_times_out_with_distinct_error() {
        let api = ScriptedApi::new();
        for _ in 0..64 {
            api.push_instance("inst-1", LifecycleState::Provisioning);
        }
        let client = fast_client(api);
        let result = client
            .wait_for_state("inst-1", LifecycleState::Running, "launch")
            .await;
        assert!(
            matches!(result, Err(ClientError::Timeout { .. })),
            "expected timeout, got {result:?}"
        );
    }

    #[tokio::test]
    async fn instance_ip_prefers_public_address() {
        let api = ScriptedApi::new();
        api.push_vnic_attachment("vnic-1");
        api.push_vnic(Some("203.0.113.7"), Some("10.0.0.5"));
        let client = fast_client(api);
        let ip = client
            .instance_ip("ocid1.compartment.oc1..aaaa", "inst-1")
            .await
            .expect("ip should resolve");
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[tokio::test]
    async fn instance_ip_falls_back_to_private_address() {
        let api = ScriptedApi::new();
        api.push_vnic_attachment("vnic-1");
        api.push_vnic(None, Some("10.0.0.5"));
        let client = fast_client(api);
        let ip = client
            .instance_ip("ocid1.compartment.oc1..aaaa", "inst-1")
            .await
            .expect("ip should resolve");
        assert_eq!(ip.to_string(), "10.0.0.5");
    }

    #[tokio::test]
    async fn instance_ip_errors_without_attachments() {
        let api = ScriptedApi::new();
        api.push_empty_vnic_attachments();
        let client = fast_client(api);
        let result = client
            .instance_ip("ocid1.compartment.oc1..aaaa", "inst-1")
            .await;
        assert!(matches!(result, Err(ClientError::MissingVnic { .. })));
    }
}

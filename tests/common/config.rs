//! Shared configuration fixtures for integration tests.

use ocimachine::OciConfig;

/// RSA key fixture used wherever a parseable signing key is required.
pub const TEST_API_KEY: &str = include_str!("../fixtures/api_key.pem");

/// A complete configuration with a parseable signing key.
#[must_use]
pub fn test_config() -> OciConfig {
    OciConfig {
        node_availability_domain: String::from("AD-1"),
        node_docker_port: None,
        fingerprint: String::from("aa:bb:cc:dd"),
        node_image: String::from("Oracle-Linux-7.7"),
        node_compartment_id: String::from("ocid1.compartment.oc1..node"),
        vcn_compartment_id: String::from("ocid1.compartment.oc1..vcn"),
        subnet_id: String::from("ocid1.subnet.oc1..subnet"),
        tenancy_id: String::from("ocid1.tenancy.oc1..tenancy"),
        user_id: String::from("ocid1.user.oc1..user"),
        region: String::from("us-phoenix-1"),
        node_shape: String::from("VM.Standard2.1"),
        vcn_id: String::from("ocid1.vcn.oc1..vcn"),
        ssh_port: None,
        ssh_user: None,
        private_key_contents: Some(TEST_API_KEY.to_owned()),
        private_key_path: None,
        private_key_passphrase: None,
        is_rover: None,
        rover_compute_endpoint: None,
        rover_network_endpoint: None,
        rover_cert_path: None,
        rover_cert_content: None,
    }
}

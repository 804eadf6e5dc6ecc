//! Machine driver for Oracle Cloud Infrastructure compute instances.
//!
//! The crate adapts a generic machine-lifecycle interface
//! (create → start/stop/restart → remove, plus IP/state/URL queries) to the
//! OCI compute, network, and identity services, including the convergence
//! polling used to wait for asynchronous provider operations.

pub mod client;
pub mod cloud_init;
pub mod config;
pub mod driver;
pub mod keys;
pub mod machine;
pub mod store;
pub mod test_support;

pub use client::{
    ApiError, ClientError, Image, ImagePage, Instance, InstanceAction, LifecycleState, OciClient,
    ProviderApi, RestApi,
};
pub use cloud_init::CloudInitError;
pub use config::{ConfigError, OciConfig};
pub use driver::{Driver, DriverError, machine_state};
pub use keys::{KeyError, SshKeyPair};
pub use machine::{
    LaunchRequest, LaunchRequestBuilder, Machine, MachineFuture, MachineState, RequestError,
};
pub use store::{MachineRecord, MachineStore, StoreError};

//! Command-line interface definitions for the `ocimachine` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `ocimachine` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ocimachine",
    about = "Provision and manage OCI compute instances as machine nodes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create the machine's instance.
    #[command(name = "create", about = "Create the machine's instance")]
    Create(CreateCommand),
    /// Start the machine's instance and wait until it is running.
    #[command(name = "start", about = "Start the instance and wait for Running")]
    Start(MachineArgs),
    /// Stop the machine's instance and wait until it is stopped.
    #[command(name = "stop", about = "Stop the instance and wait for Stopped")]
    Stop(MachineArgs),
    /// Restart the machine's instance (stop, then start).
    #[command(name = "restart", about = "Stop then start the instance")]
    Restart(MachineArgs),
    /// Terminate the machine's instance.
    #[command(name = "rm", about = "Terminate the instance")]
    Remove(MachineArgs),
    /// Print the instance's IP address.
    #[command(name = "ip", about = "Print the instance's IP address")]
    Ip(MachineArgs),
    /// Print the instance's lifecycle state.
    #[command(name = "state", about = "Print the instance's lifecycle state")]
    State(MachineArgs),
    /// Print the Docker connection URL for the instance.
    #[command(name = "url", about = "Print the Docker connection URL")]
    Url(MachineArgs),
    /// Verify credentials and image availability without creating anything.
    #[command(name = "precheck", about = "Verify credentials and image availability")]
    Precheck(MachineArgs),
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
pub(crate) struct MachineArgs {
    /// Name of the machine the command addresses.
    #[arg(long, value_name = "NAME", default_value = "default")]
    pub(crate) machine_name: String,
    /// Directory holding machine records and generated keys.
    #[arg(long, value_name = "PATH", default_value = ".ocimachine")]
    pub(crate) store_path: String,
}

/// Arguments for the `ocimachine create` subcommand.
#[derive(Args, Debug)]
pub(crate) struct CreateCommand {
    #[command(flatten)]
    pub(crate) machine: MachineArgs,
    /// Provide cloud-init user-data inline (cloud-config YAML or script),
    /// replacing the generated bootstrap script.
    #[arg(long, value_name = "USER_DATA", conflicts_with = "cloud_init_file")]
    pub(crate) cloud_init: Option<String>,
    /// Provide cloud-init user-data from a local file, replacing the
    /// generated bootstrap script.
    #[arg(long, value_name = "PATH", conflicts_with = "cloud_init")]
    pub(crate) cloud_init_file: Option<String>,
}

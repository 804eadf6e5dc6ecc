//! Binary entry point for the `ocimachine` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use ocimachine::{CloudInitError, Driver, DriverError, Machine, OciConfig, cloud_init};

mod cli;

use cli::{Cli, CreateCommand, MachineArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid cloud-init user-data: {0}")]
    CloudInit(#[from] CloudInitError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Create(command) => create_command(command).await,
        Cli::Start(args) => {
            open_driver(&args)?.start().await?;
            Ok(0)
        }
        Cli::Stop(args) => {
            open_driver(&args)?.stop().await?;
            Ok(0)
        }
        Cli::Restart(args) => {
            open_driver(&args)?.restart().await?;
            Ok(0)
        }
        Cli::Remove(args) => {
            open_driver(&args)?.remove().await?;
            Ok(0)
        }
        Cli::Ip(args) => {
            let address = open_driver(&args)?.ip().await?;
            print_line(&address.to_string());
            Ok(0)
        }
        Cli::State(args) => {
            let state = open_driver(&args)?.state().await?;
            print_line(&state.to_string());
            Ok(0)
        }
        Cli::Url(args) => {
            let url = open_driver(&args)?.url().await?;
            print_line(&url);
            Ok(0)
        }
        Cli::Precheck(args) => {
            open_driver(&args)?.pre_create_check().await?;
            print_line("ok");
            Ok(0)
        }
    }
}

async fn create_command(command: CreateCommand) -> Result<i32, CliError> {
    let user_data = cloud_init::resolve_user_data(
        command.cloud_init.as_deref(),
        command.cloud_init_file.as_deref(),
    )?;

    let mut driver = open_driver(&command.machine)?.with_user_data(user_data);
    driver.pre_create_check().await?;
    driver.create().await?;
    if let Some(instance_id) = driver.instance_id() {
        print_line(instance_id);
    }
    Ok(0)
}

fn open_driver(args: &MachineArgs) -> Result<Driver, CliError> {
    let config =
        OciConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    Ok(Driver::open(
        config,
        args.machine_name.as_str(),
        args.store_path.as_str(),
    )?)
}

fn print_line(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Config(String::from("missing OCI_REGION"));
        write_error(&mut buf, &err);
        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("configuration error: missing OCI_REGION"),
            "rendered: {rendered}"
        );
    }

    #[test]
    fn cloud_init_errors_convert() {
        let err = CliError::from(CloudInitError::BothProvided);
        assert!(err.to_string().contains("cloud-init"));
    }
}

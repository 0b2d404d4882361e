//! Command line of `rsp-startup`.
pub mod errors;

use crate::command::ExecvpExecutor;
use crate::discovery::{DEFAULT_DATASET, Discovery};
use crate::startup::config::home_from_env;
use crate::startup::{InitContainer, LabRunner, Provisioner, StartupPaths, launch_lab};
use ::fs::LocalFile;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use errors::CliError;
use tracing::{error, info};

/// Startup and service lookups for the Rubin Science Platform Lab
#[derive(Debug, Parser)]
#[command(name = "rsp-startup", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub operation: Operations,

    /// Verbose human-readable logs and Lab debug logging
    #[arg(long, global = true, env = "DEBUG", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub debug: bool,
}

#[derive(Debug, Subcommand)]
pub enum Operations {
    /// Load the startup files supplied by the controller and exec the configured command
    Launch,
    /// Prepare the environment and home directory, then exec the Lab
    LabRunner,
    /// Provision the home directory ahead of the Lab container
    InitContainer,
    /// Copy the tutorial landing page into the home directory
    ProvisionLandingPage,
    /// Print the URL of a service
    ServiceUrl {
        /// Service name, such as `tap` or `cutout`
        service: String,
        /// Dataset the service must support
        #[arg(long, default_value = DEFAULT_DATASET)]
        dataset: String,
    },
    /// Print the labels of the InfluxDB databases, one per line
    InfluxdbLabels,
}

impl Cli {
    /// Runs the requested operation. The exec-based operations only return on failure.
    pub fn run(self) -> Result<(), CliError> {
        match self.operation {
            Operations::Launch => launch(),
            Operations::LabRunner => {
                let err = LabRunner::from_process(ExecvpExecutor, self.debug).go();
                Err(CliError::Exec(err.to_string()))
            }
            Operations::InitContainer => {
                InitContainer::from_process().go();
                Ok(())
            }
            Operations::ProvisionLandingPage => {
                // A missing landing page must not keep the Lab from starting.
                match Provisioner::from_env().go() {
                    Ok(()) => info!("landing page provisioning complete"),
                    Err(err) => error!(%err, "landing page provisioning failed"),
                }
                Ok(())
            }
            Operations::ServiceUrl { service, dataset } => {
                let url = Discovery::default()
                    .service_url(&service, &dataset)
                    .map_err(|err| CliError::Lookup(err.to_string()))?;
                println!("{url}");
                Ok(())
            }
            Operations::InfluxdbLabels => {
                let labels = Discovery::default()
                    .influxdb_labels()
                    .map_err(|err| CliError::Lookup(err.to_string()))?;
                for label in labels {
                    println!("{label}");
                }
                Ok(())
            }
        }
    }
}

fn launch() -> Result<(), CliError> {
    let home = home_from_env().map_err(|err| CliError::Precondition(err.to_string()))?;
    let paths = StartupPaths::from_env().with_home(home.clone());
    let err = launch_lab(&LocalFile, &ExecvpExecutor, &paths, &home);
    Err(CliError::Exec(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_service_url_arguments() {
        let cli = Cli::try_parse_from(["rsp-startup", "service-url", "tap"]).unwrap();
        assert_matches!(
            cli.operation,
            Operations::ServiceUrl { service, dataset } if service == "tap" && dataset == DEFAULT_DATASET
        );

        let cli =
            Cli::try_parse_from(["rsp-startup", "--debug", "service-url", "sia", "--dataset", "dp02"])
                .unwrap();
        assert!(cli.debug);
        assert_matches!(
            cli.operation,
            Operations::ServiceUrl { dataset, .. } if dataset == "dp02"
        );
    }

    #[test]
    fn test_subcommand_names() {
        for name in [
            "launch",
            "lab-runner",
            "init-container",
            "provision-landing-page",
            "influxdb-labels",
        ] {
            assert!(Cli::try_parse_from(["rsp-startup", name]).is_ok(), "{name}");
        }
        assert!(Cli::try_parse_from(["rsp-startup", "unknown"]).is_err());
    }
}

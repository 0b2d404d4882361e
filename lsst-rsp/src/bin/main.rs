use clap::Parser;
use lsst_rsp::cli::Cli;
use lsst_rsp::cli::errors::CliError;
use lsst_rsp::logging::config::LoggingConfig;
use lsst_rsp::logging::try_init_logging;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging_config = LoggingConfig::new(cli.debug);
    if let Err(err) = try_init_logging(&logging_config) {
        let err = CliError::Tracing(err.to_string());
        eprintln!("Failed to initialize tracing: {err}");
        return err.to_exit_code();
    }

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Operation failed: {}", err);
            err.to_exit_code()
        }
    }
}

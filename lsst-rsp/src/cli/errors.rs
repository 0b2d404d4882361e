use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to initialize logging: {0}")]
    Tracing(String),

    #[error("cannot start: {0}")]
    Precondition(String),

    #[error("failed to replace process: {0}")]
    Exec(String),

    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl CliError {
    /// Converts the error to an exit code.
    ///
    /// We comply with the [Advanced Bash Scripting Guide] and
    /// [BSD guidelines] for the exit codes.
    ///
    /// [Advanced Bash Scripting Guide]: https://tldp.org/LDP/abs/html/exitcodes.html
    /// [BSD guidelines]: https://man.freebsd.org/cgi/man.cgi?query=sysexits&manpath=FreeBSD+4.3-RELEASE
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            CliError::Tracing(_) => ExitCode::from(70),
            CliError::Exec(_) => ExitCode::from(71),
            CliError::Precondition(_) => ExitCode::from(78),
            CliError::Lookup(_) => ExitCode::from(1),
        }
    }
}

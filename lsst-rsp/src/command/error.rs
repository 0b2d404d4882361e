use std::io;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("'{args}' failed with status {rc}")]
    Failed {
        args: String,
        rc: i32,
        stdout: String,
        stderr: String,
    },
    #[error("'{args}' timed out after {}s", timeout.as_secs_f64())]
    TimedOut {
        args: String,
        timeout: Duration,
        stdout: String,
        stderr: String,
    },
    #[error("could not run '{args}': {err}")]
    Spawn {
        args: String,
        #[source]
        err: io::Error,
    },
    #[error("could not exec '{args}': {err}")]
    Exec {
        args: String,
        #[source]
        err: io::Error,
    },
    #[error("no command to run")]
    Empty,
}

impl CommandError {
    /// Captured output of the failed or timed out process, if any.
    pub fn output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Failed { stdout, stderr, .. } | Self::TimedOut { stdout, stderr, .. } => {
                Some((stdout, stderr))
            }
            _ => None,
        }
    }
}

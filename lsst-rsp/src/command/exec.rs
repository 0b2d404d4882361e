use super::error::CommandError;
use super::shell_join;
use std::collections::BTreeMap;
use std::os::unix::process::CommandExt;
use std::path::Path;
use tracing::info;

/// Replaces the current process image.
pub trait Executor {
    /// Only returns if the replacement failed.
    fn exec(
        &self,
        argv: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&Path>,
    ) -> CommandError;
}

/// [Executor] backed by `execvp(3)`. The new process sees exactly `env`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecvpExecutor;

impl Executor for ExecvpExecutor {
    fn exec(
        &self,
        argv: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&Path>,
    ) -> CommandError {
        let Some((program, args)) = argv.split_first() else {
            return CommandError::Empty;
        };
        info!(command = shell_join(argv), "replacing process");
        let mut cmd = std::process::Command::new(program);
        cmd.args(args).env_clear().envs(env);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        CommandError::Exec {
            args: shell_join(argv),
            err: cmd.exec(),
        }
    }
}

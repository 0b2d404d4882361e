use super::error::CommandError;
use super::shell_join;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TERMINATE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessResult {
    pub rc: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands with fixed capture and failure policies.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    capture_output: bool,
    ignore_fail: bool,
}

impl Default for Command {
    fn default() -> Self {
        Self {
            capture_output: true,
            ignore_fail: false,
        }
    }
}

impl Command {
    pub fn new(capture_output: bool, ignore_fail: bool) -> Self {
        Self {
            capture_output,
            ignore_fail,
        }
    }

    /// Failures are logged and reported as `Ok(None)`.
    pub fn ignoring_failures() -> Self {
        Self {
            ignore_fail: true,
            ..Default::default()
        }
    }

    /// Runs `argv`, optionally in `cwd`, with `env` as the whole environment if given.
    ///
    /// With a `timeout`, the child is terminated once it is exceeded and whatever output it
    /// produced until then is reported in [CommandError::TimedOut].
    pub fn run<S: AsRef<str>>(
        &self,
        argv: &[S],
        cwd: Option<&Path>,
        env: Option<&BTreeMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Result<Option<ProcessResult>, CommandError> {
        match self.run_checked(argv, cwd, env, timeout) {
            Ok(result) => Ok(Some(result)),
            Err(err) if self.ignore_fail => {
                warn!(%err, "ignoring command failure");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn run_checked<S: AsRef<str>>(
        &self,
        argv: &[S],
        cwd: Option<&Path>,
        env: Option<&BTreeMap<String, String>>,
        timeout: Option<Duration>,
    ) -> Result<ProcessResult, CommandError> {
        let args = shell_join(argv);
        let Some((program, rest)) = argv.split_first() else {
            return Err(CommandError::Empty);
        };
        debug!(command = args, ?cwd, ?timeout, "running command");

        let mut cmd = std::process::Command::new(AsRef::<str>::as_ref(program));
        cmd.args(rest.iter().map(AsRef::<str>::as_ref))
            .stdin(Stdio::null());
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = env {
            cmd.env_clear().envs(env);
        }
        if self.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|err| CommandError::Spawn {
            args: args.clone(),
            err,
        })?;
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let waited = wait_with_timeout(&mut child, timeout);
        let stdout = collect(stdout);
        let stderr = collect(stderr);

        match waited {
            Ok(Some(status)) => {
                let rc = exit_code(status);
                if rc != 0 {
                    return Err(CommandError::Failed {
                        args,
                        rc,
                        stdout,
                        stderr,
                    })
                    .inspect_err(|err| error!(%err, "command failed"));
                }
                debug!(command = args, "command succeeded");
                Ok(ProcessResult { rc, stdout, stderr })
            }
            Ok(None) => Err(CommandError::TimedOut {
                args,
                timeout: timeout.unwrap_or_default(),
                stdout,
                stderr,
            })
            .inspect_err(|err| error!(%err, "command timed out")),
            Err(err) => Err(CommandError::Spawn { args, err }),
        }
    }
}

/// Waits for `child`, returning `None` if it had to be terminated after `timeout`.
fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        thread::sleep(POLL_INTERVAL);
    }
    terminate(child)?;
    Ok(None)
}

/// SIGTERM first, SIGKILL if the child is still around after a short grace period.
fn terminate(child: &mut Child) -> io::Result<()> {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(errno) = kill(pid, Signal::SIGTERM) {
        debug!(%errno, "could not send SIGTERM");
    }
    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        thread::sleep(POLL_INTERVAL);
    }
    child.kill()?;
    child.wait().map(|_| ())
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(-1)
}

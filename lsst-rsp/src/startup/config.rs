//! Startup files written by the Lab controller.
//!
//! The controller places the Lab's environment and command line in the startup directory.
//! Older controllers do not, in which case the Lab runner is started with the container's own
//! environment and is told to report the outdated controller.
use super::environment::LaunchEnvironment;
use super::error::{RspErrorCode, StartupError};
use super::paths::StartupPaths;
use crate::command::{CommandError, Executor};
use crate::defaults::{ARGS_FILENAME, ENV_FILENAME, NONINTERACTIVE_FILENAME};
use crate::utils::env_var::EnvVarError;
use ::fs::file::reader::FileReader;
use nix::errno::Errno;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Command started when the controller did not supply one.
pub const FALLBACK_COMMAND: [&str; 2] = ["rsp-startup", "lab-runner"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable HOME must be set to a directory")]
    MissingHome,
    #[error("startup file `{0}` not supplied")]
    NotSupplied(PathBuf),
    #[error("cannot read `{path}`: {err}")]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error("cannot parse `{path}`: {err}")]
    Parse {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },
    #[error("invalid environment: {0}")]
    InvalidEnv(#[from] EnvVarError),
    #[error("command to launch cannot be empty")]
    EmptyCommand,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Exec(#[from] CommandError),
}

impl From<ConfigError> for StartupError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingHome => StartupError::bad_env("HOME"),
            ConfigError::NotSupplied(path) => StartupError::rsp(
                RspErrorCode::EOLDCONTROLLER,
                Some(path.display().to_string()),
            ),
            ConfigError::Read { path, err } => StartupError::from_io(&err, Some(&path)),
            ConfigError::Parse { path, err } => StartupError::new(
                Errno::EINVAL as i32,
                Some(err.to_string()),
                Some(path.display().to_string()),
            ),
            ConfigError::InvalidEnv(err) => {
                StartupError::new(Errno::EINVAL as i32, Some(err.to_string()), None)
            }
            ConfigError::EmptyCommand => StartupError::new(
                Errno::EINVAL as i32,
                Some(ConfigError::EmptyCommand.to_string()),
                None,
            ),
            ConfigError::Unsupported(what) => {
                StartupError::new(Errno::ENOTSUP as i32, None, Some(what))
            }
            ConfigError::Exec(err) => StartupError::from(err),
        }
    }
}

/// Environment and command line the Lab container is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    pub env: LaunchEnvironment,
    pub command: Vec<String>,
}

impl StartupConfig {
    /// Reads the startup directory, falling back to the process environment and the Lab runner
    /// when the files are missing or unusable. The fallback carries the reason as an abnormal
    /// startup.
    pub fn load<R: FileReader>(reader: &R, startup_dir: &Path) -> Self {
        match Self::try_load(reader, startup_dir) {
            Ok(config) => config,
            Err(err) => {
                warn!(%err, "startup configuration not usable; falling back to the Lab runner");
                Self::fallback(&StartupError::from(err))
            }
        }
    }

    pub fn try_load<R: FileReader>(reader: &R, startup_dir: &Path) -> Result<Self, ConfigError> {
        let env_file = startup_dir.join(ENV_FILENAME);
        let map: BTreeMap<String, String> = read_json(reader, &env_file)?;
        let mut env = LaunchEnvironment::try_from_map(map)?;
        if !env.contains("PATH") {
            if let Some(path) = env::var("PATH").ok().filter(|p| !p.is_empty()) {
                env.set("PATH", path);
            }
        }

        let noninteractive = startup_dir.join(NONINTERACTIVE_FILENAME);
        let command_file = if noninteractive.is_file() {
            noninteractive
        } else {
            startup_dir.join(ARGS_FILENAME)
        };
        let command: Vec<String> = read_json(reader, &command_file)?;
        if command.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        debug!(command = ?command, "loaded startup configuration");
        Ok(Self { env, command })
    }

    pub fn fallback(reason: &StartupError) -> Self {
        let mut env = LaunchEnvironment::from_process();
        env.set_abnormal_startup(reason);
        Self {
            env,
            command: FALLBACK_COMMAND.map(String::from).to_vec(),
        }
    }
}

fn read_json<R: FileReader, T: DeserializeOwned>(reader: &R, path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotSupplied(path.to_path_buf()));
    }
    let content = reader.read(path).map_err(|err| ConfigError::Read {
        path: path.to_path_buf(),
        err,
    })?;
    serde_json::from_str(&content).map_err(|err| ConfigError::Parse {
        path: path.to_path_buf(),
        err,
    })
}

/// `HOME` from the process environment, if it names a directory.
pub fn home_from_env() -> Result<PathBuf, ConfigError> {
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .filter(|h| h.is_dir())
        .ok_or(ConfigError::MissingHome)
}

/// Loads the startup configuration and replaces this process with the configured command,
/// started in `home`. Only returns on failure.
pub fn launch_lab<R: FileReader, E: Executor>(
    reader: &R,
    executor: &E,
    paths: &StartupPaths,
    home: &Path,
) -> ConfigError {
    debug!(home = %home.display(), startup = %paths.startup.display(), "launching");
    let config = StartupConfig::load(reader, &paths.startup);
    info!(command = ?config.command, "starting Lab");
    ConfigError::Exec(executor.exec(&config.command, config.env.as_map(), Some(home)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::exec::tests::MockExecutor;
    use crate::startup::environment::{ABNORMAL_STARTUP, ABNORMAL_STARTUP_ERRORCODE};
    use ::fs::LocalFile;
    use assert_matches::assert_matches;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    fn write_startup(dir: &Path, env: &str, args: Option<&str>, noninteractive: Option<&str>) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(ENV_FILENAME), env).unwrap();
        if let Some(args) = args {
            fs::write(dir.join(ARGS_FILENAME), args).unwrap();
        }
        if let Some(noninteractive) = noninteractive {
            fs::write(dir.join(NONINTERACTIVE_FILENAME), noninteractive).unwrap();
        }
    }

    #[test]
    fn test_load_args() {
        let tmp = tempdir().unwrap();
        write_startup(
            tmp.path(),
            r#"{"JUPYTERHUB_BASE_URL": "/nb/", "PATH": "/usr/bin"}"#,
            Some(r#"["rsp-startup", "lab-runner"]"#),
            None,
        );

        let config = StartupConfig::try_load(&LocalFile, tmp.path()).unwrap();

        assert_eq!(config.command, ["rsp-startup", "lab-runner"]);
        assert_eq!(config.env.get("PATH"), Some("/usr/bin"));
        assert_eq!(config.env.get("JUPYTERHUB_BASE_URL"), Some("/nb/"));
    }

    #[test]
    #[serial]
    fn test_noninteractive_preferred_and_path_injected() {
        let tmp = tempdir().unwrap();
        write_startup(
            tmp.path(),
            r#"{"NONINTERACTIVE": "TRUE"}"#,
            Some(r#"["rsp-startup", "lab-runner"]"#),
            Some(r#"["/bin/run-job", "--flag"]"#),
        );
        unsafe { env::set_var("PATH", "/usr/local/bin:/usr/bin") };

        let config = StartupConfig::try_load(&LocalFile, tmp.path()).unwrap();

        assert_eq!(config.command, ["/bin/run-job", "--flag"]);
        assert_eq!(config.env.get("PATH"), Some("/usr/local/bin:/usr/bin"));
    }

    #[test]
    fn test_empty_command() {
        let tmp = tempdir().unwrap();
        write_startup(tmp.path(), "{}", Some("[]"), None);
        assert_matches!(
            StartupConfig::try_load(&LocalFile, tmp.path()),
            Err(ConfigError::EmptyCommand)
        );
    }

    #[test]
    fn test_invalid_env_key() {
        let tmp = tempdir().unwrap();
        write_startup(tmp.path(), r#"{"BAD KEY": "x"}"#, Some(r#"["x"]"#), None);
        assert_matches!(
            StartupConfig::try_load(&LocalFile, tmp.path()),
            Err(ConfigError::InvalidEnv(_))
        );
    }

    #[test]
    fn test_old_controller_falls_back_to_lab_runner() {
        let tmp = tempdir().unwrap();

        let config = StartupConfig::load(&LocalFile, &tmp.path().join("missing"));

        assert_eq!(config.command, FALLBACK_COMMAND);
        assert_eq!(config.env.get(ABNORMAL_STARTUP), Some("TRUE"));
        assert_eq!(
            config.env.get(ABNORMAL_STARTUP_ERRORCODE),
            Some("EOLDCONTROLLER")
        );
    }

    #[test]
    fn test_launch_execs_in_home() {
        let tmp = tempdir().unwrap();
        let paths = StartupPaths::rooted_at(tmp.path());
        write_startup(
            &paths.startup,
            r#"{"PATH": "/usr/bin", "HOME": "/home/alice"}"#,
            Some(r#"["rsp-startup", "lab-runner"]"#),
            None,
        );
        let home = tmp.path().join("home");
        let expected_home = home.clone();
        let mut executor = MockExecutor::new();
        executor
            .expect_exec()
            .withf(move |argv, env, cwd| {
                argv == ["rsp-startup", "lab-runner"]
                    && env.get("HOME").map(String::as_str) == Some("/home/alice")
                    && *cwd == Some(expected_home.as_path())
            })
            .once()
            .returning(|_, _, _| CommandError::Empty);

        let err = launch_lab(&LocalFile, &executor, &paths, &home);

        assert_matches!(err, ConfigError::Exec(CommandError::Empty));
    }

    #[test]
    fn test_conversion_to_startup_error() {
        let err = StartupError::from(ConfigError::Unsupported("nb execution".into()));
        assert!(err.is(Errno::ENOTSUP));
        assert_eq!(err.filename.as_deref(), Some("nb execution"));
        let err = StartupError::from(ConfigError::NotSupplied(PathBuf::from("/lab_startup/env.json")));
        assert_eq!(err.errno, 202);
        assert_eq!(err.filename.as_deref(), Some("/lab_startup/env.json"));
    }
}

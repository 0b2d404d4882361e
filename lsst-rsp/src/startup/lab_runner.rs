//! Prepares the user's home directory and environment, then replaces itself with the Lab.
//!
//! Problems along the way are recorded as an abnormal startup and the Lab is still started,
//! so the user gets an explanation instead of a spawn failure. Only a missing home directory
//! and a failed exec stop the sequence.
use super::abnormal::make_abnormal_startup_environment;
use super::configure_env::{check_required, configure_environment};
use super::credentials::CredentialMerger;
use super::dask::DaskConfig;
use super::environment::LaunchEnvironment;
use super::error::StartupError;
use super::git::setup_git;
use super::launch::{NonInteractiveCommand, lab_command};
use super::outcome::StepOutcome;
use super::paths::StartupPaths;
use super::profile::HomeProvisioner;
use super::reset::relocate_user_environment;
use super::settings::{increase_log_limit, manage_access_token};
use super::tidy::{SpaceTester, adopt_abnormal_startup_files, clean_astropy_cache};
use crate::command::{Command, Executor};
use crate::defaults::NONINTERACTIVE_COMMAND_PATH;
use crate::token::TokenLocator;
use crate::utils::str_bool;
use ::fs::LocalFile;
use ::fs::directory_manager::DirectoryManagerFs;
use ::fs::utils::shared_directory_permissions;
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const EUPS_TIMEOUT: Duration = Duration::from_secs(60);

pub struct LabRunner<E: Executor> {
    env: LaunchEnvironment,
    paths: StartupPaths,
    executor: E,
    debug: bool,
}

impl<E: Executor> LabRunner<E> {
    pub fn new(env: LaunchEnvironment, paths: StartupPaths, executor: E, debug: bool) -> Self {
        Self {
            env,
            paths,
            executor,
            debug,
        }
    }

    /// Runner for the current process: its environment, and path roots from that environment.
    pub fn from_process(executor: E, debug: bool) -> Self {
        Self::new(
            LaunchEnvironment::from_process(),
            StartupPaths::from_env(),
            executor,
            debug,
        )
    }

    pub fn env(&self) -> &LaunchEnvironment {
        &self.env
    }

    /// Folds a step result into the abnormal startup state. Returns the error if it is fatal.
    fn record(&mut self, outcome: StepOutcome) -> Result<(), StartupError> {
        match outcome {
            StepOutcome::Ok => Ok(()),
            StepOutcome::Degraded(err) => {
                self.env.set_abnormal_startup(&err);
                Ok(())
            }
            StepOutcome::Fatal(err) => Err(err),
        }
    }

    /// Everything that happens before the launch decision.
    pub fn prepare(&mut self) -> Result<(), StartupError> {
        let home = self.paths.home.clone();
        if !home.is_dir() {
            return self.record(StepOutcome::Fatal(StartupError::bad_env("HOME").with_filename(
                home.display().to_string(),
            )));
        }

        adopt_abnormal_startup_files(&mut self.env, &home, &LocalFile);

        if self.env.get_non_empty("RESET_USER_ENV").is_some() {
            debug!("user environment relocation requested");
            let relocated =
                relocate_user_environment(&home, Utc::now(), &LocalFile, &DirectoryManagerFs::default());
            self.record(relocated.map(|_| ()).into())?;
        }

        self.record(check_required(&self.env).into())?;
        let configured = configure_environment(&mut self.env, &self.paths);
        self.record(configured.into())?;

        clean_astropy_cache(&home, Utc::now().timestamp());
        let tested = SpaceTester::new(LocalFile, DirectoryManagerFs::default())
            .test_for_space(&mut self.env, &home);
        self.record(tested)?;

        if self.env.is_broken() {
            warn!("skipping home directory provisioning after abnormal startup");
        } else {
            let provisioned = self.provision_home();
            self.record(provisioned.into())?;
            if !self.env.is_broken() {
                setup_git(&self.env, &home);
            }
        }

        self.clear_eups_cache();
        Ok(())
    }

    fn provision_home(&self) -> Result<(), StartupError> {
        debug!("copying files to user home directory");
        let home = &self.paths.home;
        let private_dirs = DirectoryManagerFs::default();
        let shared_dirs = DirectoryManagerFs::with_permissions(shared_directory_permissions());

        CredentialMerger::new(&LocalFile, &private_dirs).merge_all(&self.env)?;
        DaskConfig::new(&LocalFile, home, Utc::now().date_naive()).setup()?;
        let provisioner = HomeProvisioner::new(&LocalFile, &shared_dirs, home);
        provisioner.copy_logging_profile(&self.paths.jupyterlab_config)?;
        provisioner.copy_dircolors(&self.paths.etc)?;
        provisioner.copy_etc_skel(&self.paths.etc)
    }

    fn clear_eups_cache(&self) {
        let _ = Command::ignoring_failures().run(
            &["eups", "admin", "clearCache"],
            Some(&self.paths.home),
            Some(self.env.as_map()),
            Some(EUPS_TIMEOUT),
        );
    }

    fn modify_interactive_settings(&self) -> Result<(), StartupError> {
        let locator = TokenLocator::new(self.paths.runtime_mounts.clone());
        manage_access_token(&self.paths.home, &locator, &LocalFile)?;
        increase_log_limit(&LocalFile, &self.paths.home)
    }

    fn noninteractive_command(&self) -> Result<Vec<String>, StartupError> {
        let path = self.paths.runtime_mounts.join(NONINTERACTIVE_COMMAND_PATH);
        let command = NonInteractiveCommand::load(&LocalFile, &path)?;
        Ok(command.argv()?.to_vec())
    }

    /// Decides what to run. Returns the command line and its working directory.
    pub fn launch_command(&mut self) -> (Vec<String>, PathBuf) {
        self.env.set("RUNNING_INSIDE_JUPYTERLAB", "TRUE");

        if str_bool(self.env.get_or("NONINTERACTIVE", "")) {
            match self.noninteractive_command() {
                Ok(argv) => return (argv, self.paths.home.clone()),
                Err(err) => {
                    warn!(%err, "cannot run non-interactive command; starting an interactive Lab");
                    self.env.set_abnormal_startup(&err);
                }
            }
        }

        let modified = self.modify_interactive_settings();
        // Recording a degraded outcome never fails.
        let _ = self.record(modified.into());

        let mut notebook_dir = self.paths.home.clone();
        if self.env.is_broken() {
            warn!(
                message = self.env.get_or(super::environment::ABNORMAL_STARTUP_MESSAGE, ""),
                "abnormal startup"
            );
            let temp_home = make_abnormal_startup_environment(&self.env);
            warn!(home = %temp_home.display(), "launching with temporary home");
            self.env.set("HOME", temp_home.display().to_string());
            notebook_dir = temp_home;
        }
        (lab_command(&self.env, &notebook_dir, self.debug), notebook_dir)
    }

    /// Runs the whole sequence and replaces this process. Only returns on a fatal error.
    pub fn go(mut self) -> StartupError {
        if let Err(err) = self.prepare() {
            return err;
        }
        let (argv, cwd) = self.launch_command();
        info!(command = ?argv, "starting Lab");
        StartupError::from(self.executor.exec(&argv, self.env.as_map(), Some(&cwd)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use crate::command::exec::tests::MockExecutor;
    use crate::startup::environment::{ABNORMAL_STARTUP, ABNORMAL_STARTUP_ERRORCODE};
    use nix::errno::Errno;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::{TempDir, tempdir};

    type Captured = Arc<Mutex<Option<(Vec<String>, LaunchEnvironment, Option<PathBuf>)>>>;

    fn capturing_executor() -> (MockExecutor, Captured) {
        let captured: Captured = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let mut executor = MockExecutor::new();
        executor.expect_exec().once().returning(move |argv, env, cwd| {
            *sink.lock().unwrap() = Some((
                argv.to_vec(),
                LaunchEnvironment::from(env.clone()),
                cwd.map(|p| p.to_path_buf()),
            ));
            CommandError::Empty
        });
        (executor, captured)
    }

    fn setup() -> (TempDir, StartupPaths, LaunchEnvironment) {
        let tmp = tempdir().unwrap();
        let paths = StartupPaths::rooted_at(tmp.path());
        fs::create_dir_all(&paths.home).unwrap();
        let env = LaunchEnvironment::from_iter([
            ("HOME", paths.home.display().to_string()),
            ("USER", "alice".to_string()),
            ("JUPYTERHUB_BASE_URL", "/nb/user/alice/".to_string()),
            ("PATH", "/nonexistent".to_string()),
            ("SCRATCH_DIR", tmp.path().join("temphome").display().to_string()),
        ]);
        (tmp, paths, env)
    }

    #[test]
    fn test_interactive_lab() {
        let (_tmp, paths, env) = setup();
        let (executor, captured) = capturing_executor();

        let err = LabRunner::new(env, paths.clone(), executor, false).go();

        assert!(matches!(err.errorcode.as_str(), "EUNKNOWN"));
        let (argv, env, cwd) = captured.lock().unwrap().take().unwrap();
        assert_eq!(argv[0], "jupyterhub-singleuser");
        assert!(argv.contains(&format!("--notebook-dir={}", paths.home.display())));
        assert!(argv.contains(&"--log-level=INFO".to_string()));
        assert_eq!(cwd, Some(paths.home.clone()));
        assert_eq!(env.get("RUNNING_INSIDE_JUPYTERLAB"), Some("TRUE"));
        assert_eq!(env.get("JUPYTERHUB_PATH"), Some("/nb/user/alice/hub"));
        assert!(!env.is_broken());
        assert!(paths.home.join(".config/dask/dashboard.yaml").is_file());
        assert!(
            paths
                .home
                .join(".jupyter/lab/user-settings/@jupyterlab/notebook-extension/tracker.jupyterlab.settings")
                .is_file()
        );
    }

    #[test]
    fn test_missing_variable_starts_degraded_lab() {
        let (tmp, paths, mut env) = setup();
        env.remove("JUPYTERHUB_BASE_URL");
        let (executor, captured) = capturing_executor();

        LabRunner::new(env, paths.clone(), executor, true).go();

        let (argv, env, cwd) = captured.lock().unwrap().take().unwrap();
        let temp_home = tmp.path().join("temphome");
        assert_eq!(env.get(ABNORMAL_STARTUP), Some("TRUE"));
        assert_eq!(env.get(ABNORMAL_STARTUP_ERRORCODE), Some("EBADENV"));
        assert_eq!(env.get("HOME"), Some(temp_home.to_str().unwrap()));
        assert_eq!(cwd, Some(temp_home.clone()));
        assert!(argv.contains(&format!("--notebook-dir={}", temp_home.display())));
        assert!(argv.contains(&"--log-level=DEBUG".to_string()));
        assert!(temp_home.join("notebooks/tutorials/welcome.md").is_file());
        // Provisioning is skipped once broken
        assert!(!paths.home.join(".config/dask").exists());
    }

    #[test]
    fn test_init_container_error_is_adopted() {
        let (_tmp, paths, env) = setup();
        let err = StartupError::new(Errno::EDQUOT as i32, None, None);
        fs::write(paths.home.join("ABNORMAL_STARTUP_1700000000"), err.to_json()).unwrap();
        let (executor, captured) = capturing_executor();

        LabRunner::new(env, paths.clone(), executor, false).go();

        let (_, env, _) = captured.lock().unwrap().take().unwrap();
        assert_eq!(env.get(ABNORMAL_STARTUP_ERRORCODE), Some("EDQUOT"));
        assert!(!paths.home.join("ABNORMAL_STARTUP_1700000000").exists());
    }

    #[test]
    fn test_noninteractive_command() {
        let (_tmp, paths, mut env) = setup();
        env.set("NONINTERACTIVE", "TRUE");
        let command_file = paths.runtime_mounts.join(NONINTERACTIVE_COMMAND_PATH);
        fs::create_dir_all(command_file.parent().unwrap()).unwrap();
        fs::write(
            &command_file,
            r#"{"type": "command", "kernel": "lsst", "command": ["/opt/job/run", "--all"]}"#,
        )
        .unwrap();
        let (executor, captured) = capturing_executor();

        LabRunner::new(env, paths, executor, false).go();

        let (argv, env, _) = captured.lock().unwrap().take().unwrap();
        assert_eq!(argv, ["/opt/job/run", "--all"]);
        assert_eq!(env.get("RUNNING_INSIDE_JUPYTERLAB"), Some("TRUE"));
    }

    #[test]
    fn test_missing_home_is_fatal() {
        let (tmp, paths, env) = setup();
        let paths = paths.with_home(tmp.path().join("nowhere"));
        // Any exec call would fail the test
        let executor = MockExecutor::new();

        let err = LabRunner::new(env, paths, executor, false).go();

        assert_eq!(err.errorcode, "EBADENV");
    }

    #[test]
    fn test_reset_is_applied_before_configuration() {
        let (_tmp, paths, mut env) = setup();
        env.set("RESET_USER_ENV", "TRUE");
        fs::create_dir_all(paths.home.join(".local/lib")).unwrap();
        let (executor, _captured) = capturing_executor();

        LabRunner::new(env, paths.clone(), executor, false).go();

        assert!(!paths.home.join(".local").exists());
        let backups = fs::read_dir(&paths.home)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".user_env."))
            .count();
        assert_eq!(backups, 1);
    }
}

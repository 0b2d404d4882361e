//! Home directory preparation done in a separate container before the Lab starts.
//!
//! Nothing but files can be handed over to the Lab container, so a failure is written to
//! `~/ABNORMAL_STARTUP_<timestamp>` where the Lab runner picks it up.
use super::configure_env::set_credential_variables;
use super::credentials::CredentialMerger;
use super::dask::DaskConfig;
use super::environment::LaunchEnvironment;
use super::error::{PathContext, StartupError};
use super::git::setup_git;
use super::outcome::StepOutcome;
use super::paths::StartupPaths;
use super::profile::HomeProvisioner;
use super::reset::relocate_user_environment;
use super::settings::{increase_log_limit, manage_access_token};
use super::tidy::{SpaceTester, clean_astropy_cache, clear_previous_error_files};
use crate::defaults::ABNORMAL_STARTUP_FILE_PREFIX;
use crate::token::TokenLocator;
use ::fs::LocalFile;
use ::fs::directory_manager::DirectoryManagerFs;
use ::fs::file::writer::FileWriter;
use ::fs::utils::{private_file_permissions, shared_directory_permissions};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info};

pub struct InitContainer {
    env: LaunchEnvironment,
    paths: StartupPaths,
}

impl InitContainer {
    pub fn new(env: LaunchEnvironment, paths: StartupPaths) -> Self {
        Self { env, paths }
    }

    pub fn from_process() -> Self {
        Self::new(LaunchEnvironment::from_process(), StartupPaths::from_env())
    }

    /// Runs every step, stopping at the first failure.
    pub fn run(&mut self) -> Result<(), StartupError> {
        let home = self.paths.home.clone();

        clear_previous_error_files(&home, &LocalFile);
        clean_astropy_cache(&home, Utc::now().timestamp());
        if let StepOutcome::Degraded(err) | StepOutcome::Fatal(err) =
            SpaceTester::new(LocalFile, DirectoryManagerFs::default())
                .test_for_space(&mut self.env, &home)
        {
            return Err(err);
        }

        if self.env.get_non_empty("RESET_USER_ENV").is_some() {
            relocate_user_environment(
                &home,
                Utc::now(),
                &LocalFile,
                &DirectoryManagerFs::default(),
            )?;
        }

        set_credential_variables(&mut self.env, &home);
        let private_dirs = DirectoryManagerFs::default();
        CredentialMerger::new(&LocalFile, &private_dirs).merge_all(&self.env)?;

        DaskConfig::new(&LocalFile, &home, Utc::now().date_naive()).setup()?;

        let shared_dirs = DirectoryManagerFs::with_permissions(shared_directory_permissions());
        let provisioner = HomeProvisioner::new(&LocalFile, &shared_dirs, &home);
        provisioner.copy_logging_profile(&self.paths.jupyterlab_config)?;
        provisioner.copy_dircolors(&self.paths.etc)?;
        provisioner.copy_etc_skel(&self.paths.etc)?;

        setup_git(&self.env, &home);

        let locator = TokenLocator::new(self.paths.runtime_mounts.clone());
        manage_access_token(&home, &locator, &LocalFile)?;
        increase_log_limit(&LocalFile, &home)
    }

    /// Writes the error for the Lab runner. A failed write is only logged; the most likely
    /// cause is the same lack of space that caused the error.
    pub fn write_error_file<W: FileWriter>(
        &self,
        writer: &W,
        err: &StartupError,
        timestamp: i64,
    ) -> Option<PathBuf> {
        let path = self
            .paths
            .home
            .join(format!("{ABNORMAL_STARTUP_FILE_PREFIX}{timestamp}"));
        writer
            .write(&path, err.to_json().as_bytes(), private_file_permissions())
            .with_path(&path)
            .inspect_err(|write_err| {
                error!(error = %err, %write_err, "failed to write abnormal startup file")
            })
            .ok()
            .map(|_| path)
    }

    /// Never fails: errors end up in the home directory for the Lab runner to report.
    pub fn go(mut self) {
        match self.run() {
            Ok(()) => info!("init container finished"),
            Err(err) => {
                self.env.set_abnormal_startup(&err);
                self.write_error_file(&LocalFile, &err, Utc::now().timestamp());
            }
        }
    }
}

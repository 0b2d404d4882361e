//! Provisions the tutorial landing page into the user's home directory.
//!
//! The copies must be regular writable files: a symlink to a read-only source breaks saving
//! from the Lab, so existing files and symlinks are replaced.
use super::error::StartupError;
use super::settings::set_markdown_viewer;
use ::fs::LocalFile;
use ::fs::directory_manager::{DirectoryManagementError, DirectoryManager, DirectoryManagerFs};
use ::fs::file_deleter::FileDeleter;
use ::fs::utils::shared_directory_permissions;
use std::env;
use std::fs as stdfs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_HOME: &str = "/nonexistent";
const DEFAULT_SOURCE_DIR: &str = "/rubin/cst_repos/tutorial-notebooks-data/welcome";
const DEFAULT_TARGET_DIR: &str = "notebooks/tutorials";
const DEFAULT_FILES: &str = "welcome.md,logo_for_header.png";

#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("precheck failed: {0}")]
    Precheck(String),
    #[error("destination `{0}` is a directory")]
    DestinationIsDirectory(PathBuf),
    #[error("destination `{0}` exists and cannot be replaced")]
    Destination(PathBuf),
    #[error("cannot provision `{path}`: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
    #[error(transparent)]
    Directory(#[from] DirectoryManagementError),
    #[error(transparent)]
    Settings(#[from] StartupError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerInput {
    pub source_files: Vec<PathBuf>,
    pub home_dir: PathBuf,
    pub dest_dir: PathBuf,
}

impl ProvisionerInput {
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| env::var(name).unwrap_or_else(|_| default.to_string());
        let home_dir = PathBuf::from(var("NUBLADO_HOME", DEFAULT_HOME));
        let source_dir = PathBuf::from(var("CST_LANDING_PAGE_SRC_DIR", DEFAULT_SOURCE_DIR));
        let dest_dir = home_dir.join(var("CST_LANDING_PAGE_TGT_DIR", DEFAULT_TARGET_DIR));
        let source_files = var("CST_LANDING_PAGE_FILES", DEFAULT_FILES)
            .split(',')
            .map(|name| source_dir.join(name.trim()))
            .collect();
        Self {
            source_files,
            home_dir,
            dest_dir,
        }
    }
}

pub struct Provisioner {
    input: ProvisionerInput,
}

impl Provisioner {
    pub fn new(input: ProvisionerInput) -> Self {
        Self { input }
    }

    pub fn from_env() -> Self {
        Self::new(ProvisionerInput::from_env())
    }

    fn precheck(&self) -> Result<(), ProvisionerError> {
        if let Some(source) = self.input.source_files.iter().find(|s| !s.is_file()) {
            return Err(ProvisionerError::Precheck(format!(
                "source file {} is not a file",
                source.display()
            )));
        }
        if !self.input.home_dir.is_dir() {
            return Err(ProvisionerError::Precheck(format!(
                "home directory {} is not a directory",
                self.input.home_dir.display()
            )));
        }
        Ok(())
    }

    fn copy_files(&self) -> Result<(), ProvisionerError> {
        for source in &self.input.source_files {
            let Some(name) = source.file_name() else {
                continue;
            };
            let dest = self.input.dest_dir.join(name);
            if let Ok(metadata) = dest.symlink_metadata() {
                let file_type = metadata.file_type();
                if file_type.is_symlink() || file_type.is_file() {
                    debug!(path = %dest.display(), "replacing");
                    LocalFile.delete(&dest).map_err(|err| ProvisionerError::Io {
                        path: dest.clone(),
                        err,
                    })?;
                } else if file_type.is_dir() {
                    return Err(ProvisionerError::DestinationIsDirectory(dest));
                } else {
                    return Err(ProvisionerError::Destination(dest));
                }
            }
            stdfs::copy(source, &dest).map_err(|err| ProvisionerError::Io {
                path: dest.clone(),
                err,
            })?;
        }
        Ok(())
    }

    pub fn go(&self) -> Result<(), ProvisionerError> {
        self.precheck()?;
        DirectoryManagerFs::with_permissions(shared_directory_permissions())
            .create(&self.input.dest_dir)?;
        self.copy_files()?;
        set_markdown_viewer(&LocalFile, &self.input.home_dir, b"  ")?;
        info!(dest = %self.input.dest_dir.display(), "landing page provisioned");
        Ok(())
    }
}

/// Provisions from explicit paths instead of the environment.
pub fn provision(source_files: &[&Path], home: &Path, dest: &Path) -> Result<(), ProvisionerError> {
    Provisioner::new(ProvisionerInput {
        source_files: source_files.iter().map(|p| p.to_path_buf()).collect(),
        home_dir: home.to_path_buf(),
        dest_dir: dest.to_path_buf(),
    })
    .go()
}

//! Files copied from the image into the user's home directory.
use super::error::{PathContext, StartupError};
use crate::defaults::{DIRCOLORS_NAME, LOGGING_PROFILE_NAME, PREVIOUS_LOGGING_CHECKSUMS};
use ::fs::directory_manager::DirectoryManager;
use ::fs::file::reader::FileReader;
use ::fs::file::writer::FileWriter;
use ::fs::utils::shared_file_permissions;
use sha2::{Digest, Sha256};
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

pub struct HomeProvisioner<'a, F, D>
where
    F: FileReader + FileWriter,
    D: DirectoryManager,
{
    files: &'a F,
    directory_manager: &'a D,
    home: &'a Path,
}

impl<'a, F, D> HomeProvisioner<'a, F, D>
where
    F: FileReader + FileWriter,
    D: DirectoryManager,
{
    pub fn new(files: &'a F, directory_manager: &'a D, home: &'a Path) -> Self {
        Self {
            files,
            directory_manager,
            home,
        }
    }

    /// Installs the IPython logging profile unless the user changed theirs.
    ///
    /// A missing profile, or one matching a previously shipped version, is replaced with the
    /// one from the image.
    #[instrument(skip_all)]
    pub fn copy_logging_profile(&self, jupyterlab_config: &Path) -> Result<(), StartupError> {
        let user_profile = self
            .home
            .join(".ipython/profile_default/startup")
            .join(LOGGING_PROFILE_NAME);
        if user_profile.is_file() {
            let current = self.files.read_bytes(&user_profile).with_path(&user_profile)?;
            let checksum = hex::encode(Sha256::digest(&current));
            if !PREVIOUS_LOGGING_CHECKSUMS.contains(&checksum.as_str()) {
                debug!(%checksum, "user logging profile was modified; leaving it alone");
                return Ok(());
            }
            debug!(%checksum, "user logging profile is out of date");
        }
        let Some(source) = [
            jupyterlab_config.join("etc").join(LOGGING_PROFILE_NAME),
            jupyterlab_config.join(LOGGING_PROFILE_NAME),
        ]
        .into_iter()
        .find(|p| p.is_file()) else {
            warn!("could not find source user logging profile");
            return Ok(());
        };
        self.copy_file(&source, &user_profile)
    }

    pub fn copy_dircolors(&self, etc: &Path) -> Result<(), StartupError> {
        let target = self.home.join(".dir_colors");
        if target.exists() {
            debug!("copying dircolors not needed");
            return Ok(());
        }
        let source = etc.join(DIRCOLORS_NAME);
        if !source.is_file() {
            warn!(path = %source.display(), "could not find dircolors");
            return Ok(());
        }
        self.copy_file(&source, &target)
    }

    /// Copies `<etc>/skel` into the home directory without overwriting anything.
    #[instrument(skip_all)]
    pub fn copy_etc_skel(&self, etc: &Path) -> Result<(), StartupError> {
        let skel = etc.join("skel");
        if !skel.is_dir() {
            debug!(path = %skel.display(), "no skeleton directory");
            return Ok(());
        }
        self.copy_tree(&skel, self.home)
    }

    fn copy_tree(&self, source: &Path, target: &Path) -> Result<(), StartupError> {
        let entries: Vec<PathBuf> = self.files.dir_entries(source).with_path(source)?;
        for entry in entries {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let destination = target.join(name);
            if entry.is_dir() {
                if !destination.is_dir() {
                    debug!(path = %destination.display(), "creating");
                    self.directory_manager.create(&destination)?;
                }
                self.copy_tree(&entry, &destination)?;
            } else if !destination.exists() && destination.symlink_metadata().is_err() {
                debug!(path = %destination.display(), "creating");
                self.copy_file(&entry, &destination)?;
            }
        }
        Ok(())
    }

    fn copy_file(&self, source: &Path, target: &Path) -> Result<(), StartupError> {
        let content = self.files.read_bytes(source).with_path(source)?;
        if let Some(parent) = target.parent() {
            self.directory_manager.create(parent)?;
        }
        let permissions = stdfs::metadata(source)
            .map(|m| m.permissions())
            .unwrap_or_else(|_| shared_file_permissions());
        self.files
            .write(target, &content, permissions)
            .with_path(target)
    }
}

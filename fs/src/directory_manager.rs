use super::utils::{FsError, private_directory_permissions, validate_path};
use std::fs::{DirBuilder, Permissions, remove_dir_all};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DirectoryManagementError {
    #[error("cannot create directory '{0}': {1}")]
    ErrorCreatingDirectory(String, #[source] io::Error),

    #[error("cannot delete directory '{0}': {1}")]
    ErrorDeletingDirectory(String, #[source] io::Error),

    #[error("invalid directory: {0}")]
    InvalidDirectory(#[from] FsError),
}

impl DirectoryManagementError {
    /// OS error number behind the failure, if the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            DirectoryManagementError::ErrorCreatingDirectory(_, err)
            | DirectoryManagementError::ErrorDeletingDirectory(_, err) => err.raw_os_error(),
            DirectoryManagementError::InvalidDirectory(_) => None,
        }
    }
}

pub trait DirectoryManager {
    /// Creates the directory and any missing parents. Existing directories are left as they are.
    fn create(&self, path: &Path) -> Result<(), DirectoryManagementError>;

    /// Delete the folder and its contents. If the folder does not exist it
    /// will not return an error.
    fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError>;
}

/// [DirectoryManager] backed by the local filesystem.
///
/// Newly created directories get `0o700` unless built with [DirectoryManagerFs::with_permissions].
pub struct DirectoryManagerFs {
    permissions: Permissions,
}

impl Default for DirectoryManagerFs {
    fn default() -> Self {
        Self {
            permissions: private_directory_permissions(),
        }
    }
}

impl DirectoryManagerFs {
    pub fn with_permissions(permissions: Permissions) -> Self {
        Self { permissions }
    }
}

impl DirectoryManager for DirectoryManagerFs {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn create(&self, path: &Path) -> Result<(), DirectoryManagementError> {
        validate_path(path)?;
        DirBuilder::new()
            .recursive(true)
            .mode(self.permissions.mode())
            .create(path)
            .map_err(|e| {
                DirectoryManagementError::ErrorCreatingDirectory(path.display().to_string(), e)
            })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError> {
        validate_path(path)?;

        if !path.exists() {
            return Ok(());
        }
        remove_dir_all(path).map_err(|e| {
            DirectoryManagementError::ErrorDeletingDirectory(path.display().to_string(), e)
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use mockall::{mock, predicate};
    use std::path::PathBuf;

    mock! {
        pub DirectoryManager {}

        impl DirectoryManager for DirectoryManager {
            fn create(&self, path: &Path) -> Result<(), DirectoryManagementError>;
            fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError>;
        }
    }

    impl MockDirectoryManager {
        pub fn should_create(&mut self, path: &Path) {
            self.expect_create()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(|_| Ok(()));
        }

        pub fn should_create_any(&mut self, times: usize) {
            self.expect_create().times(times).returning(|_| Ok(()));
        }

        pub fn should_not_create(&mut self, path: &Path, errno: i32) {
            self.expect_create()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(move |p| {
                    Err(DirectoryManagementError::ErrorCreatingDirectory(
                        p.display().to_string(),
                        io::Error::from_raw_os_error(errno),
                    ))
                });
        }

        pub fn should_delete(&mut self, path: &Path) {
            self.expect_delete()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(|_| Ok(()));
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::utils::shared_directory_permissions;
    use std::fs::metadata;
    use std::path::PathBuf;

    #[test]
    fn test_path_to_create_cannot_contain_dots() {
        let path = PathBuf::from("some/path/../with/../dots");
        let directory_manager = DirectoryManagerFs::default();

        let result = directory_manager.create(&path);

        assert!(result.is_err());
        assert_eq!(
            "invalid directory: dots disallowed in path `some/path/../with/../dots`".to_string(),
            result.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_path_to_delete_cannot_contain_dots() {
        let path = PathBuf::from("some/path/../with/../dots");
        let directory_manager = DirectoryManagerFs::default();

        let result = directory_manager.delete(&path);

        assert!(result.is_err());
    }

    #[test]
    fn test_folder_creation() {
        // tempdir gets automatically removed on drop
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("scratch").join("tmp");

        let directory_manager = DirectoryManagerFs::default();
        let create_result = directory_manager.create(path.as_path());
        assert!(create_result.is_ok());

        assert_eq!(metadata(&path).unwrap().permissions().mode() & 0o777, 0o700);
        assert!(path.exists());
    }

    #[test]
    fn test_folder_creation_with_custom_permissions() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("tutorials");

        DirectoryManagerFs::with_permissions(shared_directory_permissions())
            .create(&path)
            .unwrap();

        assert_eq!(metadata(&path).unwrap().permissions().mode() & 0o777, 0o755);
    }

    #[test]
    fn test_folder_creation_should_not_fail_if_exists() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("some_dir");

        let directory_manager = DirectoryManagerFs::default();
        assert!(directory_manager.create(path.as_path()).is_ok());
        assert!(directory_manager.create(path.as_path()).is_ok());
    }

    #[test]
    fn test_folder_creation_over_a_file_keeps_os_error() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("a_file");
        std::fs::write(&path, "").unwrap();

        let err = DirectoryManagerFs::default()
            .create(&path.join("child"))
            .unwrap_err();

        // ENOTDIR
        assert_eq!(err.raw_os_error(), Some(20));
    }

    #[test]
    fn test_folder_deletion() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join(".cache");

        let directory_manager = DirectoryManagerFs::default();
        assert!(directory_manager.create(path.as_path()).is_ok());
        std::fs::write(path.join("1mb.txt"), "data").unwrap();
        assert!(directory_manager.delete(path.as_path()).is_ok());
        assert!(!path.exists());
        // deleting twice is fine
        assert!(directory_manager.delete(path.as_path()).is_ok());
    }
}

use super::super::utils::{FsError, validate_path};
use super::LocalFile;
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("error writing file: {0}")]
    ErrorCreatingFile(#[from] io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] FsError),
}

impl WriteError {
    /// OS error number behind the failure, if the failure came from the OS.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            WriteError::ErrorCreatingFile(err) => err.raw_os_error(),
            WriteError::InvalidPath(_) => None,
        }
    }
}

pub trait FileWriter {
    /// Creates (or truncates) the file at `path` and writes `content` into it.
    ///
    /// `permissions` are only applied when the file is created; an existing file keeps its mode.
    fn write(&self, path: &Path, content: &[u8], permissions: Permissions)
    -> Result<(), WriteError>;
}

impl FileWriter for LocalFile {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn write(
        &self,
        path: &Path,
        content: &[u8],
        permissions: Permissions,
    ) -> Result<(), WriteError> {
        validate_path(path)?;

        let mut file_options = fs::OpenOptions::new();
        file_options.create(true).write(true).truncate(true);

        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

            file_options.mode(permissions.mode());
        }

        let mut file = file_options.open(path)?;
        file.write_all(content)?;
        // Quota and space errors may only surface when the data is flushed.
        file.sync_all()?;

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use crate::mock::MockLocalFile;
    use std::path::PathBuf;

    impl MockLocalFile {
        pub fn should_write(&mut self, path: &Path, content: Vec<u8>) {
            let expected_path = PathBuf::from(path);
            self.expect_write()
                .withf(move |p, c, _| p == expected_path.as_path() && c == content.as_slice())
                .once()
                .returning(|_, _, _| Ok(()));
        }

        pub fn should_write_any(&mut self, times: usize) {
            self.expect_write()
                .times(times)
                .returning(|_, _, _| Ok(()));
        }

        /// Every expected write fails with the given OS error number (ex: `EDQUOT`).
        pub fn should_not_write_os_error(&mut self, times: usize, errno: i32) {
            self.expect_write().times(times).returning(move |_, _, _| {
                Err(WriteError::ErrorCreatingFile(io::Error::from_raw_os_error(
                    errno,
                )))
            });
        }
    }
}

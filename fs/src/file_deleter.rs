use crate::LocalFile;
use std::fs::remove_file;
use std::io;
use std::path::Path;
use tracing::instrument;

pub trait FileDeleter {
    /// Removes a file or a symlink. The symlink target is left untouched.
    fn delete(&self, file_path: &Path) -> io::Result<()>;
}

impl FileDeleter for LocalFile {
    #[instrument(skip_all, fields(path = %file_path.display()))]
    fn delete(&self, file_path: &Path) -> io::Result<()> {
        if file_path.symlink_metadata().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}", file_path.display()),
            ));
        }

        remove_file(file_path)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use crate::mock::MockLocalFile;

    impl MockLocalFile {
        pub fn should_delete_any(&mut self, times: usize) {
            self.expect_delete().times(times).returning(|_| Ok(()));
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_delete_not_found_should_return_error() {
        let deleter = LocalFile;
        let result = deleter.delete(Path::new("/a/path/that/does/not/exist"));
        assert!(result.is_err());
        assert_eq!(
            String::from("/a/path/that/does/not/exist"),
            result.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_dangling_symlink_can_be_deleted() {
        let dir = tempdir().unwrap();
        let link = dir.path().join(".access_token");
        symlink(dir.path().join("nowhere"), &link).unwrap();

        LocalFile.delete(&link).unwrap();

        assert!(link.symlink_metadata().is_err());
    }
}

use super::LocalFile;
use std::fs::rename;
use std::io;
use std::path::Path;
use tracing::instrument;

pub trait FileRenamer {
    /// Moves a file or a directory. Both paths must be on the same filesystem.
    fn rename(&self, file_path: &Path, rename_path: &Path) -> io::Result<()>;
}

impl FileRenamer for LocalFile {
    #[instrument(skip_all, fields(from = %file_path.display(), to = %rename_path.display()))]
    fn rename(&self, file_path: &Path, rename_path: &Path) -> io::Result<()> {
        if file_path.symlink_metadata().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file or dir not found: {}", file_path.display()),
            ));
        }

        rename(file_path, rename_path)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use crate::mock::MockLocalFile;
    use mockall::predicate;
    use std::path::{Path, PathBuf};

    impl MockLocalFile {
        pub fn should_rename(&mut self, path: &Path, rename: &Path) {
            self.expect_rename()
                .with(
                    predicate::eq(PathBuf::from(path)),
                    predicate::eq(PathBuf::from(rename)),
                )
                .times(1)
                .returning(move |_, _| Ok(()));
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_path_not_found_should_return_error() {
        let renamer = LocalFile;
        let result = renamer.rename(
            Path::new("/a/path/that/does/not/exist"),
            Path::new("/another/path"),
        );
        assert!(result.is_err());
        assert_eq!(
            String::from("file or dir not found: /a/path/that/does/not/exist"),
            result.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_directories_are_moved_with_contents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join(".cache");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("data"), "cached").unwrap();
        let dst = dir.path().join("moved");

        LocalFile.rename(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("data")).unwrap(), "cached");
    }
}

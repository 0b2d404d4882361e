use super::LocalFile;
use std::fs::{self, read_dir};
use std::io;
use std::path::{Path, PathBuf};

pub trait FileReader {
    /// Read the contents of file_path and return them as string.
    ///
    /// If the file is not present, or it is not valid UTF-8, an error is returned.
    fn read(&self, file_path: &Path) -> io::Result<String>;

    /// Read the raw contents of file_path.
    fn read_bytes(&self, file_path: &Path) -> io::Result<Vec<u8>>;

    /// Return the entries inside a given Path, sorted by name.
    ///
    /// If the path does not exist or is not a directory it will return an error.
    fn dir_entries(&self, dir_path: &Path) -> io::Result<Vec<PathBuf>>;
}

impl FileReader for LocalFile {
    fn read(&self, file_path: &Path) -> io::Result<String> {
        let file_contents = self.read_bytes(file_path)?;

        String::from_utf8(file_contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("UTF-8 decoding error: {e}"),
            )
        })
    }

    fn read_bytes(&self, file_path: &Path) -> io::Result<Vec<u8>> {
        if !file_path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found or not a file: {}", file_path.display()),
            ));
        }

        fs::read(file_path)
    }

    fn dir_entries(&self, dir_path: &Path) -> io::Result<Vec<PathBuf>> {
        if !dir_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "directory not found or not a directory: {}",
                    dir_path.display()
                ),
            ));
        }
        let mut file_paths = read_dir(dir_path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<PathBuf>>>()?;
        file_paths.sort();
        Ok(file_paths)
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use crate::mock::MockLocalFile;
    use mockall::predicate;

    impl MockLocalFile {
        pub fn should_read(&mut self, path: &Path, content: String) {
            self.expect_read()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(move |_| Ok(content.clone()));
        }

        pub fn should_read_bytes(&mut self, path: &Path, content: Vec<u8>) {
            self.expect_read_bytes()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(move |_| Ok(content.clone()));
        }

        pub fn should_dir_entries(&mut self, path: &Path, content: Vec<PathBuf>) {
            self.expect_dir_entries()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(move |_| Ok(content.clone()));
        }

        pub fn should_not_read_file_not_found(&mut self, path: &Path) {
            self.expect_read()
                .with(predicate::eq(PathBuf::from(path)))
                .once()
                .returning(|p| {
                    Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("file not found or not a file: {}", p.display()),
                    ))
                });
        }
    }
}

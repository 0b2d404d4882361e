//! Small filesystem layer for the startup steps.
//!
//! Every operation lives behind a trait so callers can be generic over [LocalFile] and the
//! `mockall` mocks exported under the `mocks` feature. Errors keep the underlying
//! [std::io::Error] so that callers can inspect the raw OS error number.
pub mod directory_manager;
pub mod file;
pub mod file_deleter;
pub mod utils;

pub use file::LocalFile;

#[cfg(feature = "mocks")]
pub mod mock {
    use super::file::reader::FileReader;
    use super::file::renamer::FileRenamer;
    use super::file::writer::{FileWriter, WriteError};
    use super::file_deleter::FileDeleter;
    use mockall::mock;
    use std::fs::Permissions;
    use std::io;
    use std::path::{Path, PathBuf};

    mock! {
        pub LocalFile {}

        impl FileReader for LocalFile {
            fn read(&self, file_path: &Path) -> io::Result<String>;
            fn read_bytes(&self, file_path: &Path) -> io::Result<Vec<u8>>;
            fn dir_entries(&self, dir_path: &Path) -> io::Result<Vec<PathBuf>>;
        }

        impl FileRenamer for LocalFile {
            fn rename(&self, file_path: &Path, rename_path: &Path) -> io::Result<()>;
        }

        impl FileWriter for LocalFile {
            fn write(
                &self,
                path: &Path,
                content: &[u8],
                permissions: Permissions,
            ) -> Result<(), WriteError>;
        }

        impl FileDeleter for LocalFile {
            fn delete(&self, file_path: &Path) -> io::Result<()>;
        }
    }
}

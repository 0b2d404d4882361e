//! Portable startup errors.
//!
//! Errors are shown to a client that may run on another OS or architecture, where numeric
//! error codes differ (`EDQUOT` is 122 on Linux x86_64 but 69 on macOS), so the symbolic
//! code always travels next to the number.
use crate::command::CommandError;
use ::fs::directory_manager::DirectoryManagementError;
use ::fs::file::writer::WriteError;
use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// Error codes that do not exist in the OS errno table. They start at 200 to stay clear of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum RspErrorCode {
    EBADENV = 200,
    EUNKNOWN = 201,
    EOLDCONTROLLER = 202,
}

impl RspErrorCode {
    pub fn from_errno(errno: i32) -> Option<Self> {
        match errno {
            200 => Some(Self::EBADENV),
            201 => Some(Self::EUNKNOWN),
            202 => Some(Self::EOLDCONTROLLER),
            _ => None,
        }
    }

    pub fn errno(self) -> i32 {
        self as i32
    }

    pub fn errorcode(self) -> &'static str {
        match self {
            Self::EBADENV => "EBADENV",
            Self::EUNKNOWN => "EUNKNOWN",
            Self::EOLDCONTROLLER => "EOLDCONTROLLER",
        }
    }

    pub fn strerror(self) -> &'static str {
        match self {
            Self::EBADENV => "Missing environment variable",
            Self::EUNKNOWN => "Unknown error 201",
            Self::EOLDCONTROLLER => "Startup configuration not supplied by controller",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupError {
    pub errno: i32,
    pub strerror: String,
    pub errorcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename2: Option<String>,
}

impl StartupError {
    /// Builds an error from any number. Numbers that are neither OS nor [RspErrorCode]
    /// codes become `EUNKNOWN`. A missing `strerror` gets the standard description.
    pub fn new(errno: i32, strerror: Option<String>, filename: Option<String>) -> Self {
        let (errno, default_strerror, errorcode) = describe(errno);
        Self {
            errno,
            strerror: strerror.filter(|s| !s.is_empty()).unwrap_or(default_strerror),
            errorcode,
            filename,
            filename2: None,
        }
    }

    pub fn rsp(code: RspErrorCode, filename: Option<String>) -> Self {
        Self::new(code.errno(), None, filename)
    }

    /// `EBADENV` naming the missing variable.
    pub fn bad_env(var: &str) -> Self {
        Self::rsp(RspErrorCode::EBADENV, Some(var.to_string()))
    }

    pub fn from_io(err: &io::Error, path: Option<&Path>) -> Self {
        let filename = path.map(|p| p.display().to_string());
        match err.raw_os_error() {
            Some(errno) => Self::new(errno, None, filename),
            None => Self::new(RspErrorCode::EUNKNOWN.errno(), Some(err.to_string()), filename),
        }
    }

    pub fn with_filename(self, filename: impl Into<String>) -> Self {
        Self {
            filename: Some(filename.into()),
            ..self
        }
    }

    pub fn with_filename2(self, filename2: impl Into<String>) -> Self {
        Self {
            filename2: Some(filename2.into()),
            ..self
        }
    }

    pub fn is(&self, errno: Errno) -> bool {
        self.errno == errno as i32
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Reads an error written by another process, possibly on another platform. The
    /// symbolic code is kept as written.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

fn describe(errno: i32) -> (i32, String, String) {
    if let Some(code) = RspErrorCode::from_errno(errno) {
        return (errno, code.strerror().to_string(), code.errorcode().to_string());
    }
    match Errno::from_raw(errno) {
        Errno::UnknownErrno => {
            let code = RspErrorCode::EUNKNOWN;
            (code.errno(), code.strerror().to_string(), code.errorcode().to_string())
        }
        known => (errno, known.desc().to_string(), mnemonic(known)),
    }
}

/// Symbolic name of an OS error. Names sharing a number resolve to the one `nix` defines the
/// variant for: `EAGAIN`, `EDEADLK` and, on Linux, `EOPNOTSUPP`.
fn mnemonic(errno: Errno) -> String {
    format!("{errno:?}")
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Errno {}] {}", self.errno, self.strerror)?;
        match (&self.filename, &self.filename2) {
            (Some(f1), Some(f2)) => write!(f, ": '{f1}' -> '{f2}'"),
            (Some(f1), None) => write!(f, ": '{f1}'"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<io::Error> for StartupError {
    fn from(err: io::Error) -> Self {
        Self::from_io(&err, None)
    }
}

impl From<WriteError> for StartupError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::ErrorCreatingFile(io_err) => Self::from_io(&io_err, None),
            WriteError::InvalidPath(fs_err) => Self::new(
                Errno::EINVAL as i32,
                None,
                Some(fs_err.to_string()),
            ),
        }
    }
}

impl From<DirectoryManagementError> for StartupError {
    fn from(err: DirectoryManagementError) -> Self {
        match err {
            DirectoryManagementError::ErrorCreatingDirectory(path, io_err)
            | DirectoryManagementError::ErrorDeletingDirectory(path, io_err) => {
                Self::from_io(&io_err, Some(Path::new(&path)))
            }
            DirectoryManagementError::InvalidDirectory(fs_err) => Self::new(
                Errno::EINVAL as i32,
                None,
                Some(fs_err.to_string()),
            ),
        }
    }
}

impl From<CommandError> for StartupError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Spawn { args, err } | CommandError::Exec { args, err } => {
                Self::from_io(&err, None).with_filename(args)
            }
            other => Self::new(
                RspErrorCode::EUNKNOWN.errno(),
                Some(other.to_string()),
                None,
            ),
        }
    }
}

/// Attaches the path an I/O operation was working on.
pub trait PathContext<T> {
    fn with_path(self, path: &Path) -> Result<T, StartupError>;
}

impl<T> PathContext<T> for io::Result<T> {
    fn with_path(self, path: &Path) -> Result<T, StartupError> {
        self.map_err(|err| StartupError::from_io(&err, Some(path)))
    }
}

impl<T> PathContext<T> for Result<T, WriteError> {
    fn with_path(self, path: &Path) -> Result<T, StartupError> {
        self.map_err(|err| StartupError {
            filename: Some(path.display().to_string()),
            ..StartupError::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::edquot(Errno::EDQUOT as i32, "EDQUOT")]
    #[case::enospc(Errno::ENOSPC as i32, "ENOSPC")]
    #[case::eacces(Errno::EACCES as i32, "EACCES")]
    #[case::badenv(200, "EBADENV")]
    #[case::oldcontroller(202, "EOLDCONTROLLER")]
    fn test_errorcode_mnemonic(#[case] errno: i32, #[case] expected: &str) {
        let err = StartupError::new(errno, None, None);
        assert_eq!(err.errno, errno);
        assert_eq!(err.errorcode, expected);
    }

    #[cfg(all(target_os = "linux", any(target_arch = "x86_64", target_arch = "aarch64")))]
    #[rstest]
    #[case::eagain(Errno::EAGAIN, "EAGAIN")]
    #[case::ewouldblock(Errno::EWOULDBLOCK, "EAGAIN")]
    #[case::edeadlk(Errno::EDEADLK, "EDEADLK")]
    #[case::edeadlock(Errno::EDEADLOCK, "EDEADLK")]
    #[case::enotsup(Errno::ENOTSUP, "EOPNOTSUPP")]
    #[case::eopnotsupp(Errno::EOPNOTSUPP, "EOPNOTSUPP")]
    fn test_aliased_numbers_have_one_mnemonic(#[case] errno: Errno, #[case] expected: &str) {
        let err = StartupError::new(errno as i32, None, None);
        assert_eq!(err.errorcode, expected);
        assert_eq!(mnemonic(errno), expected);
    }

    #[rstest]
    #[case::unassigned(1999)]
    #[case::negative(-4)]
    fn test_unknown_numbers_become_eunknown(#[case] errno: i32) {
        let err = StartupError::new(errno, None, None);
        assert_eq!(err.errno, 201);
        assert_eq!(err.errorcode, "EUNKNOWN");
        assert_eq!(err.strerror, "Unknown error 201");
    }

    #[test]
    fn test_display_follows_os_convention() {
        let err = StartupError::from_io(
            &io::Error::from_raw_os_error(Errno::EDQUOT as i32),
            Some(Path::new("/home/user/.cache/1mb.txt")),
        );
        assert_eq!(
            err.to_string(),
            format!(
                "[Errno {}] {}: '/home/user/.cache/1mb.txt'",
                Errno::EDQUOT as i32,
                Errno::EDQUOT.desc()
            )
        );

        let err = StartupError::bad_env("JUPYTERHUB_BASE_URL");
        assert_eq!(
            err.to_string(),
            "[Errno 200] Missing environment variable: 'JUPYTERHUB_BASE_URL'"
        );

        let err = StartupError::rsp(RspErrorCode::EUNKNOWN, None).with_filename2("b");
        assert_eq!(err.to_string(), "[Errno 201] Unknown error 201");

        let err = StartupError::new(Errno::ENOENT as i32, None, Some("a".into())).with_filename2("b");
        assert!(err.to_string().ends_with(": 'a' -> 'b'"));
    }

    #[test]
    fn test_io_error_without_os_code() {
        let err = StartupError::from(io::Error::other("something odd"));
        assert_eq!(err.errorcode, "EUNKNOWN");
        assert_eq!(err.strerror, "something odd");
    }

    #[test]
    fn test_write_error_keeps_errno() {
        let err: StartupError = Err::<(), _>(WriteError::ErrorCreatingFile(
            io::Error::from_raw_os_error(Errno::ENOSPC as i32),
        ))
        .with_path(Path::new("/home/u/f"))
        .unwrap_err();

        assert!(err.is(Errno::ENOSPC));
        assert_eq!(err.filename.as_deref(), Some("/home/u/f"));
    }

    #[test]
    fn test_json_hand_off() {
        let err = StartupError::new(Errno::EDQUOT as i32, None, Some("/home/u".into()));

        let parsed = StartupError::from_json(&err.to_json()).unwrap();

        assert_eq!(parsed, err);
    }

    #[test]
    fn test_json_from_other_platform_keeps_mnemonic() {
        // EDQUOT as numbered on macOS
        let json = r#"{"errno":69,"strerror":"Disc quota exceeded","errorcode":"EDQUOT"}"#;
        let parsed = StartupError::from_json(json).unwrap();
        assert_eq!(parsed.errorcode, "EDQUOT");
        assert_eq!(parsed.strerror, "Disc quota exceeded");
    }
}

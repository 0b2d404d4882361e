//! Access token lookup.
//!
//! Mounted files are preferred over the environment: the platform can rotate a mounted token
//! while the process runs, whereas `ACCESS_TOKEN` keeps the value it had at process start.
use crate::defaults::{LEGACY_TOKEN_PATH, RUNTIME_MOUNTS_DIR, RUNTIME_MOUNTS_ENV_VAR, SECRET_TOKEN_PATH};
use ::fs::LocalFile;
use ::fs::file::reader::FileReader;
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ACCESS_TOKEN_ENV_VAR: &str = "ACCESS_TOKEN";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("No access token available")]
    NotAvailable,
}

/// Returns the runtime mounts directory, honouring its environment override.
pub fn runtime_mounts_dir() -> PathBuf {
    env::var(RUNTIME_MOUNTS_ENV_VAR)
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(RUNTIME_MOUNTS_DIR))
}

/// Finds the bearer token following the lookup order:
/// explicit path, mounted secret, legacy mounted config map, `ACCESS_TOKEN`.
pub struct TokenLocator<F = LocalFile> {
    runtime_mounts: PathBuf,
    file_reader: F,
}

impl Default for TokenLocator {
    fn default() -> Self {
        Self::new(runtime_mounts_dir())
    }
}

impl TokenLocator {
    pub fn new(runtime_mounts: PathBuf) -> Self {
        Self {
            runtime_mounts,
            file_reader: LocalFile,
        }
    }
}

impl<F: FileReader> TokenLocator<F> {
    pub fn with_file_reader(runtime_mounts: PathBuf, file_reader: F) -> Self {
        Self {
            runtime_mounts,
            file_reader,
        }
    }

    pub fn secret_path(&self) -> PathBuf {
        self.runtime_mounts.join(SECRET_TOKEN_PATH)
    }

    /// Returns the token, or an empty string when none is available.
    pub fn token(&self, explicit: Option<&Path>) -> String {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain([
                self.secret_path(),
                self.runtime_mounts.join(LEGACY_TOKEN_PATH),
            ]);
        for path in candidates {
            match self.file_reader.read(&path) {
                Ok(content) if !content.trim().is_empty() => {
                    debug!(path = %path.display(), "access token read from file");
                    return content.trim().to_string();
                }
                Ok(_) => debug!(path = %path.display(), "token file is empty"),
                Err(err) => debug!(path = %path.display(), %err, "token file not readable"),
            }
        }
        env::var(ACCESS_TOKEN_ENV_VAR)
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }
}

/// Like [get_access_token], for callers that cannot work without a token.
///
/// A non-empty `token` is used as is.
pub fn require_access_token(token: Option<&str>) -> Result<String, TokenError> {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Ok(token.to_string()),
        None => Some(get_access_token(None))
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::NotAvailable),
    }
}

/// Returns the current access token, or an empty string if there is none.
///
/// Absence is not an error here; callers decide whether running without a token is fatal.
pub fn get_access_token(token_file: Option<&Path>) -> String {
    TokenLocator::default().token(token_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::fs::mock::MockLocalFile;
    use serial_test::serial;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    fn mounts_with(secret: Option<&str>, legacy: Option<&str>) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        if let Some(secret) = secret {
            create_dir_all(dir.path().join("secrets")).unwrap();
            write(dir.path().join(SECRET_TOKEN_PATH), secret).unwrap();
        }
        if let Some(legacy) = legacy {
            create_dir_all(dir.path().join("environment")).unwrap();
            write(dir.path().join(LEGACY_TOKEN_PATH), legacy).unwrap();
        }
        dir
    }

    #[test]
    #[serial]
    fn explicit_path_wins() {
        let mounts = mounts_with(Some("secret"), Some("legacy"));
        let explicit = mounts.path().join("mine");
        write(&explicit, "explicit-token\n").unwrap();

        let locator = TokenLocator::new(mounts.path().to_path_buf());

        assert_eq!(locator.token(Some(&explicit)), "explicit-token");
    }

    #[test]
    #[serial]
    fn secret_before_legacy() {
        let mounts = mounts_with(Some("secret\n"), Some("legacy"));
        let locator = TokenLocator::new(mounts.path().to_path_buf());
        assert_eq!(locator.token(None), "secret");
    }

    #[test]
    #[serial]
    fn legacy_when_no_secret() {
        let mounts = mounts_with(None, Some("legacy"));
        let locator = TokenLocator::new(mounts.path().to_path_buf());
        assert_eq!(locator.token(None), "legacy");
    }

    #[test]
    #[serial]
    fn environment_as_last_resort() {
        let mounts = mounts_with(Some("   "), None);
        unsafe {
            env::set_var(ACCESS_TOKEN_ENV_VAR, "from-env");
        }
        let locator = TokenLocator::new(mounts.path().to_path_buf());
        assert_eq!(locator.token(None), "from-env");
        unsafe {
            env::remove_var(ACCESS_TOKEN_ENV_VAR);
        }
    }

    #[test]
    #[serial]
    fn empty_when_nothing_is_available() {
        unsafe {
            env::remove_var(ACCESS_TOKEN_ENV_VAR);
        }
        let mut reader = MockLocalFile::new();
        reader.should_not_read_file_not_found(Path::new("/mounts/secrets/token"));
        reader.should_not_read_file_not_found(Path::new("/mounts/environment/ACCESS_TOKEN"));

        let locator = TokenLocator::with_file_reader(PathBuf::from("/mounts"), reader);

        assert_eq!(locator.token(None), "");
    }

    #[test]
    #[serial]
    fn required_token_prefers_the_given_one() {
        unsafe {
            env::remove_var(ACCESS_TOKEN_ENV_VAR);
        }
        assert_eq!(require_access_token(Some(" given ")).unwrap(), "given");
    }

    #[test]
    #[serial]
    fn required_token_missing() {
        let mounts = tempdir().unwrap();
        unsafe {
            env::set_var(RUNTIME_MOUNTS_ENV_VAR, mounts.path());
            env::remove_var(ACCESS_TOKEN_ENV_VAR);
        }
        assert_eq!(require_access_token(Some("")), Err(TokenError::NotAvailable));
        unsafe {
            env::remove_var(RUNTIME_MOUNTS_ENV_VAR);
        }
    }
}

use regex::Regex;
use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

static DOTS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|/)\.\.(/|$)").unwrap_or_else(|err| panic!("invalid dots regex: {err}"))
});

#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("invalid path: `{0}`")]
    InvalidPath(String),

    #[error("dots disallowed in path `{0}`")]
    DotsDisallowed(String),
}

/// Rejects paths that are not valid unicode or that contain a `..` component.
pub fn validate_path(path: &Path) -> Result<(), FsError> {
    match path.to_str() {
        None => Err(FsError::InvalidPath(format!(
            "{} is not valid unicode",
            path.to_string_lossy()
        ))),
        Some(valid_path) => {
            if DOTS_REGEX.is_match(valid_path) {
                Err(FsError::DotsDisallowed(valid_path.to_string()))
            } else {
                Ok(())
            }
        }
    }
}

/// Owner read/write only, used for credentials and tokens.
pub fn private_file_permissions() -> Permissions {
    Permissions::from_mode(0o600)
}

pub fn private_directory_permissions() -> Permissions {
    Permissions::from_mode(0o700)
}

/// World readable, used for settings and copied documents.
pub fn shared_file_permissions() -> Permissions {
    Permissions::from_mode(0o644)
}

pub fn shared_directory_permissions() -> Permissions {
    Permissions::from_mode(0o755)
}

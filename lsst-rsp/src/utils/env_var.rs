use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Key validation regex, start with letter/underscore, then letters/digits/underscore.
const KEY_VALIDATION_REGEX: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static KEY_VALIDATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(KEY_VALIDATION_REGEX)
        .unwrap_or_else(|err| panic!("invalid env key regex {KEY_VALIDATION_REGEX}: {err}"))
});

#[derive(Debug, Error, PartialEq)]
pub enum EnvVarError {
    #[error("invalid key, must match {KEY_VALIDATION_REGEX}: {0}")]
    InvalidKey(String),
    #[error("invalid value (contains NUL) for key: {0}")]
    InvalidValue(String),
}

/// Checks that a variable can be handed to `execve` unchanged.
///
/// Keys must match `^[A-Za-z_][A-Za-z0-9_]*$` and values cannot contain NUL characters.
pub fn validate_env_var(key: &str, value: &str) -> Result<(), EnvVarError> {
    if !KEY_VALIDATION.is_match(key) {
        return Err(EnvVarError::InvalidKey(key.to_string()));
    }
    if value.contains('\0') {
        return Err(EnvVarError::InvalidValue(key.to_string()));
    }
    Ok(())
}

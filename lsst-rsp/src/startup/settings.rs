//! JupyterLab user settings and the access token file.
use super::error::{PathContext, StartupError};
use crate::defaults::{MARKDOWN_VIEWER, MAX_NUMBER_OUTPUTS};
use crate::token::TokenLocator;
use ::fs::file::reader::FileReader;
use ::fs::file::writer::FileWriter;
use ::fs::utils::{private_file_permissions, shared_file_permissions};
use nix::errno::Errno;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value, json};
use std::fs as stdfs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const USER_SETTINGS_DIR: &str = ".jupyter/lab/user-settings/@jupyterlab";

pub fn notebook_tracker_settings(home: &Path) -> PathBuf {
    home.join(USER_SETTINGS_DIR)
        .join("notebook-extension")
        .join("tracker.jupyterlab.settings")
}

pub fn docmanager_settings(home: &Path) -> PathBuf {
    home.join(USER_SETTINGS_DIR)
        .join("docmanager-extension")
        .join("plugin.jupyterlab-settings")
}

/// Serializes with sorted keys and the given indentation.
pub fn to_json_string(value: &Value, indent: &[u8]) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent));
    sort_keys(value).serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn invalid_settings(path: &Path, err: impl ToString) -> StartupError {
    StartupError::new(
        Errno::EINVAL as i32,
        Some(err.to_string()),
        Some(path.display().to_string()),
    )
}

/// Reads a settings file as a JSON object; a missing file is an empty object.
pub fn read_settings<R: FileReader>(reader: &R, path: &Path) -> Result<Map<String, Value>, StartupError> {
    if !path.is_file() {
        return Ok(Map::new());
    }
    let content = reader.read(path).with_path(path)?;
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(invalid_settings(path, "settings are not a JSON object")),
        Err(err) => Err(invalid_settings(path, err)),
    }
}

pub fn write_settings<W: FileWriter>(
    writer: &W,
    path: &Path,
    settings: Map<String, Value>,
    indent: &[u8],
) -> Result<(), StartupError> {
    if let Some(parent) = path.parent() {
        stdfs::create_dir_all(parent).with_path(parent)?;
    }
    let content =
        to_json_string(&Value::Object(settings), indent).map_err(|err| invalid_settings(path, err))?;
    writer
        .write(path, content.as_bytes(), shared_file_permissions())
        .with_path(path)
}

/// Raises the notebook `maxNumberOutputs` so chatty cells cannot exhaust memory.
pub fn increase_log_limit<F: FileReader + FileWriter>(
    files: &F,
    home: &Path,
) -> Result<(), StartupError> {
    let path = notebook_tracker_settings(home);
    let mut settings = read_settings(files, &path)?;
    let current = settings
        .get("maxNumberOutputs")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if current >= MAX_NUMBER_OUTPUTS {
        debug!("log limit increase not needed");
        return Ok(());
    }
    warn!(path = %path.display(), from = current, to = MAX_NUMBER_OUTPUTS, "changing maxNumberOutputs");
    settings.insert("maxNumberOutputs".to_string(), json!(MAX_NUMBER_OUTPUTS));
    write_settings(files, &path, settings, b"    ")
}

/// Makes markdown open rendered by default, unless the user chose otherwise.
pub fn set_markdown_viewer<F: FileReader + FileWriter>(
    files: &F,
    home: &Path,
    indent: &[u8],
) -> Result<(), StartupError> {
    let path = docmanager_settings(home);
    let mut settings = read_settings(files, &path)?;
    let viewers = settings
        .entry("defaultViewers")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(viewers) = viewers.as_object_mut() else {
        warn!(path = %path.display(), "defaultViewers is not an object; leaving it alone");
        return Ok(());
    };
    if viewers.contains_key("markdown") {
        debug!("markdown viewer already set");
        return Ok(());
    }
    viewers.insert("markdown".to_string(), json!(MARKDOWN_VIEWER));
    write_settings(files, &path, settings, indent)
}

/// Points `~/.access_token` at the mounted token, or writes the token looked up otherwise.
pub fn manage_access_token<R: FileReader, W: FileWriter>(
    home: &Path,
    locator: &TokenLocator<R>,
    writer: &W,
) -> Result<(), StartupError> {
    let token_file = home.join(".access_token");
    match stdfs::remove_file(&token_file) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => {
            return Err(StartupError::from_io(&err, Some(&token_file)));
        }
        _ => {}
    }
    let mounted = locator.secret_path();
    if mounted.exists() {
        debug!(from = %token_file.display(), to = %mounted.display(), "symlinking access token");
        return std::os::unix::fs::symlink(&mounted, &token_file).with_path(&token_file);
    }
    let token = locator.token(None);
    if token.is_empty() {
        debug!("could not determine access token");
        return Ok(());
    }
    writer
        .write(&token_file, token.as_bytes(), private_file_permissions())
        .with_path(&token_file)
}

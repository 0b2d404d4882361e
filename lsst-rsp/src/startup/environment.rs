use super::error::StartupError;
use crate::utils::env_var::{EnvVarError, validate_env_var};
use std::collections::BTreeMap;
use std::env;
use tracing::{error, info};

pub const ABNORMAL_STARTUP: &str = "ABNORMAL_STARTUP";
pub const ABNORMAL_STARTUP_ERRNO: &str = "ABNORMAL_STARTUP_ERRNO";
pub const ABNORMAL_STARTUP_STRERROR: &str = "ABNORMAL_STARTUP_STRERROR";
pub const ABNORMAL_STARTUP_ERRORCODE: &str = "ABNORMAL_STARTUP_ERRORCODE";
pub const ABNORMAL_STARTUP_MESSAGE: &str = "ABNORMAL_STARTUP_MESSAGE";

const ABNORMAL_STARTUP_VARS: [&str; 5] = [
    ABNORMAL_STARTUP,
    ABNORMAL_STARTUP_ERRNO,
    ABNORMAL_STARTUP_STRERROR,
    ABNORMAL_STARTUP_ERRORCODE,
    ABNORMAL_STARTUP_MESSAGE,
];

/// The `ABNORMAL_STARTUP*` variables at one point in time, empty if the startup was normal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbnormalState(BTreeMap<String, String>);

impl AbnormalState {
    pub fn is_broken(&self) -> bool {
        self.0.contains_key(ABNORMAL_STARTUP)
    }
}

/// Environment the Lab process will be started with.
///
/// Every startup step reads and updates it; it is handed to the new process on exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchEnvironment(BTreeMap<String, String>);

impl LaunchEnvironment {
    /// Current process environment. Variables that are not valid unicode are skipped.
    pub fn from_process() -> Self {
        Self(
            env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        )
    }

    /// Map loaded from an untrusted source. Every pair must be usable by `execve`.
    pub fn try_from_map(map: BTreeMap<String, String>) -> Result<Self, EnvVarError> {
        map.iter().try_for_each(|(k, v)| validate_env_var(k, v))?;
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Value of `key`, treating an empty string as unset.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Sets `key` only when it is not already present.
    pub fn set_default(&mut self, key: &str, value: &str) {
        self.0
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }

    /// Records the error so the Lab can report it to the user once it is up.
    pub fn set_abnormal_startup(&mut self, err: &StartupError) {
        self.set(ABNORMAL_STARTUP, "TRUE");
        self.set(ABNORMAL_STARTUP_ERRNO, err.errno.to_string());
        self.set(ABNORMAL_STARTUP_STRERROR, err.strerror.clone());
        self.set(ABNORMAL_STARTUP_ERRORCODE, err.errorcode.clone());
        self.set(ABNORMAL_STARTUP_MESSAGE, err.to_string());
        error!(error = %err, "abnormal startup");
    }

    pub fn clear_abnormal_startup(&mut self) {
        ABNORMAL_STARTUP_VARS.iter().for_each(|var| {
            self.0.remove(*var);
        });
        info!("cleared abnormal startup condition");
    }

    pub fn is_broken(&self) -> bool {
        self.contains(ABNORMAL_STARTUP)
    }

    pub fn abnormal_state(&self) -> AbnormalState {
        AbnormalState(
            ABNORMAL_STARTUP_VARS
                .iter()
                .filter_map(|var| Some((var.to_string(), self.get(var)?.to_string())))
                .collect(),
        )
    }

    /// Puts back a state taken with [LaunchEnvironment::abnormal_state], dropping anything
    /// recorded since.
    pub fn restore_abnormal_state(&mut self, state: AbnormalState) {
        if !state.is_broken() {
            self.clear_abnormal_startup();
            return;
        }
        ABNORMAL_STARTUP_VARS.iter().for_each(|var| {
            self.0.remove(*var);
        });
        self.0.extend(state.0);
        info!("restored earlier abnormal startup condition");
    }
}

impl From<BTreeMap<String, String>> for LaunchEnvironment {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LaunchEnvironment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

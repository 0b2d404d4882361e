//! Service discovery within Nublado notebooks.
//!
//! Everything is read from the static JSON document the controller mounts in the Lab. The
//! document is read again on every query.
pub mod influxdb;

use crate::defaults::{DISCOVERY_PATH, DISCOVERY_PATH_ENV_VAR};
use crate::http::HttpError;
use crate::token::TokenError;
use ::fs::LocalFile;
use ::fs::file::reader::FileReader;
use serde_json::Value;
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

pub use influxdb::{InfluxDBCredentials, InfluxDBLocation};

/// Dataset used when the caller does not name one.
pub const DEFAULT_DATASET: &str = "dp1";

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    #[error("Service discovery information ({0}) not found")]
    DiscoveryNotAvailable(String),
    #[error("Invalid discovery information for {what}: {err}")]
    InvalidDiscovery { what: String, err: String },
    #[error("Service {0} is not present in this environment")]
    UnknownService(String),
    #[error("Dataset {0} is not present in this environment")]
    UnknownDataset(String),
    #[error("Service {service} does not support dataset {dataset}")]
    DatasetNotSupported { service: String, dataset: String },
    #[error("InfluxDB database {0} is not present in this environment")]
    UnknownInfluxDB(String),
    #[error("{0}")]
    Token(#[from] TokenError),
    #[error("{0}")]
    Http(#[from] HttpError),
}

/// Handle on a discovery document.
#[derive(Debug, Clone)]
pub struct Discovery {
    path: PathBuf,
}

impl Default for Discovery {
    /// Uses `RSP_DISCOVERY_PATH` if set, else the standard mount point.
    fn default() -> Self {
        let path = env::var(DISCOVERY_PATH_ENV_VAR)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DISCOVERY_PATH.to_string());
        Self::new(path)
    }
}

impl Discovery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    fn document(&self) -> Result<Value, DiscoveryError> {
        let content = LocalFile.read(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => {
                DiscoveryError::DiscoveryNotAvailable(self.path.display().to_string())
            }
            _ => DiscoveryError::InvalidDiscovery {
                what: self.path.display().to_string(),
                err: err.to_string(),
            },
        })?;
        serde_json::from_str(&content).map_err(|err| DiscoveryError::InvalidDiscovery {
            what: self.path.display().to_string(),
            err: err.to_string(),
        })
    }

    /// Returns the API URL for a service and dataset combination.
    ///
    /// `EXTERNAL_<SERVICE>_URL` in the environment takes precedence over the document.
    pub fn service_url(&self, service: &str, dataset: &str) -> Result<String, DiscoveryError> {
        let override_var = service_override_var(service);
        if let Some(url) = env::var(&override_var).ok().filter(|u| !u.is_empty()) {
            debug!(service, var = override_var, "service URL taken from environment");
            return Ok(url);
        }

        let document = self.document()?;
        let datasets = &document["services"]["data"][service];
        if is_empty(datasets) {
            return Err(DiscoveryError::UnknownService(service.to_string()));
        }
        match datasets[dataset]["url"].as_str() {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ if document["datasets"].get(dataset).is_none() => {
                Err(DiscoveryError::UnknownDataset(dataset.to_string()))
            }
            _ => Err(DiscoveryError::DatasetNotSupported {
                service: service.to_string(),
                dataset: dataset.to_string(),
            }),
        }
    }

    /// Labels of the InfluxDB databases in this environment, sorted.
    pub fn influxdb_labels(&self) -> Result<Vec<String>, DiscoveryError> {
        let document = self.document()?;
        let mut labels: Vec<String> = document["influxdb_databases"]
            .as_object()
            .map(|dbs| dbs.keys().cloned().collect())
            .unwrap_or_default();
        labels.sort();
        Ok(labels)
    }

    fn influxdb_entry(&self, label: &str) -> Result<Value, DiscoveryError> {
        let mut document = self.document()?;
        let entry = document
            .get_mut("influxdb_databases")
            .and_then(|dbs| dbs.get_mut(label))
            .map(Value::take)
            .unwrap_or_default();
        if is_empty(&entry) {
            return Err(DiscoveryError::UnknownInfluxDB(label.to_string()));
        }
        Ok(entry)
    }
}

/// `EXTERNAL_<SERVICE>_URL`, with the service upper-cased and `-` replaced by `_`.
fn service_override_var(service: &str) -> String {
    format!("EXTERNAL_{}_URL", service.to_uppercase().replace('-', "_"))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

pub fn get_service_url(service: &str, dataset: &str) -> Result<String, DiscoveryError> {
    Discovery::default().service_url(service, dataset)
}

pub fn list_influxdb_labels() -> Result<Vec<String>, DiscoveryError> {
    Discovery::default().influxdb_labels()
}

pub fn get_influxdb_location(label: &str) -> Result<InfluxDBLocation, DiscoveryError> {
    Discovery::default().influxdb_location(label)
}

pub fn get_influxdb_credentials(
    label: &str,
    token: Option<&str>,
) -> Result<InfluxDBCredentials, DiscoveryError> {
    Discovery::default().influxdb_credentials(label, token)
}

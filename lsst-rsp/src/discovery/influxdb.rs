use super::{Discovery, DiscoveryError};
use crate::http::client::try_build_reqwest_client;
use crate::http::config::HttpConfig;
use crate::http::{HttpError, response_json};
use crate::token::require_access_token;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Location information for an InfluxDB database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InfluxDBLocation {
    pub url: String,
    pub database: String,
    /// URL to the Schema Registry corresponding to that database.
    pub schema_registry: String,
}

/// Location plus the credentials to authenticate against it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InfluxDBCredentials {
    #[serde(flatten)]
    pub location: InfluxDBLocation,
    pub username: String,
    pub password: String,
}

impl Discovery {
    pub fn influxdb_location(&self, label: &str) -> Result<InfluxDBLocation, DiscoveryError> {
        let entry = self.influxdb_entry(label)?;
        serde_json::from_value(entry).map_err(|err| DiscoveryError::InvalidDiscovery {
            what: format!("InfluxDB database {label}"),
            err: err.to_string(),
        })
    }

    /// Asks the credentials service for the connection information of `label`.
    ///
    /// Uses `token` when given, else the Lab's own access token.
    #[instrument(skip(self, token))]
    pub fn influxdb_credentials(
        &self,
        label: &str,
        token: Option<&str>,
    ) -> Result<InfluxDBCredentials, DiscoveryError> {
        let entry = self.influxdb_entry(label)?;
        let Some(credentials_url) = entry["credentials_url"].as_str().filter(|u| !u.is_empty())
        else {
            return Err(DiscoveryError::UnknownInfluxDB(label.to_string()));
        };

        let token = require_access_token(token)?;

        debug!(url = credentials_url, "requesting InfluxDB credentials");
        let client = try_build_reqwest_client(HttpConfig::default()).map_err(HttpError::from)?;
        let res = client
            .get(credentials_url)
            .bearer_auth(&token)
            .send()
            .map_err(|err| HttpError::request(credentials_url, err))?;
        let info: Value = response_json(res)?;

        serde_json::from_value(info).map_err(|err| DiscoveryError::InvalidDiscovery {
            what: format!("InfluxDB creds for {label}"),
            err: err.to_string(),
        })
    }
}

//! TAP and SIAv2 clients bound to discovered service URLs.
//!
//! These are request-level clients: they return the raw VOTable text and leave parsing to
//! the caller.
use crate::discovery::{DEFAULT_DATASET, Discovery, DiscoveryError};
use crate::http::session::AuthenticatedSession;
use crate::http::{HttpError, error_for_status, response_text};
use reqwest::header::LOCATION;
use tracing::{debug, warn};

const TAP_SERVICES: &[&str] = &["live", "tap", "ssotap"];

#[derive(thiserror::Error, Debug)]
pub enum TapError {
    #[error("{0}")]
    InvalidService(String),
    #[error("{0}")]
    Discovery(#[from] DiscoveryError),
    #[error("{0}")]
    Http(#[from] HttpError),
}

#[derive(Debug, Clone)]
pub struct TapService {
    url: String,
    session: AuthenticatedSession,
}

impl TapService {
    pub fn new(url: impl Into<String>, session: AuthenticatedSession) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs `adql` synchronously and returns the VOTable text.
    pub fn run_sync(&self, adql: &str) -> Result<String, TapError> {
        let url = format!("{}/sync", self.url);
        let res = self
            .session
            .post(&url)
            .form(&[("LANG", "ADQL"), ("REQUEST", "doQuery"), ("QUERY", adql)])
            .send()
            .map_err(|err| HttpError::request(&url, err))?;
        Ok(response_text(res)?)
    }

    /// Creates an async job for `adql` and returns a handle on it.
    ///
    /// The job URL is the `Location` of the redirect when the server answers with one,
    /// otherwise the final URL of the response.
    pub fn submit_async(&self, adql: &str) -> Result<AsyncTapJob, TapError> {
        let url = format!("{}/async", self.url);
        let res = self
            .session
            .post(&url)
            .form(&[("LANG", "ADQL"), ("REQUEST", "doQuery"), ("QUERY", adql)])
            .send()
            .map_err(|err| HttpError::request(&url, err))?;
        let job_url = match res.headers().get(LOCATION).and_then(|l| l.to_str().ok()) {
            Some(location) => resolve_location(res.url(), location),
            None => error_for_status(res)?.url().to_string(),
        };
        debug!(job_url, "async TAP job created");
        Ok(AsyncTapJob::new(job_url, self.session.clone()))
    }
}

fn resolve_location(base: &url::Url, location: &str) -> String {
    base.join(location)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| location.to_string())
}

/// Handle on an existing async TAP job.
#[derive(Debug, Clone)]
pub struct AsyncTapJob {
    url: String,
    session: AuthenticatedSession,
}

impl AsyncTapJob {
    pub fn new(url: impl Into<String>, session: AuthenticatedSession) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current UWS phase, e.g. `EXECUTING` or `COMPLETED`.
    pub fn phase(&self) -> Result<String, TapError> {
        let body = self.get(&format!("{}/phase", self.url))?;
        Ok(body.trim().to_string())
    }

    pub fn result(&self) -> Result<String, TapError> {
        self.get(&format!("{}/results/result", self.url))
    }

    fn get(&self, url: &str) -> Result<String, TapError> {
        let res = self
            .session
            .get(url)
            .send()
            .map_err(|err| HttpError::request(url, err))?;
        Ok(response_text(res)?)
    }
}

#[derive(Debug, Clone)]
pub struct Sia2Service {
    url: String,
    session: AuthenticatedSession,
}

impl Sia2Service {
    pub fn new(url: impl Into<String>, session: AuthenticatedSession) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queries `<url>/query` with `params` and returns the VOTable text.
    pub fn search(&self, params: &[(&str, &str)]) -> Result<String, TapError> {
        let url = format!("{}/query", self.url);
        let res = self
            .session
            .get(&url)
            .query(params)
            .send()
            .map_err(|err| HttpError::request(&url, err))?;
        Ok(response_text(res)?)
    }
}

/// Builds TAP and SIA clients from a discovery document and dataset.
pub struct VoServices {
    discovery: Discovery,
    dataset: String,
}

impl Default for VoServices {
    fn default() -> Self {
        Self::new(Discovery::default(), DEFAULT_DATASET)
    }
}

impl VoServices {
    pub fn new(discovery: Discovery, dataset: impl Into<String>) -> Self {
        Self {
            discovery,
            dataset: dataset.into(),
        }
    }

    /// `obstap` is accepted as the former name of `live`.
    pub fn tap_service(&self, name: &str) -> Result<TapService, TapError> {
        let name = if name == "obstap" { "live" } else { name };
        if !TAP_SERVICES.contains(&name) {
            return Err(TapError::InvalidService(format!(
                "{name} is not a valid tap service"
            )));
        }
        let url = self.discovery.service_url(name, &self.dataset)?;
        Ok(TapService::new(url, self.session()?))
    }

    pub fn retrieve_query(&self, query_url: &str) -> Result<AsyncTapJob, TapError> {
        Ok(AsyncTapJob::new(query_url, self.session()?))
    }

    /// Only `staff` data is reachable from inside the Lab.
    pub fn siav2_service(&self, label: &str) -> Result<Sia2Service, TapError> {
        if label != "staff" {
            return Err(TapError::InvalidService(format!(
                "{label} data not available at your location"
            )));
        }
        let url = self.discovery.service_url("siav2", &self.dataset)?;
        Ok(Sia2Service::new(url, self.session()?))
    }

    /// Fetches the DataLink document at `url`, usually the access URL of an ObsCore record,
    /// and returns the VOTable text. The token is only sent if `url` belongs to a registered
    /// service such as `datalinker`.
    pub fn datalink(&self, url: &str) -> Result<String, TapError> {
        let session = self.session()?;
        debug!(url, authenticated = session.is_authenticated(url), "fetching DataLink result");
        let res = session
            .get(url)
            .send()
            .map_err(|err| HttpError::request(url, err))?;
        Ok(response_text(res)?)
    }

    fn session(&self) -> Result<AuthenticatedSession, HttpError> {
        AuthenticatedSession::from_discovery(&self.discovery, &self.dataset)
    }
}

pub fn get_tap_service(name: &str) -> Result<TapService, TapError> {
    VoServices::default().tap_service(name)
}

pub fn retrieve_query(query_url: &str) -> Result<AsyncTapJob, TapError> {
    VoServices::default().retrieve_query(query_url)
}

pub fn get_siav2_service(label: &str) -> Result<Sia2Service, TapError> {
    VoServices::default().siav2_service(label)
}

/// DataLink VOTable for the record whose data URL is `url`.
pub fn get_datalink_result(url: &str) -> Result<String, TapError> {
    VoServices::default().datalink(url)
}

#[deprecated(note = "use get_tap_service(\"tap\")")]
pub fn get_catalog() -> Result<TapService, TapError> {
    warn!(r#"get_catalog() is deprecated, use get_tap_service("tap")"#);
    get_tap_service("tap")
}

#[deprecated(note = "use get_tap_service(\"live\")")]
pub fn get_obstap_service() -> Result<TapService, TapError> {
    warn!(r#"get_obstap_service() is deprecated, use get_tap_service("live")"#);
    get_tap_service("live")
}

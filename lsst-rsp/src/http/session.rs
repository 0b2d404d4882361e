//! Bearer-token session scoped to a set of URL prefixes.
use super::HttpError;
use super::client::try_build_reqwest_client;
use super::config::HttpConfig;
use crate::discovery::{DEFAULT_DATASET, Discovery};
use crate::token::get_access_token;
use reqwest::blocking::{Client, RequestBuilder};
use tracing::{debug, warn};
use url::Url;

/// Services whose URLs receive the token in [AuthenticatedSession::from_discovery].
pub const AUTHENTICATED_SERVICES: &[&str] = &["tap", "live", "ssotap", "siav2", "datalinker"];

/// HTTP session that only sends its token to registered URL prefixes.
///
/// Requests to anything else go out unauthenticated, so the token never leaks to third-party
/// hosts a VO response might point to. A URL matches a prefix when scheme, host and port are
/// equal and its path is the prefix path or lies below it.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    client: Client,
    token: String,
    prefixes: Vec<Url>,
}

impl AuthenticatedSession {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            prefixes: Vec::new(),
        }
    }

    /// Session using the current access token, registered for every authenticated service
    /// that discovery resolves for `dataset`. Services that cannot be resolved are skipped.
    pub fn from_discovery(discovery: &Discovery, dataset: &str) -> Result<Self, HttpError> {
        let client = try_build_reqwest_client(HttpConfig::default())?;
        let mut session = Self::new(client, get_access_token(None));
        for service in AUTHENTICATED_SERVICES {
            match discovery.service_url(service, dataset) {
                Ok(url) => session.register(url),
                Err(err) => debug!(service, %err, "service not registered for authentication"),
            }
        }
        Ok(session)
    }

    /// Session for the default discovery document and dataset.
    pub fn try_default() -> Result<Self, HttpError> {
        Self::from_discovery(&Discovery::default(), DEFAULT_DATASET)
    }

    /// Prefixes that are not absolute URLs are ignored.
    pub fn register(&mut self, prefix: impl AsRef<str>) {
        match Url::parse(prefix.as_ref()) {
            Ok(url) => self.prefixes.push(url),
            Err(err) => warn!(prefix = prefix.as_ref(), %err, "invalid URL prefix not registered"),
        }
    }

    pub fn is_authenticated(&self, url: &str) -> bool {
        if self.token.is_empty() {
            return false;
        }
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        self.prefixes.iter().any(|prefix| is_below(&url, prefix))
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.authenticate(url, self.client.get(url))
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.authenticate(url, self.client.post(url))
    }

    fn authenticate(&self, url: &str, builder: RequestBuilder) -> RequestBuilder {
        if self.is_authenticated(url) {
            builder.bearer_auth(&self.token)
        } else {
            builder
        }
    }
}

fn is_below(url: &Url, prefix: &Url) -> bool {
    if url.scheme() != prefix.scheme()
        || url.host_str() != prefix.host_str()
        || url.port_or_known_default() != prefix.port_or_known_default()
    {
        return false;
    }
    let base = prefix.path().trim_end_matches('/');
    match url.path().strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

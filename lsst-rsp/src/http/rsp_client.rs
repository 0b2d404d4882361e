//! Client for other services running in the same RSP instance.
use super::client::try_build_reqwest_client_with_headers;
use super::config::HttpConfig;
use super::{HttpError, response_json};
use crate::defaults::{INSTANCE_URL_PATH, SECRET_TOKEN_PATH};
use crate::token::runtime_mounts_dir;
use ::fs::LocalFile;
use ::fs::file::reader::FileReader;
use reqwest::blocking::{Client, Response};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum RspClientError {
    #[error("could not read `{path}`: {err}")]
    Read { path: PathBuf, err: io::Error },
    #[error("{0}")]
    Http(#[from] HttpError),
}

/// Client configured with the Lab's token and the instance URL.
pub struct RspClient {
    client: Client,
    base_url: String,
}

impl RspClient {
    /// Builds a client for `service_endpoint` using the default runtime mounts directory.
    pub fn new(service_endpoint: &str) -> Result<Self, RspClientError> {
        Self::with_jupyterlab_dir(service_endpoint, &runtime_mounts_dir())
    }

    #[instrument(skip_all, fields(dir = %jupyterlab_dir.display()))]
    pub fn with_jupyterlab_dir(
        service_endpoint: &str,
        jupyterlab_dir: &Path,
    ) -> Result<Self, RspClientError> {
        let token = read_trimmed(&jupyterlab_dir.join(SECRET_TOKEN_PATH))?;
        let instance_url = read_trimmed(&jupyterlab_dir.join(INSTANCE_URL_PATH))?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|err| HttpError::InvalidHeader(err.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = try_build_reqwest_client_with_headers(HttpConfig::default(), headers)
            .map_err(HttpError::from)?;
        Ok(Self {
            client,
            base_url: join_base_url(&instance_url, service_endpoint),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        join_base_url(&self.base_url, path)
    }

    pub fn get(&self, path: &str) -> Result<Response, HttpError> {
        let url = self.url(path);
        self.client
            .get(&url)
            .send()
            .map_err(|err| HttpError::request(&url, err))
    }

    pub fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, HttpError> {
        let url = self.url(path);
        self.client
            .post(&url)
            .json(body)
            .send()
            .map_err(|err| HttpError::request(&url, err))
    }

    /// GET `path` and deserialize the JSON answer.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        response_json(self.get(path)?)
    }
}

fn read_trimmed(path: &Path) -> Result<String, RspClientError> {
    LocalFile
        .read(path)
        .map(|content| content.trim().to_string())
        .map_err(|err| RspClientError::Read {
            path: path.to_path_buf(),
            err,
        })
}

/// Joins two URL parts, inserting `/` only when neither side provides one.
fn join_base_url(base: &str, endpoint: &str) -> String {
    if endpoint.is_empty() || base.ends_with('/') || endpoint.starts_with('/') {
        format!("{base}{endpoint}")
    } else {
        format!("{base}/{endpoint}")
    }
}

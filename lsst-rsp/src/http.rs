//! Blocking HTTP helpers shared by discovery, the TAP clients and the RSP client.
pub mod client;
pub mod config;
pub mod rsp_client;
pub mod session;

use client::ReqwestBuildError;
use reqwest::blocking::Response;

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("{0}")]
    Build(#[from] ReqwestBuildError),
    #[error("request to `{url}` failed: {err}")]
    Request { url: String, err: String },
    #[error("request to `{url}` returned status {status}")]
    Status { url: String, status: u16, body: String },
    #[error("could not read response body from `{url}`: {err}")]
    Body { url: String, err: String },
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl HttpError {
    pub(crate) fn request(url: &str, err: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            err: err.to_string(),
        }
    }
}

/// Turns a non-success response into [HttpError::Status], keeping the body for diagnostics.
pub fn error_for_status(res: Response) -> Result<Response, HttpError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let url = res.url().to_string();
    let body = res.text().unwrap_or_default();
    Err(HttpError::Status {
        url,
        status: status.as_u16(),
        body,
    })
}

/// Reads the body as text, failing on non-success statuses.
pub fn response_text(res: Response) -> Result<String, HttpError> {
    let res = error_for_status(res)?;
    let url = res.url().to_string();
    res.text().map_err(|err| HttpError::Body {
        url,
        err: err.to_string(),
    })
}

/// Deserializes a JSON body, failing on non-success statuses.
pub fn response_json<T: serde::de::DeserializeOwned>(res: Response) -> Result<T, HttpError> {
    let res = error_for_status(res)?;
    let url = res.url().to_string();
    res.json().map_err(|err| HttpError::Body {
        url,
        err: err.to_string(),
    })
}

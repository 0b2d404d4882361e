//! # Helpers to build a reqwest blocking client
use super::config::HttpConfig;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ReqwestBuildError {
    #[error("could not build the reqwest client: {0}")]
    ClientBuilder(String),
}

/// Builds a reqwest blocking client according to the provided configuration.
pub fn try_build_reqwest_client(config: HttpConfig) -> Result<Client, ReqwestBuildError> {
    try_build_reqwest_client_with_headers(config, HeaderMap::new())
}

/// Same as [try_build_reqwest_client] but every request carries `headers`.
pub fn try_build_reqwest_client_with_headers(
    config: HttpConfig,
    headers: HeaderMap,
) -> Result<Client, ReqwestBuildError> {
    let policy = match config.max_redirects {
        0 => Policy::none(),
        n => Policy::limited(n),
    };
    reqwest_builder_with_timeout(config.timeout, config.conn_timeout)
        .redirect(policy)
        .default_headers(headers)
        .build()
        .map_err(|err| ReqwestBuildError::ClientBuilder(err.to_string()))
}

/// Returns a reqwest [ClientBuilder] with the default setup and the provided timeout values.
pub fn reqwest_builder_with_timeout(timeout: Duration, conn_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .use_rustls_tls() // Use rust-tls backend
        .tls_built_in_native_certs(true) // Load system (native) certificates
        .timeout(timeout)
        .connect_timeout(conn_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use httpmock::MockServer;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_default_headers_are_sent() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.path("/hello").header("x-test", "yes");
            then.status(200).body("hi");
        });
        let mut headers = HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("yes"));

        let client =
            try_build_reqwest_client_with_headers(HttpConfig::default(), headers).unwrap();
        let resp = client.get(server.url("/hello")).send().unwrap();

        assert_eq!(resp.status(), StatusCode::OK.as_u16());
        mock.assert();
    }

    #[test]
    fn test_redirects_can_be_disabled() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/from");
            then.status(303).header("Location", "/to");
        });
        let client = try_build_reqwest_client(HttpConfig::default().without_redirects()).unwrap();

        let resp = client.get(server.url("/from")).send().unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER.as_u16());
        assert_eq!(resp.headers()["location"], "/to");
    }
}

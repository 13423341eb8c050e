use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde_json::Value;

use crate::config::Config;
use crate::error::Error;

/// User agent reported on every request.
pub const USER_AGENT: &str = concat!("moderyo-rs/", env!("CARGO_PKG_VERSION"));

/// A completed HTTP attempt, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Raw `Retry-After` header, when the service sent one.
    pub retry_after: Option<String>,
    pub body: String,
}

/// Seam between the retry pipeline and the wire.
///
/// Implementations return `Err` only for transport-level failures
/// (connection refused, DNS failure, timeout) — always
/// [`Error::Connectivity`]. A response with any HTTP status is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, Error>;

    async fn get(&self, path: &str) -> Result<RawResponse, Error>;
}

/// `reqwest`-backed transport. The underlying connection pool is shared and
/// safe for concurrent use.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|_| {
                Error::InvalidConfiguration(
                    "API key contains characters that are not valid in an HTTP header".into(),
                )
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                Error::InvalidConfiguration(format!("failed to build HTTP client: {err}"))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn collect(response: reqwest::Response) -> Result<RawResponse, Error> {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(connectivity)?;
        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&'static str, String)],
    ) -> Result<RawResponse, Error> {
        let mut request = self.http.post(self.url(path)).json(body);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        let response = request.send().await.map_err(connectivity)?;
        Self::collect(response).await
    }

    async fn get(&self, path: &str) -> Result<RawResponse, Error> {
        let response = self.http.get(self.url(path)).send().await.map_err(connectivity)?;
        Self::collect(response).await
    }
}

fn connectivity(err: reqwest::Error) -> Error {
    Error::Connectivity {
        message: err.to_string(),
    }
}

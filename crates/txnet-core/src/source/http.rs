use std::num::NonZeroU32;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{ChainServiceError, CoreError};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Outbound HTTP settings shared by every chain data source.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Per-source cap on outbound requests; `None` disables limiting.
    pub requests_per_second: Option<u32>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            requests_per_second: None,
        }
    }
}

/// JSON-over-HTTP GET client with optional request-rate limiting.
pub(super) struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    limiter: Option<DirectRateLimiter>,
}

impl HttpClient {
    pub(super) fn new(base_url: &str, config: &HttpConfig) -> Result<Self, CoreError> {
        let base_url = parse_base_url(base_url)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CoreError::Configuration(format!("build HTTP client: {e}")))?;

        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::Configuration("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        Ok(Self {
            client,
            base_url,
            limiter,
        })
    }

    /// `base_url` joined with `path` (which may be empty).
    pub(super) fn url(&self, path: &str) -> Result<Url, ChainServiceError> {
        if path.is_empty() {
            return Ok(self.base_url.clone());
        }
        self.base_url
            .join(path)
            .map_err(|e| ChainServiceError::InvalidResponse(format!("build request URL: {e}")))
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// Query values are never logged since they may carry API keys.
    pub(super) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, ChainServiceError> {
        self.wait_for_rate_limit().await;
        debug!(http.path = url.path(), "chain source request");

        let response = self.client.get(url.clone()).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(http.path = url.path(), %status, body_len = body.len(), "chain source response");
        trace!(http.path = url.path(), body = %body, "chain source response body");

        if !status.is_success() {
            return Err(ChainServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            ChainServiceError::InvalidResponse(format!("decode JSON response: {e}; body={body}"))
        })
    }
}

/// Validate a data source base URL. A trailing slash is added so relative
/// paths join underneath it instead of replacing the last segment.
pub(super) fn parse_base_url(raw: &str) -> Result<Url, CoreError> {
    let mut normalized = raw.trim().to_owned();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    let parsed = Url::parse(&normalized).map_err(|e| {
        CoreError::Configuration(format!("invalid base URL `{raw}`: expected HTTP(S) URL ({e})"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CoreError::Configuration(format!(
            "unsupported base URL scheme `{other}`; expected http or https"
        ))),
    }
}

/// Reject a missing or blank API key at construction time.
pub(super) fn require_api_key(key: Option<&str>, env_name: &str) -> Result<String, CoreError> {
    match key.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_owned()),
        _ => Err(CoreError::Configuration(format!(
            "{env_name} is required but was not provided"
        ))),
    }
}

//! Screeps HTTP API client
//!
//! Thin wrapper over a pooled `reqwest::Client` covering the two endpoints the
//! exporter needs: sign-in and memory reads.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::target::Target;
use crate::config::{ConfigError, HttpConfig};
use crate::error::{AuthError, FetchError};

/// Header carrying the API token
pub const TOKEN_HEADER: &str = "X-Token";
/// Header disambiguating users on private servers
pub const USERNAME_HEADER: &str = "X-Username";
/// Remaining requests in the current rate-limit window
pub const RATE_LIMIT_REMAINING_HEADER: &str = "X-Ratelimit-Remaining";

/// Screeps API client shared by all targets of a collector
#[derive(Clone)]
pub struct ScreepsClient {
    client: Client,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SignInResponse {
    #[serde(default)]
    token: Option<String>,
}

/// Rate-limit headers of one memory response
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimit {
    /// `X-Ratelimit-Remaining`
    pub remaining: Option<f64>,
    /// `Retry-After`, in seconds
    pub reset: Option<f64>,
}

impl RateLimit {
    /// Read both headers; unparseable values are logged and skipped
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            remaining: parse_header(headers, RATE_LIMIT_REMAINING_HEADER),
            reset: parse_header(headers, RETRY_AFTER.as_str()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_none() && self.reset.is_none()
    }
}

fn parse_header(headers: &HeaderMap, name: &str) -> Option<f64> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(header = name, value = raw, error = %e, "Ignoring unparseable rate-limit header");
            None
        }
    }
}

/// Raw memory response, before status classification
#[derive(Debug, Clone)]
pub struct MemoryResponse {
    pub status: StatusCode,
    pub rate_limit: RateLimit,
    pub body: String,
}

impl MemoryResponse {
    /// Classify the status and hand out the body on 200
    pub fn into_payload(self) -> Result<String, FetchError> {
        match self.status {
            StatusCode::OK => Ok(self.body),
            StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited {
                retry_after: self.rate_limit.reset,
            }),
            status => Err(FetchError::UpstreamError {
                status: status.as_u16(),
                body: self.body,
            }),
        }
    }
}

impl ScreepsClient {
    /// Create a client with the given request timeout
    pub fn new(timeout_ms: u64) -> Result<Self, reqwest::Error> {
        Self::build(timeout_ms, &HttpConfig::default().user_agent)
    }

    /// Create a client from the `http` config section
    pub fn from_config(config: &HttpConfig) -> Result<Self, ConfigError> {
        Self::build(config.timeout_ms, &config.user_agent).map_err(ConfigError::HttpClient)
    }

    /// Wrap an existing `reqwest::Client`
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(timeout_ms: u64, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client })
    }

    /// Exchange username/password for a token
    #[instrument(skip(self, password), fields(url = %url))]
    pub async fn sign_in(
        &self,
        url: &Url,
        username: &str,
        password: &str,
    ) -> Result<String, AuthError> {
        let response = self
            .client
            .post(url.clone())
            .json(&SignInRequest {
                email: username,
                password,
            })
            .send()
            .await
            .map_err(AuthError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(AuthError::Transport)?;

        if !status.is_success() {
            return Err(AuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SignInResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AuthError::InvalidResponse(
                "response carries no token".to_string(),
            )),
        }
    }

    /// Read the target's memory path with the given token
    ///
    /// Only transport failures are errors here; status classification is left
    /// to [`MemoryResponse::into_payload`] so the rate-limit headers survive
    /// error statuses.
    #[instrument(skip(self, target, token), fields(target = %target.name(), url = %target.memory_url()))]
    pub async fn read_memory(
        &self,
        target: &Target,
        token: &str,
    ) -> Result<MemoryResponse, FetchError> {
        let mut req = self
            .client
            .get(target.memory_url().clone())
            .header(TOKEN_HEADER, token);

        if let Some(username) = target.username() {
            req = req.header(USERNAME_HEADER, username);
        }

        let response = req.send().await.map_err(FetchError::Transport)?;

        let status = response.status();
        let rate_limit = RateLimit::from_headers(response.headers());
        let body = response.text().await.map_err(FetchError::Transport)?;

        debug!(status = status.as_u16(), bytes = body.len(), "Memory response received");

        Ok(MemoryResponse {
            status,
            rate_limit,
            body,
        })
    }
}

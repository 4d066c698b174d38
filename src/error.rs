//! Error types for screeps-exporter
//!
//! Configuration errors live in [`crate::config`]. Everything else that can go
//! wrong while scraping a single target is defined here. All scrape errors are
//! recoverable: they are logged and the target contributes no samples for the
//! current cycle.

use std::fmt;

use thiserror::Error;

/// Sign-in failures for username/password targets
#[derive(Error, Debug)]
pub enum AuthError {
    /// The sign-in request never produced a response
    #[error("sign-in request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The sign-in endpoint answered with a non-2xx status
    #[error("sign-in rejected with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The sign-in response body did not contain a token
    #[error("invalid sign-in response: {0}")]
    InvalidResponse(String),
}

/// Outcome of a memory fetch that did not yield a payload
#[derive(Error, Debug)]
pub enum FetchError {
    /// 401: the token was rejected
    #[error("unauthorized: token rejected by upstream")]
    Unauthorized,

    /// 429: the upstream rate limit was hit
    #[error("rate limited by upstream{}", .retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<f64> },

    /// Any other non-2xx status
    #[error("upstream error status {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// Connection refused, timeout, unreadable response
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl FetchError {
    /// HTTP status carried by the error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::Unauthorized => Some(401),
            FetchError::RateLimited { .. } => Some(429),
            FetchError::UpstreamError { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }

    /// Whether the underlying request timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(e) if e.is_timeout())
    }
}

/// Stage of the payload decode chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// Outer `{ok, data}` JSON envelope
    Envelope,
    /// Base64 layer
    Base64,
    /// Gzip layer
    Gzip,
    /// Inner JSON metric array
    Json,
}

impl DecodeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodeStage::Envelope => "envelope",
            DecodeStage::Base64 => "base64",
            DecodeStage::Gzip => "gzip",
            DecodeStage::Json => "json",
        }
    }
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload decode failure, tagged with the stage that failed
#[derive(Error, Debug)]
#[error("decode failed at stage {stage}: {message}")]
pub struct DecodeError {
    pub stage: DecodeStage,
    pub message: String,
}

impl DecodeError {
    pub fn new(stage: DecodeStage, message: impl fmt::Display) -> Self {
        Self {
            stage,
            message: message.to_string(),
        }
    }
}

/// Any failure of one target's pipeline
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

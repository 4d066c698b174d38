//! Credential handling for Screeps targets
//!
//! Public-server targets use a static API token. Private servers only hand out
//! short-lived tokens (about 60 seconds) through a username/password sign-in,
//! so those targets cache the token and sign in again once the upstream
//! rejects it.

use std::fmt;

use tokio::sync::Mutex;
use tracing::{info, warn};
use url::Url;

use super::client::ScreepsClient;
use crate::error::AuthError;

/// How a target authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Static API token
    Token,
    /// Sign-in with username and password
    UsernamePassword,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Token => "token",
            AuthMode::UsernamePassword => "username-password",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured credentials of a target
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    UsernamePassword { username: String, password: String },
}

impl Credentials {
    pub fn mode(&self) -> AuthMode {
        match self {
            Credentials::Token(_) => AuthMode::Token,
            Credentials::UsernamePassword { .. } => AuthMode::UsernamePassword,
        }
    }

    /// Username sent alongside the token, only for username/password targets
    pub fn username(&self) -> Option<&str> {
        match self {
            Credentials::Token(_) => None,
            Credentials::UsernamePassword { username, .. } => Some(username),
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
            Credentials::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Auth state of one target: credentials plus the cached sign-in token
///
/// The cache is only ever filled by a successful sign-in and only ever
/// emptied by [`AuthState::invalidate`]. The lock is held across the sign-in
/// call so overlapping scrapes of the same target share a single sign-in.
#[derive(Debug)]
pub struct AuthState {
    credentials: Credentials,
    cached: Mutex<Option<String>>,
}

impl AuthState {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.credentials.mode()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Return a token usable for a memory request, signing in if needed
    pub async fn ensure_authenticated(
        &self,
        client: &ScreepsClient,
        signin_url: &Url,
    ) -> Result<String, AuthError> {
        let (username, password) = match &self.credentials {
            Credentials::Token(token) => return Ok(token.clone()),
            Credentials::UsernamePassword { username, password } => (username, password),
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        info!(url = %signin_url, "Getting token");
        let token = client.sign_in(signin_url, username, password).await?;
        info!(url = %signin_url, "Got token for username and password");

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token if it is still the one the upstream rejected
    ///
    /// Returns `true` when the cache was cleared. Static tokens are never
    /// cleared.
    pub async fn invalidate(&self, rejected: &str) -> bool {
        if self.mode() == AuthMode::Token {
            warn!("Configured token was rejected by the server");
            return false;
        }

        let mut cached = self.cached.lock().await;
        if cached.as_deref() == Some(rejected) {
            warn!("Token invalid, clearing");
            *cached = None;
            true
        } else {
            false
        }
    }

    /// Currently cached sign-in token
    pub async fn cached_token(&self) -> Option<String> {
        self.cached.lock().await.clone()
    }
}

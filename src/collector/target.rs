//! Scrape targets
//!
//! A [`Target`] is one (server, shard, memory path) triple together with its
//! credentials. Targets are built once at startup and live for the whole
//! process; only the cached sign-in token inside changes.

use url::Url;

use super::auth::{AuthMode, AuthState, Credentials};
use super::client::ScreepsClient;
use crate::config::{ConfigError, ServerEntry, DEFAULT_HOST};
use crate::error::AuthError;

/// One configured Screeps endpoint to scrape
#[derive(Debug)]
pub struct Target {
    name: String,
    host: String,
    shard: String,
    path: String,
    override_shard_name: Option<String>,
    auth: AuthState,
    memory_url: Url,
    signin_url: Url,
}

impl Target {
    /// Start building a target with the given display name
    pub fn builder(name: impl Into<String>) -> TargetBuilder {
        TargetBuilder::new(name)
    }

    /// Build a target from a config entry, named after the entry
    ///
    /// A non-empty token wins over username/password.
    pub fn from_entry(entry: &ServerEntry) -> Result<Self, ConfigError> {
        Self::from_entry_named(entry, &entry.name)
    }

    /// Build a target from a config entry under a different display name
    ///
    /// Used when several entries share a name; see [`crate::config::server_labels`].
    pub fn from_entry_named(entry: &ServerEntry, name: &str) -> Result<Self, ConfigError> {
        let mut builder = Self::builder(name).host(entry.host_or_default());

        if let Some(shard) = &entry.shard {
            builder = builder.shard(shard);
        }
        if let Some(path) = &entry.path {
            builder = builder.path(path);
        }
        if let Some(name) = entry.override_shard_name.as_deref().filter(|n| !n.is_empty()) {
            builder = builder.override_shard_name(name);
        }
        if let Some(token) = &entry.token {
            builder = builder.token(token);
        }
        if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
            builder = builder.user_pass(username, password);
        }

        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn override_shard_name(&self) -> Option<&str> {
        self.override_shard_name.as_deref()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth.mode()
    }

    /// Username sent as `X-Username`, only for username/password targets
    pub fn username(&self) -> Option<&str> {
        self.auth.credentials().username()
    }

    /// `{host}/api/user/memory?shard=..&path=..`
    pub fn memory_url(&self) -> &Url {
        &self.memory_url
    }

    /// `{host}/api/auth/signin`
    pub fn signin_url(&self) -> &Url {
        &self.signin_url
    }

    /// Token for the next memory request, signing in first when needed
    pub async fn ensure_authenticated(&self, client: &ScreepsClient) -> Result<String, AuthError> {
        self.auth.ensure_authenticated(client, &self.signin_url).await
    }

    /// Forget `rejected` so the next scrape signs in again
    pub async fn invalidate_token(&self, rejected: &str) -> bool {
        self.auth.invalidate(rejected).await
    }

    /// Currently cached sign-in token, if any
    pub async fn cached_token(&self) -> Option<String> {
        self.auth.cached_token().await
    }
}

/// Builder for [`Target`]
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    name: String,
    host: String,
    shard: String,
    path: String,
    override_shard_name: Option<String>,
    token: Option<String>,
    user_pass: Option<(String, String)>,
}

impl TargetBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: DEFAULT_HOST.to_string(),
            shard: String::new(),
            path: String::new(),
            override_shard_name: None,
            token: None,
            user_pass: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn shard(mut self, shard: impl Into<String>) -> Self {
        self.shard = shard.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn override_shard_name(mut self, name: impl Into<String>) -> Self {
        self.override_shard_name = Some(name.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn user_pass(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_pass = Some((username.into(), password.into()));
        self
    }

    /// Validate credentials and URLs and build the target
    pub fn build(self) -> Result<Target, ConfigError> {
        let credentials = self.credentials()?;

        let base = Url::parse(&format!("{}/", self.host)).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid host '{}' for server '{}': {}",
                self.host, self.name, e
            ))
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "Host '{}' for server '{}' must be an http(s) URL",
                self.host, self.name
            )));
        }

        let join = |segment: &str| {
            base.join(segment).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid URL for server '{}': {}", self.name, e))
            })
        };

        let mut memory_url = join("api/user/memory")?;
        {
            let mut query = memory_url.query_pairs_mut();
            // An empty shard means no shard query at all.
            if !self.shard.is_empty() {
                query.append_pair("shard", &self.shard);
            }
            query.append_pair("path", &self.path);
        }
        let signin_url = join("api/auth/signin")?;

        Ok(Target {
            name: self.name,
            host: self.host,
            shard: self.shard,
            path: self.path,
            override_shard_name: self.override_shard_name,
            auth: AuthState::new(credentials),
            memory_url,
            signin_url,
        })
    }

    fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token.clone()));
        }

        match &self.user_pass {
            Some((username, password)) if !username.is_empty() && !password.is_empty() => {
                Ok(Credentials::UsernamePassword {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            _ => Err(ConfigError::MissingCredentials(self.name.clone())),
        }
    }
}

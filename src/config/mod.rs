use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{AuthError, AuthResult};

// Default configuration values
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:17563/auth/callback";
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitch.tv/helix";
pub const TWITCH_AUTHORIZATION_URL: &str = "https://id.twitch.tv/oauth2/authorize";
pub const TWITCH_REVOCATION_URL: &str = "https://id.twitch.tv/oauth2/revoke";
pub const DEFAULT_SCOPES: &[&str] = &["openid", "user:read:email", "user:read:follows"];

// Environment variables
pub const CLIENT_ID_ENV: &str = "CLIENT_ID";
pub const TWITCH_CLIENT_ID_ENV: &str = "TWITCH_CLIENT_ID";
const REDIRECT_URI_ENV: &str = "STREAMDATA_REDIRECT_URI";
const SCOPES_ENV: &str = "STREAMDATA_SCOPES";
const FORCE_VERIFY_ENV: &str = "STREAMDATA_FORCE_VERIFY";
const API_BASE_URL_ENV: &str = "STREAMDATA_API_BASE_URL";

/// Configuration for the Twitch sign-in session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth client identifier registered with Twitch
    pub client_id: String,
    /// Redirect URI registered for the client
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Scopes requested during authorization
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Whether Twitch should re-prompt the user even if already authorized
    #[serde(default = "default_force_verify")]
    pub force_verify: bool,
    /// Base URL of the Helix API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Authorization endpoint
    #[serde(default = "default_authorization_endpoint")]
    pub authorization_endpoint: String,
    /// Token revocation endpoint
    #[serde(default = "default_revocation_endpoint")]
    pub revocation_endpoint: String,
}

// Default functions
fn default_redirect_uri() -> String {
    std::env::var(REDIRECT_URI_ENV)
        .ok()
        .filter(|val| !val.is_empty())
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
}

fn default_scopes() -> Vec<String> {
    match std::env::var(SCOPES_ENV) {
        Ok(val) if !val.trim().is_empty() => val.split_whitespace().map(str::to_string).collect(),
        _ => DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_force_verify() -> bool {
    std::env::var(FORCE_VERIFY_ENV)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(true)
}

fn default_api_base_url() -> String {
    std::env::var(API_BASE_URL_ENV)
        .ok()
        .filter(|val| !val.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
}

fn default_authorization_endpoint() -> String {
    TWITCH_AUTHORIZATION_URL.to_string()
}

fn default_revocation_endpoint() -> String {
    TWITCH_REVOCATION_URL.to_string()
}

impl AuthConfig {
    /// Create a configuration for the given client ID with the built-in defaults.
    /// Does not read the environment; see [`AuthConfig::from_env`].
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            force_verify: true,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            authorization_endpoint: default_authorization_endpoint(),
            revocation_endpoint: default_revocation_endpoint(),
        }
    }

    /// Load configuration from the process environment, applying `STREAMDATA_*` overrides
    pub fn from_env() -> AuthResult<Self> {
        let client_id = [CLIENT_ID_ENV, TWITCH_CLIENT_ID_ENV]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|val| !val.is_empty()))
            .ok_or_else(|| {
                AuthError::ConfigMissing(format!(
                    "{} environment variable not set",
                    CLIENT_ID_ENV
                ))
            })?;

        let config = Self {
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            force_verify: default_force_verify(),
            api_base_url: default_api_base_url(),
            ..Self::new(client_id)
        };
        debug!(
            redirect_uri = %config.redirect_uri,
            scopes = ?config.scopes,
            "Loaded auth configuration from environment"
        );
        Ok(config)
    }

    /// Set the redirect URI
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Set the API base URL
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Set the revocation endpoint
    pub fn with_revocation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.revocation_endpoint = endpoint.into();
        self
    }

    /// Set the requested scopes
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration for values that can never work
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::ConfigInvalid("client_id is empty".to_string()));
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("api_base_url", &self.api_base_url),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("revocation_endpoint", &self.revocation_endpoint),
        ] {
            Url::parse(value)
                .map_err(|e| AuthError::ConfigInvalid(format!("{} '{}': {}", name, value, e)))?;
        }

        Ok(())
    }
}

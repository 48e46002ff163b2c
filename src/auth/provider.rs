use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::{form_urlencoded, Url};

use super::user::{User, UsersResponse};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::http_client::{ApiClient, HttpClient};

const RESPONSE_TYPE: &str = "token";
const USERS_PATH: &str = "/users";

/// Twitch identity provider endpoints used by the session
pub struct TwitchProvider {
    http: Arc<dyn HttpClient>,
    client_id: String,
    redirect_uri: String,
    scopes: Vec<String>,
    force_verify: bool,
    authorization_endpoint: String,
    revocation_endpoint: String,
}

impl TwitchProvider {
    /// Create a new Twitch provider
    pub fn new(config: &AuthConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            force_verify: config.force_verify,
            authorization_endpoint: config.authorization_endpoint.clone(),
            revocation_endpoint: config.revocation_endpoint.clone(),
        }
    }

    /// Build the implicit-grant authorization URL for a state nonce
    pub fn authorization_url(&self, state: &str) -> AuthResult<String> {
        let mut url = Url::parse(&self.authorization_endpoint).map_err(|e| {
            AuthError::ConfigInvalid(format!("authorization_endpoint: {}", e))
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("force_verify", if self.force_verify { "true" } else { "false" })
            .append_pair("state", state);

        Ok(url.into())
    }

    /// Revoke an access token
    pub async fn revoke_token(&self, token: &str) -> AuthResult<()> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.client_id)
            .append_pair("token", token)
            .finish();

        let mut headers = HashMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let response = self
            .http
            .post(&self.revocation_endpoint, headers, body)
            .await
            .map_err(|e| AuthError::Http(format!("{:#}", e)))?;

        if !response.is_success() {
            return Err(AuthError::ApiStatus {
                url: self.revocation_endpoint.clone(),
                status: response.status(),
                body: response.body().to_string(),
            });
        }

        debug!("Successfully revoked Twitch token");
        Ok(())
    }

    /// Fetch the profile of the user the API client is authorized as
    pub async fn fetch_current_user(&self, api: &ApiClient) -> AuthResult<User> {
        let response = api.get(USERS_PATH).await?;

        if !response.is_success() {
            return Err(AuthError::ApiStatus {
                url: api.url_for(USERS_PATH),
                status: response.status(),
                body: response.body().to_string(),
            });
        }

        let users: UsersResponse = response
            .json()
            .map_err(|e| AuthError::InvalidResponse(format!("users response: {}", e)))?;

        let user = users.data.into_iter().next().ok_or_else(|| {
            AuthError::InvalidResponse("users response contained no users".to_string())
        })?;

        debug!(user_id = user.id, display_name = %user.display_name, "Fetched Twitch user");
        Ok(user)
    }
}

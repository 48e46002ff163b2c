//! Shared helpers for session integration tests

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use streamdata_lib::{
    ApiClient, AuthConfig, AuthPrompt, AuthSession, HttpClient, PromptResult, ReqwestHttpClient,
};

pub const TEST_CLIENT_ID: &str = "test_client_id";
pub const TEST_STATE: &str = "abc123";

/// Prompt that answers with a fixed redirect, echoing the request's state unless told otherwise
pub struct RedirectPrompt {
    access_token: Option<String>,
    state_override: Option<String>,
    urls: Mutex<Vec<String>>,
}

impl RedirectPrompt {
    pub fn approving(access_token: &str) -> Self {
        Self {
            access_token: Some(access_token.to_string()),
            state_override: None,
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state_override = Some(state.to_string());
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthPrompt for RedirectPrompt {
    async fn start(&self, auth_url: &str, _return_url: &str) -> Result<PromptResult> {
        self.urls.lock().unwrap().push(auth_url.to_string());

        let requested_state = Url::parse(auth_url)?
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();

        let mut params = vec![
            ("state".to_string(), self.state_override.clone().unwrap_or(requested_state)),
            ("token_type".to_string(), "bearer".to_string()),
        ];
        if let Some(token) = &self.access_token {
            params.push(("access_token".to_string(), token.clone()));
        }

        Ok(PromptResult::Success {
            params: params.into_iter().collect(),
        })
    }
}

/// Build a session talking to the mock server with the real reqwest transport
pub fn session_for(server_url: &str, prompt: Arc<dyn AuthPrompt>) -> AuthSession {
    let config = AuthConfig::new(TEST_CLIENT_ID)
        .with_api_base_url(server_url)
        .with_revocation_endpoint(format!("{}/oauth2/revoke", server_url))
        .with_redirect_uri("http://localhost:17563/auth/callback");

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let api = Arc::new(ApiClient::new(server_url, http));

    AuthSession::new(config, api, prompt)
        .expect("valid test configuration")
        .with_state_generator(|| TEST_STATE.to_string())
}

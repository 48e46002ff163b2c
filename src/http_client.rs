use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Header carrying the bearer token
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Header carrying the OAuth client identifier
pub const CLIENT_ID_HEADER: &str = "Client-Id";

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
}

/// Response data returned by an [`HttpClient`]
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    status_code: u16,
    body: String,
}

impl SimpleHttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Trait for HTTP client operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform HTTP GET request
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse>;

    /// Perform HTTP POST request
    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse>;
}

/// Implementation of HttpClient using reqwest
#[derive(Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        &self,
        mut request: reqwest::RequestBuilder,
        headers: HashMap<String, String>,
    ) -> Result<SimpleHttpResponse> {
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(SimpleHttpResponse::new(status, body))
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse> {
        self.send(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse> {
        self.send(self.client.post(url).body(body), headers).await
    }
}

/// API client bound to a base URL, sending a set of default headers with every request.
///
/// The session owns one of these and keeps its `Authorization` header in step with the
/// token it holds.
pub struct ApiClient {
    base_url: String,
    http: Arc<dyn HttpClient>,
    default_headers: DashMap<String, String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            default_headers: DashMap::new(),
        }
    }

    /// Get the underlying transport
    pub fn http(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http)
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set a default header
    pub fn set_default_header(&self, name: &str, value: impl Into<String>) {
        self.default_headers.insert(name.to_string(), value.into());
    }

    /// Remove a default header, returning its previous value
    pub fn remove_default_header(&self, name: &str) -> Option<String> {
        self.default_headers.remove(name).map(|(_, value)| value)
    }

    /// Get the current value of a default header
    pub fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers.get(name).map(|value| value.clone())
    }

    /// Set the bearer token, or remove the authorization header when the token is empty
    pub fn set_bearer_token(&self, token: &str) {
        if token.is_empty() {
            self.remove_default_header(AUTHORIZATION_HEADER);
        } else {
            self.set_default_header(AUTHORIZATION_HEADER, format!("Bearer {}", token));
        }
    }

    /// Build the full URL for an API path
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET an API path with the default headers
    pub async fn get(&self, path: &str) -> AuthResult<SimpleHttpResponse> {
        let url = self.url_for(path);
        let headers = self
            .default_headers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        debug!(url = %url, "Sending API request");

        self.http
            .get(&url, headers)
            .await
            .map_err(|e| AuthError::Http(format!("{:#}", e)))
    }
}

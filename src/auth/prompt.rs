use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// Parameters returned by the provider on the redirect back to the app
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthParams(HashMap<String, String>);

impl AuthParams {
    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get("access_token")
    }

    pub fn state(&self) -> Option<&str> {
        self.get("state")
    }

    pub fn error(&self) -> Option<&str> {
        self.get("error")
    }

    pub fn error_description(&self) -> Option<&str> {
        self.get("error_description")
    }
}

impl From<HashMap<String, String>> for AuthParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(params)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AuthParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Outcome of an interactive authorization prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResult {
    /// The provider redirected back; the parameters may still carry an error
    Success { params: AuthParams },
    /// The user cancelled the prompt
    Cancel,
    /// The prompt was closed before the provider redirected back
    Dismiss,
}

impl PromptResult {
    /// Short name of the result kind
    pub fn kind(&self) -> &'static str {
        match self {
            PromptResult::Success { .. } => "success",
            PromptResult::Cancel => "cancel",
            PromptResult::Dismiss => "dismiss",
        }
    }
}

/// Interactive authorization prompt.
///
/// Opens `auth_url` for the user and resolves once the provider redirects to `return_url`
/// or the user gives up. Failing to run the prompt at all is reported through `Err`.
#[async_trait]
pub trait AuthPrompt: Send + Sync {
    async fn start(&self, auth_url: &str, return_url: &str) -> Result<PromptResult>;
}

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across the session API
pub type AuthResult<T> = Result<T, AuthError>;

/// Error codes for programmatic handling of auth failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Authorization errors
    AccessDenied,
    ProviderError,
    PromptFailed,

    // API errors
    ApiRequestFailed,
    ApiResponseInvalid,
    NetworkFailure,

    // Configuration errors
    ConfigMissing,
    ConfigInvalid,

    // Session errors
    OperationInProgress,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code_str = match self {
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::PromptFailed => "PROMPT_FAILED",
            ErrorCode::ApiRequestFailed => "API_REQUEST_FAILED",
            ErrorCode::ApiResponseInvalid => "API_RESPONSE_INVALID",
            ErrorCode::NetworkFailure => "NETWORK_FAILURE",
            ErrorCode::ConfigMissing => "CONFIG_MISSING",
            ErrorCode::ConfigInvalid => "CONFIG_INVALID",
            ErrorCode::OperationInProgress => "OPERATION_IN_PROGRESS",
        };
        write!(f, "{}", code_str)
    }
}

/// Serializable record of an error, carried by wrapped sign-in failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error code of the original failure
    pub code: ErrorCode,
    /// Human-readable message of the original failure
    pub message: String,
}

impl ErrorReport {
    /// Serialize the report to its JSON representation
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{}: {}", self.code, self.message))
    }
}

/// Errors raised by the auth session and its collaborators
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("access_denied")]
    AccessDenied,

    #[error("provider returned '{}'{}", .error, .description.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Provider {
        error: String,
        description: Option<String>,
    },

    #[error("request to {url} failed with HTTP {status}: {body}")]
    ApiStatus { url: String, status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network request failed: {0}")]
    Http(String),

    #[error("authorization prompt failed: {0}")]
    Prompt(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("another sign-in or sign-out is already in progress")]
    OperationInProgress,

    #[error("sign-in failed: {}", .0.to_json())]
    SignInFailed(ErrorReport),
}

impl AuthError {
    /// Get the error code, looking through wrapped sign-in failures
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::AccessDenied => ErrorCode::AccessDenied,
            AuthError::Provider { .. } => ErrorCode::ProviderError,
            AuthError::ApiStatus { .. } => ErrorCode::ApiRequestFailed,
            AuthError::InvalidResponse(_) => ErrorCode::ApiResponseInvalid,
            AuthError::Http(_) => ErrorCode::NetworkFailure,
            AuthError::Prompt(_) => ErrorCode::PromptFailed,
            AuthError::ConfigMissing(_) => ErrorCode::ConfigMissing,
            AuthError::ConfigInvalid(_) => ErrorCode::ConfigInvalid,
            AuthError::OperationInProgress => ErrorCode::OperationInProgress,
            AuthError::SignInFailed(report) => report.code,
        }
    }

    /// Build the serializable report for this error
    pub fn report(&self) -> ErrorReport {
        match self {
            AuthError::SignInFailed(report) => report.clone(),
            other => ErrorReport {
                code: other.code(),
                message: other.to_string(),
            },
        }
    }

    /// Wrap this error as a generic sign-in failure. Already wrapped errors are returned as-is.
    pub fn into_sign_in_failure(self) -> Self {
        match self {
            AuthError::SignInFailed(_) => self,
            other => AuthError::SignInFailed(other.report()),
        }
    }
}

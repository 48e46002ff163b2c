pub mod auth;
pub mod callback;
pub mod config;
pub mod error;
pub mod http_client;

// Re-export core components
pub use crate::auth::{
    AuthEvent, AuthParams, AuthPrompt, AuthSession, BrowserPrompt, PromptResult, SessionState,
    SignInOutcome, SignOutOutcome, User,
};
pub use crate::config::AuthConfig;
pub use crate::error::{AuthError, AuthResult, ErrorCode, ErrorReport};
pub use crate::http_client::{ApiClient, HttpClient, ReqwestHttpClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

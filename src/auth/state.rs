use chrono::{DateTime, Utc};
use serde::Serialize;

use super::user::User;

/// Authentication state shared with the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// The signed-in user, if any
    pub user: Option<User>,
    /// The access token, empty when signed out
    #[serde(skip_serializing)]
    pub token: String,
    /// A sign-in is in progress
    pub is_logging_in: bool,
    /// A sign-out is in progress
    pub is_logging_out: bool,
}

impl SessionState {
    /// Check whether a token is currently held
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Lifecycle events emitted by the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// The authorization prompt is about to open
    SignInStarted { at: DateTime<Utc> },

    /// The user signed in and the profile was loaded
    SignedIn { user: User, at: DateTime<Utc> },

    /// The user cancelled the prompt or denied access
    SignInDeclined { at: DateTime<Utc> },

    /// Sign-in failed
    SignInFailed { reason: String, at: DateTime<Utc> },

    /// Sign-out started
    SignOutStarted { at: DateTime<Utc> },

    /// Local session cleared; `revoked` tells whether the provider confirmed revocation
    SignedOut { revoked: bool, at: DateTime<Utc> },
}

impl AuthEvent {
    /// Short name of the event, used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::SignInStarted { .. } => "sign_in_started",
            AuthEvent::SignedIn { .. } => "signed_in",
            AuthEvent::SignInDeclined { .. } => "sign_in_declined",
            AuthEvent::SignInFailed { .. } => "sign_in_failed",
            AuthEvent::SignOutStarted { .. } => "sign_out_started",
            AuthEvent::SignedOut { .. } => "signed_out",
        }
    }
}

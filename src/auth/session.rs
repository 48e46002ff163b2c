use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use super::nonce::generate_state;
use super::prompt::{AuthPrompt, PromptResult};
use super::provider::TwitchProvider;
use super::state::{AuthEvent, SessionState};
use super::user::User;
use crate::callback::{CallbackId, CallbackRegistry};
use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::http_client::{ApiClient, CLIENT_ID_HEADER};

/// Error value Twitch returns when the user refuses authorization
const ACCESS_DENIED: &str = "access_denied";

type StateGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Result of a completed sign-in attempt
#[derive(Debug, Clone, PartialEq)]
pub enum SignInOutcome {
    /// The user signed in and the profile was loaded
    SignedIn(User),
    /// The user cancelled the prompt or denied access
    Declined,
}

/// Result of a sign-out attempt. The local session is cleared in every case except `Busy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutOutcome {
    /// The provider confirmed the token was revoked
    Revoked,
    /// Revocation failed; the session was cleared locally anyway
    RevocationFailed,
    /// No token was held, so nothing was revoked
    NoToken,
    /// Another sign-in or sign-out is in progress; nothing changed
    Busy,
}

/// Twitch sign-in session shared with the UI.
///
/// Holds the current user and access token, keeps the API client's `Authorization` header
/// in step with the token, and publishes every state change through a watch channel.
/// Clones share the same session.
#[derive(Clone)]
pub struct AuthSession {
    config: Arc<AuthConfig>,
    api: Arc<ApiClient>,
    provider: Arc<TwitchProvider>,
    prompt: Arc<dyn AuthPrompt>,
    state: Arc<watch::Sender<SessionState>>,
    events: CallbackRegistry<AuthEvent>,
    operation: Arc<Mutex<()>>,
    state_generator: StateGenerator,
}

impl AuthSession {
    /// Create a session and tag the API client with the configured client ID
    pub fn new(
        config: AuthConfig,
        api: Arc<ApiClient>,
        prompt: Arc<dyn AuthPrompt>,
    ) -> AuthResult<Self> {
        config.validate()?;

        api.set_default_header(CLIENT_ID_HEADER, config.client_id.as_str());
        let provider = TwitchProvider::new(&config, api.http());
        let (state, _) = watch::channel(SessionState::default());

        info!(client_id = %config.client_id, "Auth session initialized");

        Ok(Self {
            config: Arc::new(config),
            api,
            provider: Arc::new(provider),
            prompt,
            state: Arc::new(state),
            events: CallbackRegistry::with_group("auth_session"),
            operation: Arc::new(Mutex::new(())),
            state_generator: Arc::new(generate_state),
        })
    }

    /// Replace the state nonce generator
    pub fn with_state_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.state_generator = Arc::new(generator);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Get the API client this session authorizes
    pub fn api(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api)
    }

    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_logging_in(&self) -> bool {
        self.state.borrow().is_logging_in
    }

    pub fn is_logging_out(&self) -> bool {
        self.state.borrow().is_logging_out
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Register a callback for session events.
    ///
    /// Callbacks run on the Tokio runtime the session was created in; a session created
    /// outside any runtime must register from inside one.
    pub fn on_event<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(AuthEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.register(callback)
    }

    /// Remove a callback registered with [`AuthSession::on_event`]
    pub fn remove_event_callback(&self, id: CallbackId) -> bool {
        self.events.unregister(id)
    }

    fn emit(&self, event: AuthEvent) {
        debug!(event_type = event.event_type(), "Emitting auth event");
        self.events.trigger(event);
    }

    /// Sign in through the interactive authorization prompt.
    ///
    /// Returns `Declined` when the user cancels or denies access. Any other failure is
    /// returned as [`AuthError::SignInFailed`] carrying the original error's report.
    /// `is_logging_in` is reset on every exit path.
    pub async fn sign_in(&self) -> AuthResult<SignInOutcome> {
        let _operation = self
            .operation
            .try_lock()
            .map_err(|_| AuthError::OperationInProgress)?;
        let _logging_in = FlagGuard::raise(&self.state, Flag::LoggingIn);

        self.emit(AuthEvent::SignInStarted { at: Utc::now() });

        match self.authorize().await {
            Ok(SignInOutcome::SignedIn(user)) => {
                info!(user_id = user.id, display_name = %user.display_name, "Signed in to Twitch");
                self.emit(AuthEvent::SignedIn {
                    user: user.clone(),
                    at: Utc::now(),
                });
                Ok(SignInOutcome::SignedIn(user))
            }
            Ok(SignInOutcome::Declined) => {
                info!("Twitch sign-in was declined");
                self.emit(AuthEvent::SignInDeclined { at: Utc::now() });
                Ok(SignInOutcome::Declined)
            }
            Err(e) => {
                let failure = e.into_sign_in_failure();
                error!(error = %failure, "Twitch sign-in failed");
                self.emit(AuthEvent::SignInFailed {
                    reason: failure.to_string(),
                    at: Utc::now(),
                });
                Err(failure)
            }
        }
    }

    async fn authorize(&self) -> AuthResult<SignInOutcome> {
        let expected_state = (self.state_generator)();
        let auth_url = self.provider.authorization_url(&expected_state)?;

        debug!(redirect_uri = %self.config.redirect_uri, "Opening authorization prompt");

        let result = self
            .prompt
            .start(&auth_url, &self.config.redirect_uri)
            .await
            .map_err(|e| AuthError::Prompt(format!("{:#}", e)))?;

        let params = match result {
            PromptResult::Success { params } => params,
            other => {
                debug!(result = other.kind(), "Authorization prompt closed without a redirect");
                return Ok(SignInOutcome::Declined);
            }
        };

        if params.error() == Some(ACCESS_DENIED) {
            return Ok(SignInOutcome::Declined);
        }

        if params.state() != Some(expected_state.as_str()) {
            warn!("Authorization response state does not match the request");
            return Err(AuthError::AccessDenied);
        }

        if let Some(error) = params.error() {
            return Err(AuthError::Provider {
                error: error.to_string(),
                description: params.error_description().map(str::to_string),
            });
        }

        let token = params
            .access_token()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                AuthError::InvalidResponse(
                    "authorization response did not include an access token".to_string(),
                )
            })?
            .to_string();

        let rollback = BearerRollback::arm(&self.api, self.state.borrow().token.clone());
        self.api.set_bearer_token(&token);

        let user = self.provider.fetch_current_user(&self.api).await?;

        rollback.disarm();
        self.state.send_modify(|state| {
            state.user = Some(user.clone());
            state.token = token;
        });

        Ok(SignInOutcome::SignedIn(user))
    }

    /// Revoke the held token and clear the session.
    ///
    /// Revocation is best-effort: the user, token, and authorization header are cleared
    /// whatever the provider answers. Never fails.
    pub async fn sign_out(&self) -> SignOutOutcome {
        let _operation = match self.operation.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Sign-out requested while another operation is in progress");
                return SignOutOutcome::Busy;
            }
        };
        let cleanup = SignOutCleanup::begin(&self.state, &self.api);

        self.emit(AuthEvent::SignOutStarted { at: Utc::now() });

        let token = self.state.borrow().token.clone();
        let outcome = if token.is_empty() {
            debug!("No token held, skipping revocation");
            SignOutOutcome::NoToken
        } else {
            match self.provider.revoke_token(&token).await {
                Ok(()) => SignOutOutcome::Revoked,
                Err(e) => {
                    // Not surfaced to the caller; the local session is cleared regardless
                    warn!(error = %e, "Token revocation failed");
                    SignOutOutcome::RevocationFailed
                }
            }
        };

        drop(cleanup);

        info!(outcome = ?outcome, "Signed out of Twitch");
        self.emit(AuthEvent::SignedOut {
            revoked: outcome == SignOutOutcome::Revoked,
            at: Utc::now(),
        });

        outcome
    }
}

#[derive(Clone, Copy)]
enum Flag {
    LoggingIn,
    LoggingOut,
}

fn set_flag(state: &watch::Sender<SessionState>, flag: Flag, value: bool) {
    state.send_modify(|state| match flag {
        Flag::LoggingIn => state.is_logging_in = value,
        Flag::LoggingOut => state.is_logging_out = value,
    });
}

/// Raises a progress flag and lowers it when dropped
struct FlagGuard {
    state: Arc<watch::Sender<SessionState>>,
    flag: Flag,
}

impl FlagGuard {
    fn raise(state: &Arc<watch::Sender<SessionState>>, flag: Flag) -> Self {
        set_flag(state, flag, true);
        Self {
            state: Arc::clone(state),
            flag,
        }
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        set_flag(&self.state, self.flag, false);
    }
}

/// Restores the previous bearer header unless disarmed
struct BearerRollback {
    api: Arc<ApiClient>,
    previous_token: Option<String>,
}

impl BearerRollback {
    fn arm(api: &Arc<ApiClient>, previous_token: String) -> Self {
        Self {
            api: Arc::clone(api),
            previous_token: Some(previous_token),
        }
    }

    fn disarm(mut self) {
        self.previous_token = None;
    }
}

impl Drop for BearerRollback {
    fn drop(&mut self) {
        if let Some(previous) = self.previous_token.take() {
            self.api.set_bearer_token(&previous);
        }
    }
}

/// Clears the session when dropped, whatever happened during revocation
struct SignOutCleanup {
    state: Arc<watch::Sender<SessionState>>,
    api: Arc<ApiClient>,
}

impl SignOutCleanup {
    fn begin(state: &Arc<watch::Sender<SessionState>>, api: &Arc<ApiClient>) -> Self {
        set_flag(state, Flag::LoggingOut, true);
        Self {
            state: Arc::clone(state),
            api: Arc::clone(api),
        }
    }
}

impl Drop for SignOutCleanup {
    fn drop(&mut self) {
        self.api.set_bearer_token("");
        self.state.send_modify(|state| {
            state.user = None;
            state.token.clear();
            state.is_logging_out = false;
        });
    }
}

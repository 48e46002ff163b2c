pub mod browser;
pub mod nonce;
pub mod prompt;
pub mod provider;
pub mod session;
pub mod state;
pub mod user;

pub use browser::BrowserPrompt;
pub use prompt::{AuthParams, AuthPrompt, PromptResult};
pub use provider::TwitchProvider;
pub use session::{AuthSession, SignInOutcome, SignOutOutcome};
pub use state::{AuthEvent, SessionState};
pub use user::User;

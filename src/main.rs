use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use streamdata_lib::{
    ApiClient, AuthConfig, AuthSession, BrowserPrompt, HttpClient, ReqwestHttpClient,
    SignInOutcome,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    // Initialize the tracing subscriber for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "streamdata=debug,streamdata_lib=debug,warn".into()
            } else {
                "streamdata=info,streamdata_lib=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!(version = streamdata_lib::VERSION, "StreamData sign-in starting");

    // Log environment loading after logger is initialized
    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let config = AuthConfig::from_env().context("failed to load auth configuration")?;
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let api = Arc::new(ApiClient::new(config.api_base_url.clone(), http));
    let headless = std::env::args().any(|arg| arg == "--no-browser");
    let prompt = if headless {
        BrowserPrompt::headless()
    } else {
        BrowserPrompt::new()
    };

    let session = AuthSession::new(config, api, Arc::new(prompt))?;
    session.on_event(|event| {
        debug!(event_type = event.event_type(), "Auth event");
        Ok(())
    });

    match session.sign_in().await? {
        SignInOutcome::SignedIn(user) => {
            println!("Signed in as {} (id {})", user.display_name, user.id);
            if !user.email.is_empty() {
                println!("Email: {}", user.email);
            }
            println!("Press Enter to sign out.");

            let mut line = String::new();
            BufReader::new(tokio::io::stdin())
                .read_line(&mut line)
                .await
                .context("failed to read from stdin")?;

            let outcome = session.sign_out().await;
            println!("Signed out ({:?})", outcome);
        }
        SignInOutcome::Declined => println!("Sign-in was cancelled."),
    }

    Ok(())
}

//! Browser-based authorization prompt
//!
//! Twitch's implicit grant puts the access token in the URL fragment, which never reaches
//! a server. The redirect URI therefore points at a loopback listener that serves a small
//! page; the page copies the fragment (and the query, where denials are reported) into a
//! second request that the listener can read.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::Request;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::{debug, debug_span, info, warn, Span};
use url::Url;

use super::prompt::{AuthPrompt, PromptResult};

const LANDING_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>StreamData sign-in</title></head>
<body>
<p id="status">Completing sign-in...</p>
<script>
  const params = new URLSearchParams(window.location.search);
  new URLSearchParams(window.location.hash.slice(1)).forEach((value, key) => params.set(key, value));
  history.replaceState(null, "", window.location.pathname);
  fetch("__COMPLETE_PATH__?" + params.toString())
    .then(() => { document.getElementById("status").textContent = "You can close this window and return to StreamData."; })
    .catch(() => { document.getElementById("status").textContent = "Sign-in could not be completed. Return to StreamData and try again."; });
</script>
</body>
</html>
"#;

const COMPLETE_PAGE: &str = "Sign-in received. You can close this window.";

#[derive(Clone)]
struct CallbackState {
    complete_path: String,
    sender: Arc<Mutex<Option<oneshot::Sender<HashMap<String, String>>>>>,
}

/// Prompt that opens the system browser and listens on the loopback redirect URI
#[derive(Debug, Clone)]
pub struct BrowserPrompt {
    open_browser: bool,
}

impl Default for BrowserPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserPrompt {
    /// Create a prompt that opens the system browser
    pub fn new() -> Self {
        Self { open_browser: true }
    }

    /// Create a prompt that only logs the authorization URL
    pub fn headless() -> Self {
        Self { open_browser: false }
    }
}

/// Request span that leaves out the query string, which carries the access token
#[derive(Debug, Clone, Copy)]
struct RedirectSpan;

impl<B> MakeSpan<B> for RedirectSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        debug_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path()
        )
    }
}

fn is_loopback(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost")
        || host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
}

/// Paths served for a redirect URI: the landing page and the completion endpoint
fn callback_paths(redirect: &Url) -> (String, String) {
    let landing = redirect.path().to_string();
    let complete = format!("{}/complete", landing.trim_end_matches('/'));
    (landing, complete)
}

async fn landing(State(state): State<CallbackState>) -> Html<String> {
    Html(LANDING_PAGE.replace("__COMPLETE_PATH__", &state.complete_path))
}

async fn complete(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let sender = state.sender.lock().ok().and_then(|mut sender| sender.take());

    match sender {
        Some(sender) => {
            debug!(params = params.len(), "Received authorization redirect");
            let _ = sender.send(params);
        }
        None => debug!("Ignoring repeated authorization redirect"),
    }

    Html(COMPLETE_PAGE)
}

#[async_trait]
impl AuthPrompt for BrowserPrompt {
    async fn start(&self, auth_url: &str, return_url: &str) -> Result<PromptResult> {
        let redirect = Url::parse(return_url).context("invalid redirect URI")?;
        let host = redirect
            .host_str()
            .ok_or_else(|| anyhow!("redirect URI '{}' has no host", return_url))?
            .to_string();

        if redirect.scheme() != "http" || !is_loopback(&host) {
            bail!(
                "browser prompt needs an http loopback redirect URI, got '{}'",
                return_url
            );
        }

        let port = redirect.port_or_known_default().unwrap_or(80);
        let bind_host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        let listener = TcpListener::bind((bind_host.as_str(), port))
            .await
            .with_context(|| format!("failed to listen on {}:{}", bind_host, port))?;

        let (landing_path, complete_path) = callback_paths(&redirect);
        let (params_tx, params_rx) = oneshot::channel();
        let state = CallbackState {
            complete_path: complete_path.clone(),
            sender: Arc::new(Mutex::new(Some(params_tx))),
        };

        let app = Router::new()
            .route(&landing_path, get(landing))
            .route(&complete_path, get(complete))
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(RedirectSpan));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        debug!(
            host = %bind_host,
            port,
            path = %landing_path,
            "Listening for authorization redirect"
        );

        if self.open_browser {
            if let Err(e) = webbrowser::open(auth_url) {
                let _ = shutdown_tx.send(());
                let _ = server.await;
                return Err(anyhow!("failed to open browser: {}", e));
            }
            info!("Opened browser for Twitch sign-in");
        } else {
            info!(url = %auth_url, "Open this URL in a browser to sign in");
        }

        let result = tokio::select! {
            received = params_rx => match received {
                Ok(params) => PromptResult::Success { params: params.into() },
                Err(_) => PromptResult::Dismiss,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Sign-in cancelled from the terminal");
                PromptResult::Cancel
            }
        };

        let _ = shutdown_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Redirect listener stopped with an error"),
            Err(e) => warn!(error = %e, "Redirect listener task failed"),
        }

        Ok(result)
    }
}

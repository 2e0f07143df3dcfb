//! Interactive "installed app" authorization.
//!
//! Starts a throwaway loopback HTTP listener, sends the user to Google's
//! consent page and waits for the redirect carrying the authorization code.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Router,
};
use reqwest::Url;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthError, ClientSecret, Credential, OAuthClient};

const SUCCESS_PAGE: &str =
    "<p>The authentication flow has completed. You may close this window.</p>";
const FAILURE_PAGE: &str = "<p>Authorization failed. Check the bot's logs.</p>";

/// Opens the consent page for the user.
pub type Launcher = Arc<dyn Fn(Url) + Send + Sync>;

/// Query parameters Google appends to the redirect URI.
type CallbackParams = HashMap<String, String>;

#[derive(Clone)]
struct CallbackState {
    /// Consumed once when the browser hits the redirect URI.
    tx: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>,
}

async fn callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let page = if params.contains_key("code") {
        SUCCESS_PAGE
    } else {
        FAILURE_PAGE
    };

    let tx = state.tx.lock().await.take();
    if let Some(tx) = tx {
        let _ = tx.send(params);
    }

    Html(page)
}

/// Desktop openers, in the order they are tried.
const BROWSER_OPENERS: &[&str] = &["xdg-open", "open"];

/// Run each opener in turn until one exits successfully.
async fn launch_with<'a>(openers: &[&'a str], url: &str) -> Option<&'a str> {
    for &opener in openers {
        match tokio::process::Command::new(opener).arg(url).status().await {
            Ok(status) if status.success() => return Some(opener),
            Ok(status) => debug!("{} exited with {}", opener, status),
            Err(e) => debug!("Could not run {}: {}", opener, e),
        }
    }
    None
}

/// Print the URL and try to open it in a desktop browser.
fn open_in_browser(url: Url) {
    println!("Please visit this URL to authorize the archivist:\n\n{url}\n");
    tokio::spawn(async move {
        if launch_with(BROWSER_OPENERS, url.as_str()).await.is_none() {
            warn!("No browser opener worked; open the URL above manually");
        }
    });
}

pub struct LoopbackFlow {
    oauth: OAuthClient,
    launcher: Launcher,
}

impl LoopbackFlow {
    pub fn new(oauth: OAuthClient) -> Self {
        Self {
            oauth,
            launcher: Arc::new(open_in_browser),
        }
    }

    #[cfg(test)]
    pub fn with_launcher(oauth: OAuthClient, launcher: Launcher) -> Self {
        Self { oauth, launcher }
    }

    /// Run the flow to completion. Blocks until the user acts; there is no timeout.
    pub async fn run(
        &self,
        secret: &ClientSecret,
        scopes: &[String],
    ) -> Result<Credential, AuthError> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(AuthError::Listener)?;
        let port = listener.local_addr().map_err(AuthError::Listener)?.port();
        let redirect_uri = format!("http://localhost:{port}/");

        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new()
            .route("/", get(callback))
            .with_state(CallbackState {
                tx: Arc::new(Mutex::new(Some(tx))),
            });

        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let expected_state = Uuid::new_v4().simple().to_string();
        let url = self
            .oauth
            .authorization_url(secret, &redirect_uri, scopes, &expected_state)?;

        info!("Waiting for OAuth authorization on {}", redirect_uri);
        (self.launcher)(url);

        let params = rx.await;

        let _ = shutdown_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Authorization listener failed: {}", e),
            Err(e) => warn!("Authorization listener task failed: {}", e),
        }

        let params = params
            .map_err(|_| AuthError::Callback("listener closed before the redirect".to_string()))?;

        if let Some(error) = params.get("error") {
            return Err(AuthError::Denied(error.clone()));
        }
        if params.get("state").map(String::as_str) != Some(expected_state.as_str()) {
            return Err(AuthError::StateMismatch);
        }
        let code = params
            .get("code")
            .ok_or_else(|| AuthError::Callback("missing authorization code".to_string()))?;

        self.oauth
            .exchange_code(secret, code, &redirect_uri, scopes)
            .await
    }
}

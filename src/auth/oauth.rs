use chrono::{Duration, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info};

use super::{AuthError, ClientSecret, Credential};

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Space separated list of granted scopes.
    #[serde(default)]
    scope: Option<String>,
}

/// Talks to the identity provider's authorization and token endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    client: Client,
}

impl OAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// URL the user visits to grant access.
    pub fn authorization_url(
        &self,
        secret: &ClientSecret,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> Result<Url, AuthError> {
        let mut url =
            Url::parse(&secret.auth_uri).map_err(|e| AuthError::Url(format!("{}: {}", secret.auth_uri, e)))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &secret.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline");
        Ok(url)
    }

    /// Trade an authorization code for a fresh credential.
    pub async fn exchange_code(
        &self,
        secret: &ClientSecret,
        code: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> Result<Credential, AuthError> {
        let response = self
            .request_token(
                &secret.token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                    ("client_id", secret.client_id.as_str()),
                    ("client_secret", secret.client_secret.as_str()),
                ],
            )
            .await?;

        let mut credential = Credential {
            access_token: String::new(),
            refresh_token: None,
            token_uri: secret.token_uri.clone(),
            client_id: secret.client_id.clone(),
            client_secret: secret.client_secret.clone(),
            scopes: scopes.to_vec(),
            expiry: None,
        };
        apply_token_response(&mut credential, response);
        info!("Authorization code exchanged for a new credential");
        Ok(credential)
    }

    /// Refresh an expired credential using its refresh token.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        let refresh_token = credential.refresh_token.as_deref().unwrap_or_default();
        let response = self
            .request_token(
                &credential.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", credential.client_id.as_str()),
                    ("client_secret", credential.client_secret.as_str()),
                ],
            )
            .await?;

        let mut refreshed = credential.clone();
        apply_token_response(&mut refreshed, response);
        info!("Access token refreshed");
        Ok(refreshed)
    }

    async fn request_token(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        debug!("Requesting token from {}", token_uri);

        let response = self.client.post(token_uri).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

fn apply_token_response(credential: &mut Credential, response: TokenResponse) {
    credential.access_token = response.access_token;
    credential.expiry = response
        .expires_in
        .map(|secs| Utc::now() + Duration::seconds(secs));
    if let Some(refresh_token) = response.refresh_token {
        credential.refresh_token = Some(refresh_token);
    }
    if let Some(scope) = response.scope.filter(|s| !s.trim().is_empty()) {
        credential.scopes = scope.split_whitespace().map(str::to_string).collect();
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Local stand-in for Google's token endpoint.

    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
    use serde_json::{json, Value};
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    pub struct TokenEndpoint {
        pub requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
        pub reject: bool,
    }

    async fn token(
        State(endpoint): State<TokenEndpoint>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<Value>) {
        let grant = form.get("grant_type").cloned().unwrap_or_default();
        endpoint.requests.lock().await.push(form);

        if endpoint.reject {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."})),
            );
        }

        let body = if grant == "authorization_code" {
            json!({
                "access_token": "ya29.fresh",
                "expires_in": 3599,
                "refresh_token": "1//new-refresh",
                "scope": "https://www.googleapis.com/auth/spreadsheets",
                "token_type": "Bearer"
            })
        } else {
            json!({
                "access_token": "ya29.refreshed",
                "expires_in": 3599,
                "token_type": "Bearer"
            })
        };
        (StatusCode::OK, Json(body))
    }

    /// Serve the endpoint on an ephemeral port; returns its token URI.
    pub async fn spawn(endpoint: TokenEndpoint) -> String {
        let app = Router::new()
            .route("/token", post(token))
            .with_state(endpoint);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/token")
    }
}

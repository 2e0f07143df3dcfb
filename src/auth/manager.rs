use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use super::{AuthError, ClientSecret, Credential, CredentialStore, LoopbackFlow, OAuthClient};

/// How new credentials are obtained from the identity provider.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Exchange the refresh token for a new access token.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError>;

    /// Interactive authorization; requires the user to act out-of-band.
    async fn authorize(&self, scopes: &[String]) -> Result<Credential, AuthError>;
}

/// Google as the identity provider, bootstrapped from a client secret file.
pub struct GoogleAuthorizer {
    client_secret_path: PathBuf,
    oauth: OAuthClient,
    flow: LoopbackFlow,
}

impl GoogleAuthorizer {
    pub fn new(client_secret_path: impl Into<PathBuf>) -> Self {
        let oauth = OAuthClient::new();
        Self {
            client_secret_path: client_secret_path.into(),
            flow: LoopbackFlow::new(oauth.clone()),
            oauth,
        }
    }
}

#[async_trait]
impl Authorizer for GoogleAuthorizer {
    async fn refresh(&self, credential: &Credential) -> Result<Credential, AuthError> {
        self.oauth.refresh(credential).await
    }

    async fn authorize(&self, scopes: &[String]) -> Result<Credential, AuthError> {
        let secret = ClientSecret::from_file(&self.client_secret_path).await?;
        self.flow.run(&secret, scopes).await
    }
}

/// Hands out a usable credential, refreshing or bootstrapping it as needed.
///
/// Acquisition is single-flight: concurrent callers queue on one lock, so at
/// most one refresh or authorization flow runs at a time.
pub struct CredentialManager {
    store: Arc<dyn CredentialStore>,
    authorizer: Arc<dyn Authorizer>,
    scopes: Vec<String>,
    lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        authorizer: Arc<dyn Authorizer>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            store,
            authorizer,
            scopes,
            lock: Mutex::new(()),
        }
    }

    pub async fn get_credential(&self) -> Result<Credential, AuthError> {
        let _guard = self.lock.lock().await;

        let stored = self.store.load().await?;

        if let Some(credential) = &stored {
            if let Some(required) = credential.missing_scope(&self.scopes) {
                return Err(AuthError::ScopeMismatch {
                    required: required.clone(),
                    granted: credential.scopes.clone(),
                });
            }
        }

        let fresh = match stored {
            Some(credential) if credential.is_valid(Utc::now()) => return Ok(credential),
            Some(credential) if credential.can_refresh() => {
                info!("Refreshing expired credential");
                self.authorizer.refresh(&credential).await?
            }
            _ => {
                info!("No usable credential, starting the authorization flow");
                self.authorizer.authorize(&self.scopes).await?
            }
        };

        self.store.save(&fresh).await?;
        Ok(fresh)
    }
}

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{AuthError, Credential};

/// Durable home of the bot's single credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>, AuthError>;

    /// Replaces whatever was stored before.
    async fn save(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// Credential kept as JSON in a local token file.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> AuthError {
        AuthError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, AuthError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No token file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        info!("Using existing {}", self.path.display());
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        let json = serde_json::to_string_pretty(credential)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))?;
        info!("Saved credential to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use tokio::sync::Mutex;

    /// In-memory store for tests; counts saves.
    #[derive(Default)]
    pub struct MemoryCredentialStore {
        credential: Mutex<Option<Credential>>,
        saves: Mutex<usize>,
    }

    impl MemoryCredentialStore {
        pub fn with(credential: Credential) -> Self {
            Self {
                credential: Mutex::new(Some(credential)),
                saves: Mutex::new(0),
            }
        }

        pub async fn current(&self) -> Option<Credential> {
            self.credential.lock().await.clone()
        }

        pub async fn save_count(&self) -> usize {
            *self.saves.lock().await
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryCredentialStore {
        async fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(self.credential.lock().await.clone())
        }

        async fn save(&self, credential: &Credential) -> Result<(), AuthError> {
            *self.credential.lock().await = Some(credential.clone());
            *self.saves.lock().await += 1;
            Ok(())
        }
    }
}

use std::path::Path;

use serde::Deserialize;

use super::AuthError;

/// OAuth client registration downloaded from the Google Cloud console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl ClientSecret {
    pub async fn from_file(path: &Path) -> Result<Self, AuthError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AuthError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretFile = serde_json::from_str(json)?;
        file.installed
            .or(file.web)
            .ok_or(AuthError::UnsupportedClientSecret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_app_secret() {
        let json = r#"{"installed":{"client_id":"123.apps.googleusercontent.com","project_id":"archivist","auth_uri":"https://accounts.google.com/o/oauth2/auth","token_uri":"https://oauth2.googleapis.com/token","client_secret":"GOCSPX-x","redirect_uris":["http://localhost"]}}"#;
        let secret = ClientSecret::from_json(json).unwrap();
        assert_eq!(secret.client_id, "123.apps.googleusercontent.com");
        assert_eq!(secret.client_secret, "GOCSPX-x");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_web_secret_with_defaults() {
        let json = r#"{"web":{"client_id":"abc","client_secret":"def"}}"#;
        let secret = ClientSecret::from_json(json).unwrap();
        assert_eq!(secret.auth_uri, "https://accounts.google.com/o/oauth2/auth");
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let err = ClientSecret::from_json(r#"{"other":{}}"#).unwrap_err();
        assert!(matches!(err, AuthError::UnsupportedClientSecret));
    }
}

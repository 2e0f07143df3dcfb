//! Google OAuth credential lifecycle.
//!
//! A single authorized-user credential is kept in a local token file. The
//! [`CredentialManager`] hands it out, refreshing it when it has expired and
//! falling back to the interactive loopback flow when there is nothing usable
//! on disk.

pub mod client_secret;
pub mod credential;
pub mod flow;
pub mod manager;
pub mod oauth;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use client_secret::ClientSecret;
pub use credential::Credential;
pub use flow::LoopbackFlow;
pub use manager::{Authorizer, CredentialManager, GoogleAuthorizer};
pub use oauth::OAuthClient;
pub use store::{CredentialStore, FileCredentialStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credential data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("client secret file has neither an \"installed\" nor a \"web\" section")]
    UnsupportedClientSecret,

    #[error("token endpoint rejected the request ({status}): {body}")]
    TokenEndpoint { status: u16, body: String },

    #[error("request to the identity provider failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid OAuth URL: {0}")]
    Url(String),

    #[error("could not start the authorization listener: {0}")]
    Listener(#[source] std::io::Error),

    #[error("authorization was denied: {0}")]
    Denied(String),

    #[error("authorization callback returned a mismatched state")]
    StateMismatch,

    #[error("authorization callback was malformed: {0}")]
    Callback(String),

    #[error(
        "stored credential lacks scope {required} (granted: {granted:?}); \
         delete the token file (token.json) to authorize again"
    )]
    ScopeMismatch {
        required: String,
        granted: Vec<String>,
    },
}

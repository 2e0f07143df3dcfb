mod auth;
mod config;
mod platform;
mod relay;
mod sheets;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::{CredentialManager, FileCredentialStore, GoogleAuthorizer};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::relay::{Relay, SheetsSink};
use crate::sheets::SheetsClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,archivist=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config_path: Option<PathBuf> = None;
    let mut authorize_only = false;
    for arg in std::env::args().skip(1) {
        if arg == "--authorize" {
            authorize_only = true;
        } else {
            config_path = Some(PathBuf::from(arg));
        }
    }

    let shown_path = config_path
        .as_deref()
        .unwrap_or(Path::new(DEFAULT_CONFIG_PATH))
        .display()
        .to_string();
    info!("Loading configuration from: {}", shown_path);
    let config = Config::load(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {}", shown_path))?;

    info!("Configuration loaded successfully");
    info!("  Spreadsheet: {}", config.sheets.spreadsheet_id);
    info!("  Range: {}", config.sheets.range);
    info!("  Mention: {}", config.telegram.mention);
    info!("  Timezone: {}", config.general.timezone);
    info!("  Token file: {}", config.google.token_path.display());

    let credentials = Arc::new(CredentialManager::new(
        Arc::new(FileCredentialStore::new(&config.google.token_path)),
        Arc::new(GoogleAuthorizer::new(&config.google.client_secret_path)),
        config.google.scopes.clone(),
    ));

    if authorize_only {
        credentials
            .get_credential()
            .await
            .context("Failed to obtain Google credentials")?;
        info!("Google credentials are ready");
        return Ok(());
    }

    let sheets = SheetsClient::new(config.sheets.api_base.clone(), credentials);
    let sink = SheetsSink::new(sheets, &config.sheets);
    let relay = Arc::new(Relay::new(
        config.telegram.mention.clone(),
        config.timezone()?,
        Arc::new(sink),
    ));

    info!("Bot is starting...");
    platform::telegram::run(&config.telegram.bot_token, relay).await?;

    Ok(())
}

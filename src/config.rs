use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sheets::ValueInputOption;

/// Scope required by the spreadsheet append call.
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "archivist.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Usually supplied through `BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: String,
    /// The exact message body that asks the bot to archive the replied-to message.
    #[serde(default = "default_mention")]
    pub mention: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsConfig {
    /// Usually supplied through `SPREADSHEET_ID`.
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default)]
    pub value_input_option: ValueInputOption,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleConfig {
    #[serde(default = "default_client_secret_path")]
    pub client_secret_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// IANA timezone the archived dates are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            mention: default_mention(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            range: default_range(),
            value_input_option: ValueInputOption::default(),
            api_base: default_api_base(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_secret_path: default_client_secret_path(),
            token_path: default_token_path(),
            scopes: default_scopes(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

fn default_mention() -> String {
    "@dank_maymes_bot".to_string()
}

fn default_range() -> String {
    "A2:C2".to_string()
}

fn default_api_base() -> String {
    "https://sheets.googleapis.com".to_string()
}

fn default_client_secret_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_scopes() -> Vec<String> {
    vec![SPREADSHEETS_SCOPE.to_string()]
}

fn default_timezone() -> String {
    "America/Toronto".to_string()
}

fn read_config_file(path: &Path, required: bool) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read config file: {}", path.display())),
    }
}

impl Config {
    /// Load the TOML file at `path`, then apply `BOT_TOKEN` and
    /// `SPREADSHEET_ID` from the process environment.
    ///
    /// With `path == None` the file is [`DEFAULT_CONFIG_PATH`] and may be
    /// absent. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => read_config_file(path, true)?,
            None => read_config_file(Path::new(DEFAULT_CONFIG_PATH), false)?,
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    fn from_sources(content: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config: Config = match content {
            Some(content) => toml::from_str(content).context("Failed to parse config file")?,
            None => Config::default(),
        };

        if let Some(token) = env("BOT_TOKEN").filter(|v| !v.is_empty()) {
            config.telegram.bot_token = token;
        }
        if let Some(id) = env("SPREADSHEET_ID").filter(|v| !v.is_empty()) {
            config.sheets.spreadsheet_id = id;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("BOT_TOKEN is not set");
        }
        if self.sheets.spreadsheet_id.is_empty() {
            anyhow::bail!("SPREADSHEET_ID is not set");
        }
        if self.google.scopes.is_empty() {
            anyhow::bail!("google.scopes must name at least one scope");
        }
        self.timezone()?;
        Ok(())
    }

    /// Parsed archive timezone.
    pub fn timezone(&self) -> Result<Tz> {
        self.general
            .timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.general.timezone, e))
    }
}

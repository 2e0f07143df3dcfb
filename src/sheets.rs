//! Google Sheets `values.append` client.

use std::sync::Arc;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::{AuthError, CredentialManager};

/// How the Sheets API interprets the appended cell values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueInputOption {
    /// Stored as-is.
    Raw,
    /// Parsed as if typed into the UI, so dates and formulas are recognised.
    #[default]
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppendError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("spreadsheet rejected the credential ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("spreadsheet quota exceeded: {message}")]
    Quota { message: String },

    #[error("spreadsheet request failed ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("spreadsheet request could not be sent: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected spreadsheet response: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct ValueRange<'a> {
    values: &'a [Vec<String>],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_cells: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    #[serde(default)]
    pub updates: UpdateSummary,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Pull Google's `error.message` out of a failure body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

pub struct SheetsClient {
    client: Client,
    api_base: String,
    credentials: Arc<CredentialManager>,
}

impl SheetsClient {
    pub fn new(api_base: impl Into<String>, credentials: Arc<CredentialManager>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            credentials,
        }
    }

    fn append_url(
        &self,
        spreadsheet_id: &str,
        range: &str,
        value_input_option: ValueInputOption,
    ) -> Result<Url, AppendError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| AppendError::Decode(format!("invalid API base {}: {}", self.api_base, e)))?;
        let action = format!("{range}:append");
        url.path_segments_mut()
            .map_err(|_| AppendError::Decode(format!("API base {} cannot hold a path", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", action.as_str()]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", value_input_option.as_str());
        Ok(url)
    }

    /// Append `rows` after the last row of the table found in `range`.
    pub async fn append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        value_input_option: ValueInputOption,
        rows: &[Vec<String>],
    ) -> Result<AppendResponse, AppendError> {
        info!("Getting Google credentials");
        let credential = self.credentials.get_credential().await?;

        let url = self.append_url(spreadsheet_id, range, value_input_option)?;
        debug!("Appending {} row(s) via {}", rows.len(), url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&credential.access_token)
            .json(&ValueRange { values: rows })
            .send()
            .await
            .map_err(AppendError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppendError::Unauthorized {
                    status: status.as_u16(),
                    message,
                },
                StatusCode::TOO_MANY_REQUESTS => AppendError::Quota { message },
                _ => AppendError::Provider {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let appended: AppendResponse = response
            .json()
            .await
            .map_err(|e| AppendError::Decode(e.to_string()))?;

        info!(
            "{} cells appended at {}",
            appended.updates.updated_cells.unwrap_or_default(),
            appended.updates.updated_range.as_deref().unwrap_or("unknown range")
        );
        Ok(appended)
    }
}

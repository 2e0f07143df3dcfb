use async_trait::async_trait;
use tracing::info;

use super::QuoteRecord;
use crate::config::SheetsConfig;
use crate::sheets::{AppendError, SheetsClient, ValueInputOption};

/// Where archived quotes end up.
#[async_trait]
pub trait QuoteSink: Send + Sync {
    async fn append_quote(&self, record: &QuoteRecord) -> Result<(), AppendError>;
}

/// Appends each quote as one row of the configured spreadsheet.
pub struct SheetsSink {
    client: SheetsClient,
    spreadsheet_id: String,
    range: String,
    value_input_option: ValueInputOption,
}

impl SheetsSink {
    pub fn new(client: SheetsClient, config: &SheetsConfig) -> Self {
        Self {
            client,
            spreadsheet_id: config.spreadsheet_id.clone(),
            range: config.range.clone(),
            value_input_option: config.value_input_option,
        }
    }
}

#[async_trait]
impl QuoteSink for SheetsSink {
    async fn append_quote(&self, record: &QuoteRecord) -> Result<(), AppendError> {
        info!("Sending data to spreadsheet {}", self.spreadsheet_id);
        self.client
            .append(
                &self.spreadsheet_id,
                &self.range,
                self.value_input_option,
                &[record.to_row()],
            )
            .await?;
        Ok(())
    }
}

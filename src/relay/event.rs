use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// A chat message as seen by the relay, independent of the chat platform.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender_first_name: String,
    pub sender_last_name: Option<String>,
    pub text: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub replied_to: Option<Box<InboundEvent>>,
}

impl InboundEvent {
    /// The replied-to message, if this event is an archive request
    /// addressed with exactly `mention`.
    pub fn archive_target(&self, mention: &str) -> Option<&InboundEvent> {
        if self.text.as_deref() != Some(mention) {
            return None;
        }
        self.replied_to
            .as_deref()
            .filter(|reply| reply.text.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

/// One archived quote; becomes a single spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    pub text: String,
    pub author: String,
    pub date: NaiveDate,
}

impl QuoteRecord {
    /// Text is kept verbatim; only the first name is recorded; the date is
    /// the send time's calendar day in `tz`.
    pub fn from_message(message: &InboundEvent, tz: Tz) -> Self {
        Self {
            text: message.text.clone().unwrap_or_default(),
            author: message.sender_first_name.clone(),
            date: message.sent_at.with_timezone(&tz).date_naive(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.text.clone(),
            self.author.clone(),
            self.date.format("%Y-%m-%d").to_string(),
        ]
    }
}

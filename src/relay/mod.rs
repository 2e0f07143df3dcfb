//! The archive relay: turns "reply + mention" chat messages into spreadsheet rows.

pub mod event;
pub mod sink;

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, error, info};

use crate::auth::AuthError;
use crate::sheets::AppendError;

pub use event::{InboundEvent, QuoteRecord};
pub use sink::{QuoteSink, SheetsSink};

const FAILURE_REPLY: &str = "Could not save quote. Please try again!";

/// What happened to one inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// Not an archive request; nothing is sent back.
    Ignored,
    Saved { author: String },
    Failed,
}

impl RelayOutcome {
    /// The chat reply for this outcome, if any.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            RelayOutcome::Ignored => None,
            RelayOutcome::Saved { author } => Some(format!("Quote by {author} saved successfully!")),
            RelayOutcome::Failed => Some(FAILURE_REPLY.to_string()),
        }
    }
}

pub struct Relay {
    mention: String,
    timezone: Tz,
    sink: Arc<dyn QuoteSink>,
}

impl Relay {
    pub fn new(mention: impl Into<String>, timezone: Tz, sink: Arc<dyn QuoteSink>) -> Self {
        Self {
            mention: mention.into(),
            timezone,
            sink,
        }
    }

    /// Archive the replied-to message if `event` asks for it.
    ///
    /// Spreadsheet failures are reported through [`RelayOutcome::Failed`];
    /// credential failures are not recoverable here and are returned as errors.
    pub async fn handle(&self, event: &InboundEvent) -> Result<RelayOutcome, AuthError> {
        info!("Received message in chat {}", event.chat_id);
        debug!("Event: {:?}", event);

        let Some(target) = event.archive_target(&self.mention) else {
            debug!("Message {} is not an archive request", event.message_id);
            return Ok(RelayOutcome::Ignored);
        };

        info!(
            "Message: {} | From: {} {} | Sent at: {}",
            target.text.as_deref().unwrap_or_default(),
            target.sender_first_name,
            target.sender_last_name.as_deref().unwrap_or_default(),
            target.sent_at.with_timezone(&self.timezone)
        );

        let record = QuoteRecord::from_message(target, self.timezone);
        match self.sink.append_quote(&record).await {
            Ok(()) => {
                info!("Quote saved successfully");
                Ok(RelayOutcome::Saved {
                    author: record.author,
                })
            }
            Err(AppendError::Auth(e)) => {
                error!("Could not obtain Google credentials: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("An error occurred: {}", e);
                Ok(RelayOutcome::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::Toronto;
    use tokio::sync::Mutex;

    const MENTION: &str = "@dank_maymes_bot";

    enum Behaviour {
        Succeed,
        Provider,
        Auth,
    }

    struct RecordingSink {
        rows: Mutex<Vec<Vec<String>>>,
        behaviour: Behaviour,
    }

    impl RecordingSink {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(Vec::new()),
                behaviour,
            })
        }
    }

    #[async_trait]
    impl QuoteSink for RecordingSink {
        async fn append_quote(&self, record: &QuoteRecord) -> Result<(), AppendError> {
            self.rows.lock().await.push(record.to_row());
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Provider => Err(AppendError::Quota {
                    message: "Quota exceeded".to_string(),
                }),
                Behaviour::Auth => Err(AppendError::Auth(AuthError::Denied(
                    "access_denied".to_string(),
                ))),
            }
        }
    }

    fn quoted(text: Option<&str>) -> InboundEvent {
        InboundEvent {
            chat_id: -42,
            message_id: 10,
            sender_first_name: "Alex".to_string(),
            sender_last_name: Some("Tremblay".to_string()),
            text: text.map(str::to_string),
            sent_at: Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap(),
            replied_to: None,
        }
    }

    fn mention(text: &str, reply: Option<InboundEvent>) -> InboundEvent {
        InboundEvent {
            chat_id: -42,
            message_id: 11,
            sender_first_name: "Sam".to_string(),
            sender_last_name: None,
            text: Some(text.to_string()),
            sent_at: Utc.with_ymd_and_hms(2024, 3, 2, 1, 0, 0).unwrap(),
            replied_to: reply.map(Box::new),
        }
    }

    fn relay(sink: Arc<RecordingSink>) -> Relay {
        Relay::new(MENTION, Toronto, sink)
    }

    #[tokio::test]
    async fn test_eligible_reply_is_saved() {
        let sink = RecordingSink::new(Behaviour::Succeed);
        let event = mention(MENTION, Some(quoted(Some("Great job everyone"))));

        let outcome = relay(sink.clone()).handle(&event).await.unwrap();

        assert!(matches!(outcome, RelayOutcome::Saved { .. }));
        assert_eq!(
            outcome.reply_text().as_deref(),
            Some("Quote by Alex saved successfully!")
        );
        assert_eq!(
            *sink.rows.lock().await,
            vec![vec![
                "Great job everyone".to_string(),
                "Alex".to_string(),
                "2024-03-01".to_string()
            ]]
        );
    }

    #[tokio::test]
    async fn test_provider_error_reports_failure() {
        let sink = RecordingSink::new(Behaviour::Provider);
        let event = mention(MENTION, Some(quoted(Some("Great job everyone"))));

        let outcome = relay(sink).handle(&event).await.unwrap();

        assert_eq!(outcome, RelayOutcome::Failed);
        assert_eq!(
            outcome.reply_text().as_deref(),
            Some("Could not save quote. Please try again!")
        );
    }

    #[tokio::test]
    async fn test_auth_error_propagates() {
        let sink = RecordingSink::new(Behaviour::Auth);
        let event = mention(MENTION, Some(quoted(Some("Great job everyone"))));

        let result = relay(sink).handle(&event).await;

        assert!(matches!(result, Err(AuthError::Denied(_))));
    }

    #[tokio::test]
    async fn test_ineligible_events_touch_nothing() {
        let sink = RecordingSink::new(Behaviour::Succeed);
        let relay = relay(sink.clone());

        let cases = [
            // Empty replied-to text.
            mention(MENTION, Some(quoted(Some("")))),
            // Replied-to message without text (a sticker or photo).
            mention(MENTION, Some(quoted(None))),
            // Plain message, not a reply.
            mention("just chatting", None),
            // Mention but not a reply.
            mention(MENTION, None),
            // Reply with a different body.
            mention("@dank_maymes_bot save this", Some(quoted(Some("Great job everyone")))),
        ];

        for event in &cases {
            let outcome = relay.handle(event).await.unwrap();
            assert_eq!(outcome, RelayOutcome::Ignored);
            assert_eq!(outcome.reply_text(), None);
        }
        assert!(sink.rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_replay_appends_twice() {
        let sink = RecordingSink::new(Behaviour::Succeed);
        let relay = relay(sink.clone());
        let event = mention(MENTION, Some(quoted(Some("Great job everyone"))));

        relay.handle(&event).await.unwrap();
        relay.handle(&event).await.unwrap();

        let rows = sink.rows.lock().await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], rows[1]);
    }
}

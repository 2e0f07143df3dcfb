use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::User;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::relay::{InboundEvent, Relay};

const WELCOME_TEXT: &str = "Welcome to the dank maymes archivist bot!";
const USAGE_TEXT: &str = "To archive a message, simply reply to the message and tag this bot!";

type HandlerResult = Result<()>;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Usage,
}

impl Command {
    fn reply_text(&self) -> &'static str {
        match self {
            Command::Start => WELCOME_TEXT,
            Command::Usage => USAGE_TEXT,
        }
    }
}

/// Text that the relay should look at: anything not shaped like a command.
fn is_relay_text(text: &str) -> bool {
    !text.starts_with('/')
}

/// Platform-neutral view of a Telegram message, one level of reply deep.
fn inbound_event(msg: &Message) -> InboundEvent {
    let mut event = event_without_reply(msg);
    event.replied_to = msg
        .reply_to_message()
        .map(|reply| Box::new(event_without_reply(reply)));
    event
}

fn event_without_reply(msg: &Message) -> InboundEvent {
    let (first_name, last_name) = match msg.from.as_ref() {
        Some(User {
            first_name,
            last_name,
            ..
        }) => (first_name.clone(), last_name.clone()),
        None => (String::new(), None),
    };

    InboundEvent {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender_first_name: first_name,
        sender_last_name: last_name,
        text: msg.text().map(str::to_string),
        sent_at: msg.date,
        replied_to: None,
    }
}

/// Run the Telegram long-polling loop until the process is stopped.
pub async fn run(bot_token: &str, relay: Arc<Relay>) -> Result<()> {
    let bot = Bot::new(bot_token);

    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(is_relay_text))
                .endpoint(handle_quote),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command) -> HandlerResult {
    info!("Send {:?} message to chat {}", cmd, msg.chat.id.0);
    bot.send_message(msg.chat.id, cmd.reply_text()).await?;
    Ok(())
}

async fn handle_quote(bot: Bot, msg: Message, relay: Arc<Relay>) -> HandlerResult {
    let event = inbound_event(&msg);
    let outcome = relay.handle(&event).await?;

    if let Some(reply) = outcome.reply_text() {
        bot.send_message(msg.chat.id, reply).await?;
    }

    Ok(())
}

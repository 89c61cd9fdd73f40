use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tracing::{error, info, warn};

use crate::ingest::{self, App, InboundEvent};
use crate::mapper::{Fields, MapperRegistry, Value};
use crate::model::{self, Platform};
use crate::platform::{RawObject, ReplyOpts, Responder, ShapeKind};

/// Telegram message shape as the transport delivers it.
#[derive(Debug, Clone, PartialEq)]
pub struct TgMessage {
    pub text: String,
    pub date: DateTime<Utc>,
    pub from: TgUser,
    pub chat: TgChat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TgUser {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TgChat {
    pub id: i64,
    pub title: String,
}

pub fn register_mappers(registry: &mut MapperRegistry) {
    registry.register(ShapeKind::TelegramMessage, message_to_fields);
    registry.register(ShapeKind::TelegramUser, user_to_fields);
    registry.register(ShapeKind::TelegramChat, chat_to_fields);
}

fn message_to_fields(obj: &RawObject) -> Fields {
    let msg = match obj {
        RawObject::TelegramMessage(msg) => msg,
        other => panic!("telegram message converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("text", Value::Text(msg.text.clone()));
    fields.set("timestamp", Value::Time(msg.date));
    fields.set("author", Value::Raw(RawObject::TelegramUser(msg.from.clone())));
    fields.set("chat", Value::Raw(RawObject::TelegramChat(msg.chat.clone())));
    fields
}

fn user_to_fields(obj: &RawObject) -> Fields {
    let user = match obj {
        RawObject::TelegramUser(user) => user,
        other => panic!("telegram user converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(user.id));
    fields
}

fn chat_to_fields(obj: &RawObject) -> Fields {
    let chat = match obj {
        RawObject::TelegramChat(chat) => chat,
        other => panic!("telegram chat converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(chat.id));
    fields.set(
        "name",
        Value::Text(model::Chat::compose_name([chat.title.as_str()])),
    );
    fields
}

/// Run the Telegram platform
pub async fn run(app: Arc<App>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let from = TgUser {
        id: user.id.0 as i64,
    };
    let chat = TgChat {
        id: msg.chat.id.0,
        // private chats carry no title; fall back to the peer's name
        title: msg
            .chat
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| user.full_name()),
    };

    let event = InboundEvent {
        platform: Platform::Telegram,
        message: RawObject::TelegramMessage(TgMessage {
            text,
            date: msg.date,
            from: from.clone(),
            chat: chat.clone(),
        }),
        author: RawObject::TelegramUser(from),
        chat: RawObject::TelegramChat(chat),
        is_private: msg.chat.is_private(),
    };

    let responder = TelegramResponder {
        bot: bot.clone(),
        chat_id: msg.chat.id,
        message_id: msg.id,
    };

    if let Err(e) = ingest::handle_event(&app, &event, &responder).await {
        error!("Failed to handle telegram message: {:#}", e);
    }

    Ok(())
}

struct TelegramResponder {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
}

#[async_trait]
impl Responder for TelegramResponder {
    async fn send(&self, text: &str, opts: ReplyOpts) -> Result<()> {
        let body = if opts.raw {
            format!("`{}`", escape_code(text))
        } else {
            text.to_string()
        };
        let mut request = self.bot.send_message(self.chat_id, body);
        if opts.raw {
            request = request.parse_mode(ParseMode::MarkdownV2);
        }
        if opts.mention {
            request = request.reply_parameters(ReplyParameters::new(self.message_id));
        }
        request.await.context("Failed to send telegram reply")?;
        Ok(())
    }
}

/// Inside a MarkdownV2 code entity only backtick and backslash are special.
fn escape_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '`' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_escaping_covers_backtick_and_backslash() {
        assert_eq!(escape_code("/link abcDEF123"), "/link abcDEF123");
        assert_eq!(escape_code("a`b\\c"), "a\\`b\\\\c");
    }

    #[test]
    fn chat_names_are_single_segment() {
        let mut registry = MapperRegistry::new();
        register_mappers(&mut registry);
        let fields = registry
            .map(&RawObject::TelegramChat(TgChat {
                id: 5,
                title: "room".into(),
            }))
            .unwrap();
        assert_eq!(fields.text("name").unwrap(), "room");
        assert_eq!(fields.int("native_id").unwrap(), 5);
    }
}

use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::commands;
use crate::config::Config;
use crate::dispatch::{CommandContext, CommandRegistry};
use crate::link::SecretStore;
use crate::mapper::MapperRegistry;
use crate::model::{Message, Platform};
use crate::platform::{discord, telegram, vk, RawObject, ReplyOpts, Responder};
use crate::store::{chats, groups, messages, users, Store};

/// Shared application state: the store, the live link secrets and the
/// registries, all built once at startup.
pub struct App {
    pub store: Store,
    pub secrets: Mutex<SecretStore>,
    pub mappers: MapperRegistry,
    pub commands: CommandRegistry,
    pub config: Config,
}

impl App {
    pub fn new(config: Config, store: Store) -> Self {
        let mut mappers = MapperRegistry::new();
        telegram::register_mappers(&mut mappers);
        discord::register_mappers(&mut mappers);
        vk::register_mappers(&mut mappers);

        let secrets = SecretStore::new(config.linking.secret_ttl(), config.linking.secret_len);

        Self {
            store,
            secrets: Mutex::new(secrets),
            mappers,
            commands: commands::build_commands(),
            config,
        }
    }
}

/// One inbound platform event: the raw message plus the raw author and chat
/// it arrived from, tagged with its platform.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub platform: Platform,
    pub message: RawObject,
    pub author: RawObject,
    pub chat: RawObject,
    pub is_private: bool,
}

/// Processes one event end to end: sweep expired secrets, then read and
/// mutate inside a single transaction. Commit on success; any error rolls
/// the whole event back (the dropped transaction) and propagates. Replies
/// buffered by handlers are delivered only after the commit, so a failed
/// event says nothing.
pub async fn handle_event(
    app: &App,
    event: &InboundEvent,
    responder: &dyn Responder,
) -> Result<()> {
    {
        let mut secrets = app.secrets.lock().unwrap();
        secrets.sweep(app.config.linking.sweep_limit);
    }

    let replies = {
        let mut conn = app.store.lock().await;
        let tx = conn
            .transaction()
            .context("Failed to begin event transaction")?;
        let replies = process_event(app, &tx, event)?;
        tx.commit().context("Failed to commit event transaction")?;
        replies
    };

    for (text, opts) in replies {
        responder.send(&text, opts).await?;
    }
    Ok(())
}

fn process_event(
    app: &App,
    conn: &Connection,
    event: &InboundEvent,
) -> Result<Vec<(String, ReplyOpts)>> {
    let chat_fields = app.mappers.map(&event.chat)?;
    let chat = chats::get_or_create(
        conn,
        event.platform,
        chat_fields.int("native_id")?,
        chat_fields.text("name")?,
    )?;

    let author_fields = app.mappers.map(&event.author)?;
    let author = users::get_or_create(conn, event.platform, author_fields.int("native_id")?)?;

    let msg_fields = app.mappers.map_recursive(&event.message)?;
    let text = msg_fields.text("text")?.to_string();
    let timestamp = msg_fields.time("timestamp")?;

    if event.is_private {
        debug!(platform = event.platform.as_str(), user = author.id, "direct message");
        // direct messages are commands, never stored
        let msg = Message {
            id: 0,
            text: text.clone(),
            timestamp,
            author_id: author.id,
            chat_id: chat.id,
        };
        let mut ctx = CommandContext::new(conn, app, &msg, &author, &chat);
        app.commands.dispatch(&mut ctx, &text)?;
        Ok(ctx.into_replies())
    } else {
        messages::insert(conn, &text, timestamp, author.id, chat.id)?;
        // authoring here earns the chat for the whole group
        groups::add_chat(conn, author.group_id, chat.id)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::telegram::{TgChat, TgMessage, TgUser};
    use async_trait::async_trait;
    use chrono::Utc;

    struct NullResponder;

    #[async_trait]
    impl Responder for NullResponder {
        async fn send(&self, _text: &str, _opts: ReplyOpts) -> Result<()> {
            Ok(())
        }
    }

    fn test_app() -> App {
        let config: Config = toml::from_str("[telegram]\nbot_token = \"\"").unwrap();
        App::new(config, Store::open_in_memory().unwrap())
    }

    fn group_message(user_id: i64, chat_id: i64, text: &str) -> InboundEvent {
        let from = TgUser { id: user_id };
        let chat = TgChat {
            id: chat_id,
            title: "room".into(),
        };
        InboundEvent {
            platform: Platform::Telegram,
            message: RawObject::TelegramMessage(TgMessage {
                text: text.into(),
                date: Utc::now(),
                from: from.clone(),
                chat: chat.clone(),
            }),
            author: RawObject::TelegramUser(from),
            chat: RawObject::TelegramChat(chat),
            is_private: false,
        }
    }

    #[tokio::test]
    async fn group_message_is_stored_and_earns_the_chat() {
        let app = test_app();
        handle_event(&app, &group_message(1, 10, "hello"), &NullResponder)
            .await
            .unwrap();

        let conn = app.store.lock().await;
        let user = users::find(&conn, Platform::Telegram, 1).unwrap().unwrap();
        let group = groups::by_id(&conn, user.group_id).unwrap();
        assert_eq!(group.chats.len(), 1);

        let stored = messages::for_chats(&conn, &group.chats).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "hello");
        assert_eq!(stored[0].author_id, user.id);
    }

    #[tokio::test]
    async fn private_message_is_not_stored() {
        let app = test_app();
        let mut event = group_message(1, 10, "hello");
        event.is_private = true;
        handle_event(&app, &event, &NullResponder).await.unwrap();

        let conn = app.store.lock().await;
        let chat = chats::get_or_create(&conn, Platform::Telegram, 10, "room").unwrap();
        assert!(messages::for_chats(&conn, &[chat.id]).unwrap().is_empty());
        // and the chat was never earned
        let user = users::find(&conn, Platform::Telegram, 1).unwrap().unwrap();
        assert!(groups::by_id(&conn, user.group_id).unwrap().chats.is_empty());
    }
}

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

/// The platforms the bot listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Discord,
    Vk,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Discord => "discord",
            Platform::Vk => "vk",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "telegram" => Platform::Telegram,
            "discord" => Platform::Discord,
            "vk" => Platform::Vk,
            other => bail!("unknown platform: {other}"),
        })
    }
}

/// One platform-specific account as seen by the bot. Belongs to exactly one
/// connected-user group at any time; `group_id` changes only through the
/// link/unlink protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub platform: Platform,
    pub native_id: i64,
    pub group_id: i64,
}

/// The account-linking unit: every user in the group shares one merged set
/// of visible chats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedUser {
    pub id: i64,
    /// Sorted, duplicate-free chat ids.
    pub chats: Vec<i64>,
}

impl ConnectedUser {
    /// Idempotent sorted-set insert.
    pub fn add_chat(&mut self, chat_id: i64) {
        if let Err(pos) = self.chats.binary_search(&chat_id) {
            self.chats.insert(pos, chat_id);
        }
    }

    pub fn has_chat(&self, chat_id: i64) -> bool {
        self.chats.binary_search(&chat_id).is_ok()
    }
}

/// Joins name path segments (chat/category/guild) in stored chat names.
/// Never shown to users; `Chat::display_name` substitutes a real separator.
pub const NAME_SEPARATOR: char = '\x01';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub platform: Platform,
    pub native_id: i64,
    pub name: String,
}

impl Chat {
    pub fn compose_name<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
        let mut name = String::new();
        for segment in segments {
            if !name.is_empty() {
                name.push(NAME_SEPARATOR);
            }
            name.push_str(segment);
        }
        name
    }

    pub fn display_name(&self, sep: &str) -> String {
        self.name.replace(NAME_SEPARATOR, sep)
    }
}

/// Append-only record of a message seen in a group conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub author_id: i64,
    pub chat_id: i64,
}

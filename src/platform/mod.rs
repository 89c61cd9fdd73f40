pub mod discord;
pub mod telegram;
pub mod vk;

use anyhow::Result;
use async_trait::async_trait;

/// A raw inbound object as delivered by a platform transport, before it is
/// mapped into canonical records. Closed set: every supported platform shape
/// is a variant here, selected by its tag rather than runtime introspection.
#[derive(Debug, Clone, PartialEq)]
pub enum RawObject {
    TelegramMessage(telegram::TgMessage),
    TelegramUser(telegram::TgUser),
    TelegramChat(telegram::TgChat),
    DiscordMessage(discord::DcMessage),
    DiscordMember(discord::DcMember),
    DiscordUser(discord::DcUser),
    DiscordChannel(discord::DcChannel),
    VkMessage(vk::VkMessage),
    VkUser(vk::VkUser),
    VkConversation(vk::VkConversation),
}

/// Shape tag used as the mapper-registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    TelegramMessage,
    TelegramUser,
    TelegramChat,
    DiscordMessage,
    DiscordMember,
    DiscordUser,
    DiscordChannel,
    VkMessage,
    VkUser,
    VkConversation,
}

impl ShapeKind {
    /// Immediate declared supertypes. Resolution is single level: a shape
    /// with no converter of its own falls back to exactly one of these.
    pub fn supertypes(self) -> &'static [ShapeKind] {
        match self {
            // a guild member is a user carrying guild-specific extras
            ShapeKind::DiscordMember => &[ShapeKind::DiscordUser],
            _ => &[],
        }
    }
}

impl RawObject {
    pub fn kind(&self) -> ShapeKind {
        match self {
            RawObject::TelegramMessage(_) => ShapeKind::TelegramMessage,
            RawObject::TelegramUser(_) => ShapeKind::TelegramUser,
            RawObject::TelegramChat(_) => ShapeKind::TelegramChat,
            RawObject::DiscordMessage(_) => ShapeKind::DiscordMessage,
            RawObject::DiscordMember(_) => ShapeKind::DiscordMember,
            RawObject::DiscordUser(_) => ShapeKind::DiscordUser,
            RawObject::DiscordChannel(_) => ShapeKind::DiscordChannel,
            RawObject::VkMessage(_) => ShapeKind::VkMessage,
            RawObject::VkUser(_) => ShapeKind::VkUser,
            RawObject::VkConversation(_) => ShapeKind::VkConversation,
        }
    }
}

/// How a reply should be delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyOpts {
    /// Quote/thread the original message instead of a plain send.
    pub mention: bool,
    /// Render as a literal code block so the platform does not reinterpret
    /// special characters (link secrets must survive the round trip).
    pub raw: bool,
}

/// Outbound send capability for the conversation an event arrived in.
/// One implementation per platform.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, text: &str, opts: ReplyOpts) -> Result<()>;
}

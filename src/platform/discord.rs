use chrono::{DateTime, Utc};

use crate::mapper::{Fields, MapperRegistry, Value};
use crate::model;
use crate::platform::{RawObject, ShapeKind};

/// Discord message shape as the transport delivers it.
#[derive(Debug, Clone, PartialEq)]
pub struct DcMessage {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: DcMember,
    pub channel: DcChannel,
}

/// A user seen through a guild: the plain user plus guild-specific extras.
/// Maps through its declared `DiscordUser` supertype.
#[derive(Debug, Clone, PartialEq)]
pub struct DcMember {
    pub user: DcUser,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcUser {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DcChannel {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub guild: String,
}

pub fn register_mappers(registry: &mut MapperRegistry) {
    registry.register(ShapeKind::DiscordMessage, message_to_fields);
    // members resolve through the user supertype
    registry.register(ShapeKind::DiscordUser, user_to_fields);
    registry.register(ShapeKind::DiscordChannel, channel_to_fields);
}

fn message_to_fields(obj: &RawObject) -> Fields {
    let msg = match obj {
        RawObject::DiscordMessage(msg) => msg,
        other => panic!("discord message converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("text", Value::Text(msg.content.clone()));
    fields.set("timestamp", Value::Time(msg.created_at));
    fields.set(
        "author",
        Value::Raw(RawObject::DiscordMember(msg.author.clone())),
    );
    fields.set(
        "chat",
        Value::Raw(RawObject::DiscordChannel(msg.channel.clone())),
    );
    fields
}

fn user_to_fields(obj: &RawObject) -> Fields {
    let user = match obj {
        RawObject::DiscordUser(user) => user,
        RawObject::DiscordMember(member) => &member.user,
        other => panic!("discord user converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(user.id));
    fields
}

fn channel_to_fields(obj: &RawObject) -> Fields {
    let channel = match obj {
        RawObject::DiscordChannel(channel) => channel,
        other => panic!("discord channel converter got {:?}", other.kind()),
    };
    // guild / category / channel path, category omitted when absent
    let mut segments = vec![channel.guild.as_str()];
    if let Some(category) = &channel.category {
        segments.push(category);
    }
    segments.push(&channel.name);

    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(channel.id));
    fields.set("name", Value::Text(model::Chat::compose_name(segments)));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> MapperRegistry {
        let mut registry = MapperRegistry::new();
        register_mappers(&mut registry);
        registry
    }

    #[test]
    fn channel_names_include_the_category_when_present() {
        let channel = DcChannel {
            id: 1,
            name: "general".into(),
            category: Some("talk".into()),
            guild: "guild".into(),
        };
        let fields = registry()
            .map(&RawObject::DiscordChannel(channel))
            .unwrap();
        assert_eq!(fields.text("name").unwrap(), "guild\x01talk\x01general");
    }

    #[test]
    fn channel_names_skip_a_missing_category() {
        let channel = DcChannel {
            id: 1,
            name: "general".into(),
            category: None,
            guild: "guild".into(),
        };
        let fields = registry()
            .map(&RawObject::DiscordChannel(channel))
            .unwrap();
        assert_eq!(fields.text("name").unwrap(), "guild\x01general");
    }
}

use chrono::{DateTime, Utc};

use crate::mapper::{Fields, MapperRegistry, Value};
use crate::model;
use crate::platform::{RawObject, ShapeKind};

/// VK message shape. The transport resolves the conversation and sender in
/// separate API calls, so the message itself carries no sub-objects.
#[derive(Debug, Clone, PartialEq)]
pub struct VkMessage {
    pub text: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VkUser {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VkConversation {
    pub peer_id: i64,
    pub title: Option<String>,
}

pub fn register_mappers(registry: &mut MapperRegistry) {
    registry.register(ShapeKind::VkMessage, message_to_fields);
    registry.register(ShapeKind::VkUser, user_to_fields);
    registry.register(ShapeKind::VkConversation, conversation_to_fields);
}

fn message_to_fields(obj: &RawObject) -> Fields {
    let msg = match obj {
        RawObject::VkMessage(msg) => msg,
        other => panic!("vk message converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("text", Value::Text(msg.text.clone()));
    fields.set("timestamp", Value::Time(msg.date));
    fields
}

fn user_to_fields(obj: &RawObject) -> Fields {
    let user = match obj {
        RawObject::VkUser(user) => user,
        other => panic!("vk user converter got {:?}", other.kind()),
    };
    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(user.id));
    fields
}

fn conversation_to_fields(obj: &RawObject) -> Fields {
    let conversation = match obj {
        RawObject::VkConversation(conversation) => conversation,
        other => panic!("vk conversation converter got {:?}", other.kind()),
    };
    let title = match &conversation.title {
        Some(title) => title.clone(),
        None => format!("<Chat ({}) name not found>", conversation.peer_id),
    };
    let mut fields = Fields::new();
    fields.set("native_id", Value::Int(conversation.peer_id));
    fields.set("name", Value::Text(model::Chat::compose_name([title.as_str()])));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_conversations_get_a_placeholder_title() {
        let mut registry = MapperRegistry::new();
        register_mappers(&mut registry);

        let fields = registry
            .map(&RawObject::VkConversation(VkConversation {
                peer_id: 7,
                title: None,
            }))
            .unwrap();
        assert_eq!(fields.text("name").unwrap(), "<Chat (7) name not found>");
    }
}

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{Chat, Platform};

fn row_to_chat(row: &rusqlite::Row) -> rusqlite::Result<Chat> {
    let platform: String = row.get(1)?;
    Ok(Chat {
        id: row.get(0)?,
        platform: Platform::parse(&platform).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?,
        native_id: row.get(2)?,
        name: row.get(3)?,
    })
}

/// Looks up a chat by its platform identity, creating it on first sighting.
/// A changed composite name (chat renamed upstream) is refreshed in place.
pub fn get_or_create(
    conn: &Connection,
    platform: Platform,
    native_id: i64,
    name: &str,
) -> Result<Chat> {
    let existing = conn
        .query_row(
            "SELECT id, platform, native_id, name FROM chats
             WHERE platform = ?1 AND native_id = ?2",
            params![platform.as_str(), native_id],
            row_to_chat,
        )
        .optional()
        .context("Failed to look up chat")?;

    if let Some(mut chat) = existing {
        if chat.name != name {
            conn.execute(
                "UPDATE chats SET name = ?1 WHERE id = ?2",
                params![name, chat.id],
            )
            .context("Failed to refresh chat name")?;
            chat.name = name.to_string();
        }
        return Ok(chat);
    }

    conn.execute(
        "INSERT INTO chats (platform, native_id, name) VALUES (?1, ?2, ?3)",
        params![platform.as_str(), native_id, name],
    )
    .context("Failed to create chat")?;

    Ok(Chat {
        id: conn.last_insert_rowid(),
        platform,
        native_id,
        name: name.to_string(),
    })
}

pub fn by_id(conn: &Connection, id: i64) -> Result<Chat> {
    conn.query_row(
        "SELECT id, platform, native_id, name FROM chats WHERE id = ?1",
        params![id],
        row_to_chat,
    )
    .with_context(|| format!("Chat {id} not found"))
}

/// Fetches the given chats, ordered by id.
pub fn by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Chat>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, platform, native_id, name FROM chats
         WHERE id IN ({placeholders}) ORDER BY id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let chats = stmt
        .query_map(rusqlite::params_from_iter(ids), row_to_chat)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to fetch chats")?;
    Ok(chats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NAME_SEPARATOR;
    use crate::store::Store;

    #[tokio::test]
    async fn get_or_create_refreshes_renamed_chats() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let first = get_or_create(&conn, Platform::Telegram, 50, "old name").unwrap();
        let renamed = get_or_create(&conn, Platform::Telegram, 50, "new name").unwrap();
        assert_eq!(first.id, renamed.id);
        assert_eq!(by_id(&conn, first.id).unwrap().name, "new name");
    }

    #[tokio::test]
    async fn by_ids_preserves_composed_names() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;

        let name = Chat::compose_name(["guild", "general"]);
        let chat = get_or_create(&conn, Platform::Discord, 60, &name).unwrap();

        let fetched = by_ids(&conn, &[chat.id]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].name.contains(NAME_SEPARATOR));
        assert_eq!(fetched[0].display_name("/"), "guild/general");
    }

    #[tokio::test]
    async fn by_ids_on_empty_set_is_empty() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().await;
        assert!(by_ids(&conn, &[]).unwrap().is_empty());
    }
}

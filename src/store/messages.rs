use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::model::Message;

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        text: row.get(1)?,
        timestamp: row.get(2)?,
        author_id: row.get(3)?,
        chat_id: row.get(4)?,
    })
}

pub fn insert(
    conn: &Connection,
    text: &str,
    timestamp: DateTime<Utc>,
    author_id: i64,
    chat_id: i64,
) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages (text, timestamp, author_id, chat_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![text, timestamp, author_id, chat_id],
    )
    .context("Failed to save message")?;

    Ok(Message {
        id: conn.last_insert_rowid(),
        text: text.to_string(),
        timestamp,
        author_id,
        chat_id,
    })
}

/// All messages in the given chats, oldest first.
pub fn for_chats(conn: &Connection, chat_ids: &[i64]) -> Result<Vec<Message>> {
    if chat_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; chat_ids.len()].join(", ");
    let sql = format!(
        "SELECT id, text, timestamp, author_id, chat_id FROM messages
         WHERE chat_id IN ({placeholders}) ORDER BY timestamp, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let messages = stmt
        .query_map(rusqlite::params_from_iter(chat_ids), row_to_message)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to load messages")?;
    Ok(messages)
}

/// Distinct chat ids the user has authored messages in, sorted. This is the
/// "individually seen" set used when a group is split: a chat the user only
/// ever received messages in does not count.
pub fn authored_chat_ids(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT chat_id FROM messages WHERE author_id = ?1 ORDER BY chat_id",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()
        .context("Failed to collect authored chats")?;
    Ok(ids)
}

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::model::ConnectedUser;

fn decode_chats(raw: &str) -> Result<Vec<i64>> {
    serde_json::from_str(raw).context("Failed to decode group chat set")
}

fn encode_chats(chats: &[i64]) -> Result<String> {
    serde_json::to_string(chats).context("Failed to encode group chat set")
}

pub fn create(conn: &Connection, chats: &[i64]) -> Result<ConnectedUser> {
    conn.execute(
        "INSERT INTO user_groups (chats) VALUES (?1)",
        params![encode_chats(chats)?],
    )
    .context("Failed to create group")?;
    Ok(ConnectedUser {
        id: conn.last_insert_rowid(),
        chats: chats.to_vec(),
    })
}

pub fn by_id(conn: &Connection, id: i64) -> Result<ConnectedUser> {
    let raw: String = conn
        .query_row(
            "SELECT chats FROM user_groups WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .with_context(|| format!("Group {id} not found"))?;
    Ok(ConnectedUser {
        id,
        chats: decode_chats(&raw)?,
    })
}

pub fn set_chats(conn: &Connection, id: i64, chats: &[i64]) -> Result<()> {
    conn.execute(
        "UPDATE user_groups SET chats = ?1 WHERE id = ?2",
        params![encode_chats(chats)?, id],
    )
    .context("Failed to update group chat set")?;
    Ok(())
}

/// Idempotent set-union insert of one chat id into the group's chat set.
pub fn add_chat(conn: &Connection, id: i64, chat_id: i64) -> Result<()> {
    let mut group = by_id(conn, id)?;
    if group.has_chat(chat_id) {
        return Ok(());
    }
    group.add_chat(chat_id);
    set_chats(conn, id, &group.chats)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM user_groups WHERE id = ?1", params![id])
        .with_context(|| format!("Failed to delete group {id}"))?;
    Ok(())
}

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::model::{Platform, User};

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let platform: String = row.get(1)?;
    Ok(User {
        id: row.get(0)?,
        platform: Platform::parse(&platform).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?,
        native_id: row.get(2)?,
        group_id: row.get(3)?,
    })
}

pub fn find(conn: &Connection, platform: Platform, native_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, platform, native_id, group_id FROM users
         WHERE platform = ?1 AND native_id = ?2",
        params![platform.as_str(), native_id],
        row_to_user,
    )
    .optional()
    .context("Failed to look up user")
}

/// Looks up a platform identity, creating it inside a fresh singleton group
/// on first sighting.
pub fn get_or_create(conn: &Connection, platform: Platform, native_id: i64) -> Result<User> {
    if let Some(user) = find(conn, platform, native_id)? {
        return Ok(user);
    }

    conn.execute("INSERT INTO user_groups (chats) VALUES ('[]')", [])
        .context("Failed to create group")?;
    let group_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO users (platform, native_id, group_id) VALUES (?1, ?2, ?3)",
        params![platform.as_str(), native_id, group_id],
    )
    .context("Failed to create user")?;

    Ok(User {
        id: conn.last_insert_rowid(),
        platform,
        native_id,
        group_id,
    })
}

pub fn by_id(conn: &Connection, id: i64) -> Result<User> {
    conn.query_row(
        "SELECT id, platform, native_id, group_id FROM users WHERE id = ?1",
        params![id],
        row_to_user,
    )
    .with_context(|| format!("User {id} not found"))
}

pub fn in_group(conn: &Connection, group_id: i64) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, platform, native_id, group_id FROM users
         WHERE group_id = ?1 ORDER BY id",
    )?;
    let users = stmt
        .query_map(params![group_id], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list group members")?;
    Ok(users)
}

pub fn assign_group(conn: &Connection, user_id: i64, group_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET group_id = ?1 WHERE id = ?2",
        params![group_id, user_id],
    )
    .context("Failed to reassign user group")?;
    Ok(())
}

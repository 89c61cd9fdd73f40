pub mod chats;
pub mod groups;
pub mod messages;
pub mod users;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// Thread-safe SQLite store. Repository operations are free functions over
/// `&Connection` (see the submodules) so an event pipeline can run a whole
/// event inside one explicit transaction on the locked connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // WAL for better concurrent read performance; journal_mode PRAGMA
        // always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::run_migrations(&conn)?;

        info!("Store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for one end-to-end event. The guard is what
    /// `rusqlite::Connection::transaction` needs; dropping an uncommitted
    /// transaction rolls it back.
    pub async fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- Account-linking groups; chats is a sorted JSON array of chat ids
            CREATE TABLE IF NOT EXISTS user_groups (
                id INTEGER PRIMARY KEY,
                chats TEXT NOT NULL DEFAULT '[]'
            );

            -- One row per (platform, platform-native id)
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                platform TEXT NOT NULL,
                native_id INTEGER NOT NULL,
                group_id INTEGER NOT NULL REFERENCES user_groups(id),
                UNIQUE (platform, native_id)
            );

            CREATE TABLE IF NOT EXISTS chats (
                id INTEGER PRIMARY KEY,
                platform TEXT NOT NULL,
                native_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                UNIQUE (platform, native_id)
            );

            -- Append-only; only group conversations are recorded
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                author_id INTEGER NOT NULL REFERENCES users(id),
                chat_id INTEGER NOT NULL REFERENCES chats(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat
                ON messages(chat_id, timestamp);

            CREATE INDEX IF NOT EXISTS idx_messages_author
                ON messages(author_id);

            CREATE INDEX IF NOT EXISTS idx_users_group
                ON users(group_id);
            ",
        )?;

        Ok(())
    }
}

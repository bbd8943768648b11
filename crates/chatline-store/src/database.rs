//! Handle to the SQLite file that mirrors chats, messages and cached names.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

/// An open mirror whose schema is already at [`migrations::CURRENT_VERSION`].
pub struct Database {
    conn: Connection,
}

impl Database {
    /// `chatline.db` under the user's data directory, e.g.
    /// `~/.local/share/chatline/` on Linux.
    pub fn new() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "chatline", "chatline").ok_or(StoreError::NoDataDir)?;
        let path = dirs.data_dir().join("chatline.db");
        tracing::info!(path = %path.display(), "using default chat mirror");
        Self::open_at(&path)
    }

    /// Missing parent directories are created.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // WAL lets restore reads overlap with pipeline writes.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::ready(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::ready(Connection::open_in_memory()?)
    }

    fn ready(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `None` for in-memory mirrors.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror").join("chats.db");

        let db = Database::open_at(&path).unwrap();
        assert!(db.path().is_some());
        assert!(path.exists());
    }

    #[test]
    fn reopen_is_already_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.db");

        drop(Database::open_at(&path).unwrap());
        let db = Database::open_at(&path).unwrap();

        let version: u32 = db
            .conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, migrations::CURRENT_VERSION);
    }
}

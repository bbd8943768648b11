use chrono::Utc;
use rusqlite::params;

use chatline_shared::{Chat, ChatId};

use crate::database::Database;
use crate::error::Result;
use crate::models::ChatRecord;

impl Database {
    /// Insert or replace the metadata of a chat snapshot. The last message is
    /// not stored; restore derives it from the `messages` table.
    pub fn upsert_chat(&self, chat: &Chat) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chats (id, name, profile_picture, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                profile_picture = excluded.profile_picture,
                updated_at = excluded.updated_at",
            params![
                chat.id.as_str(),
                chat.name,
                chat.profile_picture,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_chats(&self) -> Result<Vec<ChatRecord>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name, profile_picture FROM chats ORDER BY rowid ASC")?;

        let rows = stmt.query_map([], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatRecord> {
    let id: String = row.get(0)?;
    Ok(ChatRecord {
        id: ChatId(id),
        name: row.get(1)?,
        profile_picture: row.get(2)?,
    })
}

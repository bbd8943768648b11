//! Write-through persistence seam.
//!
//! Saves are best-effort: the ingest pipeline logs failures and keeps going,
//! with in-memory state remaining authoritative.

use std::path::Path;

use parking_lot::Mutex;

use chatline_shared::{Chat, ChatId, Message, NameKind};
use chatline_store::Database;

use crate::error::EngineError;

/// Blocking persistence collaborator. Called from `spawn_blocking`.
pub trait Persistence: Send + Sync {
    fn save_chat(&self, chat: &Chat) -> Result<(), EngineError>;
    /// Saves the message together with its current reaction list.
    fn save_message(&self, message: &Message) -> Result<(), EngineError>;
    fn save_name(&self, kind: NameKind, id: &str, name: &str) -> Result<(), EngineError>;

    /// `(id, name, profile_picture)` for every stored chat.
    fn load_chats(&self) -> Result<Vec<(ChatId, String, Option<String>)>, EngineError>;
    /// Every stored message in original arrival order.
    fn load_messages(&self) -> Result<Vec<Message>, EngineError>;
    fn load_names(&self) -> Result<Vec<(NameKind, String, String)>, EngineError>;
}

/// SQLite-backed persistence on a single serialized connection.
pub struct SqlitePersistence {
    db: Mutex<Database>,
}

impl SqlitePersistence {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: Option<&Path>) -> Result<Self, EngineError> {
        let db = match path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        Ok(Self::new(db))
    }
}

impl Persistence for SqlitePersistence {
    fn save_chat(&self, chat: &Chat) -> Result<(), EngineError> {
        Ok(self.db.lock().upsert_chat(chat)?)
    }

    fn save_message(&self, message: &Message) -> Result<(), EngineError> {
        Ok(self.db.lock().upsert_message(message)?)
    }

    fn save_name(&self, kind: NameKind, id: &str, name: &str) -> Result<(), EngineError> {
        Ok(self.db.lock().upsert_name(kind, id, name)?)
    }

    fn load_chats(&self) -> Result<Vec<(ChatId, String, Option<String>)>, EngineError> {
        Ok(self
            .db
            .lock()
            .list_chats()?
            .into_iter()
            .map(|c| (c.id, c.name, c.profile_picture))
            .collect())
    }

    fn load_messages(&self) -> Result<Vec<Message>, EngineError> {
        Ok(self.db.lock().load_messages()?)
    }

    fn load_names(&self) -> Result<Vec<(NameKind, String, String)>, EngineError> {
        Ok(self
            .db
            .lock()
            .load_names()?
            .into_iter()
            .map(|n| (n.kind, n.id, n.name))
            .collect())
    }
}

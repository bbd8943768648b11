//! The canonical chat and message index.
//!
//! Messages are held once, keyed by id. A chat holds only the ids of its
//! messages in arrival order plus the id of its current last message, so an
//! edit, delete or reaction touches exactly one record and every view of it
//! agrees. All mutations take the write lock, all queries the read lock; the
//! lock is never held across I/O.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use chatline_shared::types::user_part;
use chatline_shared::{Chat, ChatId, Message, MessageId, Reaction, UserId};

/// Result of [`StateStore::apply_new_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    Inserted { chat_created: bool },
    /// The id was already indexed; nothing changed.
    Duplicate,
}

/// A chat-level attribute change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMetadata {
    Name(String),
    /// `None` clears the picture.
    Picture(Option<String>),
}

/// A reaction as applied by [`StateStore::apply_reaction`].
#[derive(Debug, Clone)]
pub struct ReactionUpdate {
    pub message_id: MessageId,
    pub sender: UserId,
    pub sender_name: String,
    /// Empty removes the sender's reaction.
    pub emoji: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub chats: usize,
    pub messages: usize,
    pub deleted: usize,
}

#[derive(Debug)]
struct ChatEntry {
    name: String,
    profile_picture: Option<String>,
    message_ids: Vec<MessageId>,
    last_message: Option<MessageId>,
}

impl ChatEntry {
    fn new(name: String) -> Self {
        Self {
            name,
            profile_picture: None,
            message_ids: Vec::new(),
            last_message: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    messages: HashMap<MessageId, Message>,
    chats: HashMap<ChatId, ChatEntry>,
}

impl Inner {
    fn snapshot(&self, id: &ChatId, entry: &ChatEntry) -> Chat {
        Chat {
            id: id.clone(),
            name: entry.name.clone(),
            profile_picture: entry.profile_picture.clone(),
            last_message: entry
                .last_message
                .as_ref()
                .and_then(|m| self.messages.get(m))
                .cloned(),
            message_count: entry.message_ids.len(),
        }
    }

    fn insert(&mut self, message: Message, chat_name: impl FnOnce() -> String) -> Insert {
        if self.messages.contains_key(&message.id) {
            return Insert::Duplicate;
        }

        let mut chat_created = false;
        let entry = self
            .chats
            .entry(message.chat_id.clone())
            .or_insert_with(|| {
                chat_created = true;
                ChatEntry::new(chat_name())
            });

        entry.message_ids.push(message.id.clone());
        if !message.deleted {
            let newer = match entry.last_message.as_ref().and_then(|id| self.messages.get(id)) {
                Some(current) => message.timestamp >= current.timestamp,
                None => true,
            };
            if newer {
                entry.last_message = Some(message.id.clone());
            }
        }

        self.messages.insert(message.id.clone(), message);
        Insert::Inserted { chat_created }
    }

    /// Greatest-timestamp non-deleted message of a chat; later arrival wins ties.
    fn recompute_last(&mut self, chat_id: &ChatId) {
        let Some(entry) = self.chats.get_mut(chat_id) else {
            return;
        };
        let mut best: Option<&Message> = None;
        for id in &entry.message_ids {
            let Some(message) = self.messages.get(id) else {
                continue;
            };
            if message.deleted {
                continue;
            }
            if best.map_or(true, |b| message.timestamp >= b.timestamp) {
                best = Some(message);
            }
        }
        entry.last_message = best.map(|m| m.id.clone());
    }
}

/// Owned, internally synchronised chat/message state.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: RwLock<Inner>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Index a new message, creating its chat under `chat_name` if needed.
    pub fn apply_new_message(&self, message: Message, chat_name: &str) -> Insert {
        let id = message.id.clone();
        let outcome = self.inner.write().insert(message, || chat_name.to_string());
        if outcome == Insert::Duplicate {
            debug!(id = %id, "duplicate message id ignored");
        }
        outcome
    }

    /// Replace a message's content and mark it edited. Deleted messages are
    /// immutable. Returns the updated message.
    pub fn apply_edit(&self, id: &MessageId, content: &str) -> Option<Message> {
        let mut inner = self.inner.write();
        let Some(message) = inner.messages.get_mut(id) else {
            debug!(id = %id, "edit for unknown message ignored");
            return None;
        };
        if message.deleted {
            debug!(id = %id, "edit for deleted message ignored");
            return None;
        }
        message.content = content.to_string();
        message.edited = true;
        Some(message.clone())
    }

    /// Mark a message deleted and move the chat's last message if needed.
    pub fn apply_delete(&self, id: &MessageId) -> Option<Message> {
        let mut inner = self.inner.write();
        let Some(message) = inner.messages.get_mut(id) else {
            debug!(id = %id, "delete for unknown message ignored");
            return None;
        };
        if message.deleted {
            return None;
        }
        message.mark_deleted();
        let deleted = message.clone();

        let was_last = inner
            .chats
            .get(&deleted.chat_id)
            .is_some_and(|c| c.last_message.as_ref() == Some(id));
        if was_last {
            inner.recompute_last(&deleted.chat_id);
        }
        Some(deleted)
    }

    /// Set, replace or (with an empty emoji) remove one sender's reaction.
    pub fn apply_reaction(&self, update: ReactionUpdate) -> Option<Message> {
        let mut inner = self.inner.write();
        let Some(message) = inner.messages.get_mut(&update.message_id) else {
            debug!(id = %update.message_id, "reaction for unknown message ignored");
            return None;
        };

        let existing = message
            .reactions
            .iter()
            .position(|r| r.sender == update.sender);

        match (existing, update.emoji.is_empty()) {
            (Some(idx), true) => {
                message.reactions.remove(idx);
            }
            (None, true) => return None,
            (Some(idx), false) => {
                let reaction = &mut message.reactions[idx];
                reaction.emoji = update.emoji;
                reaction.sender_name = update.sender_name;
                reaction.timestamp = update.timestamp;
            }
            (None, false) => message.reactions.push(Reaction {
                emoji: update.emoji,
                sender: update.sender,
                sender_name: update.sender_name,
                timestamp: update.timestamp,
            }),
        }
        Some(message.clone())
    }

    /// Update a known chat's name or picture. Never creates a chat; returns
    /// the new snapshot only when something changed.
    pub fn apply_chat_metadata(&self, chat_id: &ChatId, update: ChatMetadata) -> Option<Chat> {
        let mut inner = self.inner.write();
        let entry = inner.chats.get_mut(chat_id)?;
        let changed = match update {
            ChatMetadata::Name(name) => {
                let name = name.trim();
                if name.is_empty() || entry.name == name {
                    false
                } else {
                    entry.name = name.to_string();
                    true
                }
            }
            ChatMetadata::Picture(picture) => {
                if entry.profile_picture == picture {
                    false
                } else {
                    entry.profile_picture = picture;
                    true
                }
            }
        };
        if !changed {
            return None;
        }
        let inner = &*inner;
        inner.chats.get(chat_id).map(|e| inner.snapshot(chat_id, e))
    }

    /// Load persisted state: chat attributes first, then messages in their
    /// original arrival order. Chats referenced only by messages get the
    /// identifier fallback as name. Returns the number of messages indexed.
    pub fn restore<C, M>(&self, chats: C, messages: M) -> usize
    where
        C: IntoIterator<Item = (ChatId, String, Option<String>)>,
        M: IntoIterator<Item = Message>,
    {
        let mut inner = self.inner.write();
        for (id, name, picture) in chats {
            let entry = inner.chats.entry(id).or_insert_with(|| ChatEntry::new(name.clone()));
            entry.name = name;
            entry.profile_picture = picture;
        }

        let mut restored = 0;
        for message in messages {
            let fallback = user_part(message.chat_id.as_str()).to_string();
            if let Insert::Inserted { .. } = inner.insert(message, || fallback) {
                restored += 1;
            }
        }
        restored
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// All chats, most recent last message first; chats without a visible
    /// message sort last.
    pub fn list_chats(&self) -> Vec<Chat> {
        let inner = self.inner.read();
        let mut chats: Vec<Chat> = inner
            .chats
            .iter()
            .map(|(id, entry)| inner.snapshot(id, entry))
            .collect();
        chats.sort_by(|a, b| {
            let ta = a.last_message.as_ref().map(|m| m.timestamp);
            let tb = b.last_message.as_ref().map(|m| m.timestamp);
            // `Option` orders `None` first, so reversing puts it last.
            tb.cmp(&ta).then_with(|| a.id.cmp(&b.id))
        });
        chats
    }

    /// A chat's messages in arrival order; empty for an unknown chat.
    pub fn list_messages(&self, chat_id: &ChatId) -> Vec<Message> {
        let inner = self.inner.read();
        let Some(entry) = inner.chats.get(chat_id) else {
            return Vec::new();
        };
        entry
            .message_ids
            .iter()
            .filter_map(|id| inner.messages.get(id))
            .cloned()
            .collect()
    }

    pub fn get_message(&self, id: &MessageId) -> Option<Message> {
        self.inner.read().messages.get(id).cloned()
    }

    pub fn get_chat(&self, id: &ChatId) -> Option<Chat> {
        let inner = self.inner.read();
        inner.chats.get(id).map(|entry| inner.snapshot(id, entry))
    }

    pub fn contains_chat(&self, id: &ChatId) -> bool {
        self.inner.read().chats.contains_key(id)
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            chats: inner.chats.len(),
            messages: inner.messages.len(),
            deleted: inner.messages.values().filter(|m| m.deleted).count(),
        }
    }
}

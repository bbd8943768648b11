//! Canonical chat and message records.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to query and fanout consumers as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DELETED_MARKER;
use crate::types::{ChatId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Reaction
// ---------------------------------------------------------------------------

/// One sender's active reaction on a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub sender: UserId,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Back-reference from a reply to the message it quotes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotedMessage {
    pub id: MessageId,
    pub sender: Option<UserId>,
    pub content: String,
}

/// Classification of a protocol/system message (type code + table name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub code: i32,
    pub name: String,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Network-assigned identifier.
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: UserId,
    /// Resolved display name of the sender at ingestion time.
    pub sender_name: String,
    /// Human-readable content, or [`DELETED_MARKER`] once deleted.
    pub content: String,
    /// Network-assigned send time.
    pub timestamp: DateTime<Utc>,
    pub from_me: bool,
    pub has_media: bool,
    /// Path of the stored media file; `None` when absent or when storing failed.
    pub media_path: Option<String>,
    pub edited: bool,
    pub deleted: bool,
    pub quoted: Option<QuotedMessage>,
    pub protocol: Option<ProtocolInfo>,
    /// At most one entry per sender, in first-reaction order.
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Build a plain, unmutated message record.
    pub fn new(
        id: MessageId,
        chat_id: ChatId,
        sender: UserId,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let sender_name = sender.user_part().to_string();
        Self {
            id,
            chat_id,
            sender,
            sender_name,
            content: content.into(),
            timestamp,
            from_me: false,
            has_media: false,
            media_path: None,
            edited: false,
            deleted: false,
            quoted: None,
            protocol: None,
            reactions: Vec::new(),
        }
    }

    /// Replace the content with the deletion marker.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.content = DELETED_MARKER.to_string();
    }

    /// Reaction currently held by `sender`, if any.
    pub fn reaction_from(&self, sender: &UserId) -> Option<&Reaction> {
        self.reactions.iter().find(|r| &r.sender == sender)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Read snapshot of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub profile_picture: Option<String>,
    /// Copy of the greatest-timestamp non-deleted message.
    pub last_message: Option<Message>,
    pub message_count: usize,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        self.id.is_group()
    }
}

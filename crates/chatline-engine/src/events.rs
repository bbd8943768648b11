use chrono::{DateTime, Utc};
use serde::Serialize;

use chatline_shared::protocol::{PresenceUpdate, ReceiptEvent};
use chatline_shared::{Chat, ChatId, Message, MessageId};

pub const EVENT_NEW_MESSAGE: &str = "new-message";
pub const EVENT_MESSAGE_EDITED: &str = "message-edited";
pub const EVENT_MESSAGE_DELETED: &str = "message-deleted";
pub const EVENT_REACTION_UPDATED: &str = "reaction-updated";
pub const EVENT_CHAT_UPDATED: &str = "chat-updated";
pub const EVENT_RECEIPT: &str = "receipt";
pub const EVENT_PRESENCE: &str = "presence";

/// A committed state change, as delivered to fanout subscribers.
///
/// Message-level variants carry the full post-mutation message so a
/// subscriber never needs a follow-up query.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    NewMessage {
        message: Message,
        /// Set when this message created the chat.
        chat_created: bool,
    },
    MessageEdited {
        message: Message,
    },
    MessageDeleted {
        message: Message,
    },
    ReactionUpdated {
        message: Message,
    },
    ChatUpdated {
        chat: Chat,
    },
    Receipt(ReceiptEvent),
    Presence(PresenceUpdate),
}

impl Change {
    pub fn kind(&self) -> &'static str {
        match self {
            Change::NewMessage { .. } => EVENT_NEW_MESSAGE,
            Change::MessageEdited { .. } => EVENT_MESSAGE_EDITED,
            Change::MessageDeleted { .. } => EVENT_MESSAGE_DELETED,
            Change::ReactionUpdated { .. } => EVENT_REACTION_UPDATED,
            Change::ChatUpdated { .. } => EVENT_CHAT_UPDATED,
            Change::Receipt(_) => EVENT_RECEIPT,
            Change::Presence(_) => EVENT_PRESENCE,
        }
    }

    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            Change::NewMessage { message, .. }
            | Change::MessageEdited { message }
            | Change::MessageDeleted { message }
            | Change::ReactionUpdated { message } => Some(&message.chat_id),
            Change::ChatUpdated { chat } => Some(&chat.id),
            Change::Receipt(receipt) => Some(&receipt.chat),
            Change::Presence(_) => None,
        }
    }

    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Change::NewMessage { message, .. }
            | Change::MessageEdited { message }
            | Change::MessageDeleted { message }
            | Change::ReactionUpdated { message } => Some(&message.id),
            _ => None,
        }
    }
}

/// What a subscriber actually receives: the change plus its position in the
/// broadcast sequence. Gaps in `seq` mean the subscriber was too slow and has
/// been dropped.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub seq: u64,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub change: Change,
}

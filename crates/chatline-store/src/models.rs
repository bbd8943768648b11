//! Row shapes that have no direct counterpart in `chatline_shared::models`.

use chatline_shared::{ChatId, NameKind};

/// Persisted chat metadata. Messages and the last-message pointer are
/// rebuilt from the `messages` table on restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRecord {
    pub id: ChatId,
    pub name: String,
    pub profile_picture: Option<String>,
}

/// One display-name cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub kind: NameKind,
    pub id: String,
    pub name: String,
}

/// Application name
pub const APP_NAME: &str = "chatline";

/// Server suffix of group chat identifiers
pub const GROUP_SUFFIX: &str = "@g.us";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Key derivation context for opaque reaction / poll-vote payloads (BLAKE3)
pub const KDF_CONTEXT_PAYLOAD_KEY: &str = "chatline-payload-key-v1";

/// Content shown in place of a deleted message
pub const DELETED_MARKER: &str = "[Message deleted]";

// Content labels used when a payload has no text of its own.
pub const LABEL_IMAGE: &str = "[Image]";
pub const LABEL_VIDEO: &str = "[Video]";
pub const LABEL_VOICE: &str = "[Voice message]";
pub const LABEL_AUDIO: &str = "[Audio]";
pub const LABEL_DOCUMENT: &str = "[Document]";
pub const LABEL_STICKER: &str = "[Sticker]";
pub const LABEL_CONTACT: &str = "[Contact]";
pub const LABEL_POLL: &str = "[Poll]";
pub const LABEL_POLL_VOTE: &str = "[Poll vote]";
pub const LABEL_UNKNOWN: &str = "[Unknown message type]";
pub const LABEL_UNDECODABLE_REACTION: &str = "[Undecodable reaction]";
pub const LABEL_UNDECODABLE_POLL_VOTE: &str = "[Undecodable poll vote]";

/// Protocol message type codes carrying state mutations.
pub const PROTOCOL_REVOKE: i32 = 0;
pub const PROTOCOL_MESSAGE_EDIT: i32 = 14;

/// Protocol message type code → name.
pub const PROTOCOL_TYPES: &[(i32, &str)] = &[
    (0, "REVOKE"),
    (3, "EPHEMERAL_SETTING"),
    (4, "EPHEMERAL_SYNC_RESPONSE"),
    (5, "HISTORY_SYNC_NOTIFICATION"),
    (6, "APP_STATE_SYNC_KEY_SHARE"),
    (7, "APP_STATE_SYNC_KEY_REQUEST"),
    (8, "MSG_FANOUT_BACKFILL_REQUEST"),
    (9, "INITIAL_SECURITY_NOTIFICATION_SETTING_SYNC"),
    (10, "APP_STATE_FATAL_EXCEPTION_NOTIFICATION"),
    (11, "SHARE_PHONE_NUMBER"),
    (14, "MESSAGE_EDIT"),
    (16, "PEER_DATA_OPERATION_REQUEST_MESSAGE"),
    (17, "PEER_DATA_OPERATION_REQUEST_RESPONSE_MESSAGE"),
    (18, "REQUEST_WELCOME_MESSAGE"),
    (19, "BOT_FEEDBACK_MESSAGE"),
    (20, "MEDIA_NOTIFY_MESSAGE"),
];

/// Name of a protocol message type, `UNKNOWN_<code>` when not in the table.
pub fn protocol_type_name(code: i32) -> String {
    PROTOCOL_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("UNKNOWN_{code}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_table_lookup() {
        assert_eq!(protocol_type_name(PROTOCOL_REVOKE), "REVOKE");
        assert_eq!(protocol_type_name(PROTOCOL_MESSAGE_EDIT), "MESSAGE_EDIT");
        assert_eq!(protocol_type_name(5), "HISTORY_SYNC_NOTIFICATION");
        assert_eq!(protocol_type_name(99), "UNKNOWN_99");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, MessageId, UserId};

/// All events delivered by the network layer, one per inbound frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A message stanza: new content, or a protocol signal (edit / revoke /
    /// reaction) that references an earlier message.
    Message(MessageEvent),

    /// A contact announced a new push name
    PushName(PushNameUpdate),

    /// Group metadata changed (subject)
    GroupInfo(GroupInfoUpdate),

    /// Profile picture set or removed
    Picture(PictureUpdate),

    /// Delivery / read receipts
    Receipt(ReceiptEvent),

    /// Contact online state
    Presence(PresenceUpdate),

    /// Connection lifecycle
    Connection(ConnectionEvent),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Message(_) => "message",
            InboundEvent::PushName(_) => "push_name",
            InboundEvent::GroupInfo(_) => "group_info",
            InboundEvent::Picture(_) => "picture",
            InboundEvent::Receipt(_) => "receipt",
            InboundEvent::Presence(_) => "presence",
            InboundEvent::Connection(_) => "connection",
        }
    }
}

// ---------------------------------------------------------------------------
// Message stanza
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub info: MessageInfo,
    /// Missing or empty payloads are legal and classify as unknown content.
    #[serde(default)]
    pub message: MessagePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: MessageId,
    pub chat: ChatId,
    pub sender: UserId,
    #[serde(default)]
    pub push_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub from_me: bool,
}

/// Multi-field message body; at most one content field is expected to be
/// set, but the classifier tolerates any combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagePayload {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedText>,
    pub image: Option<MediaPayload>,
    pub video: Option<MediaPayload>,
    pub audio: Option<AudioPayload>,
    pub document: Option<MediaPayload>,
    pub sticker: Option<MediaPayload>,
    pub contact: Option<ContactPayload>,
    pub location: Option<LocationPayload>,
    pub poll_creation: Option<PollCreation>,
    pub poll_update: Option<PollUpdate>,
    pub protocol: Option<ProtocolPayload>,
    pub reaction: Option<ReactionPayload>,
    pub enc_reaction: Option<EncryptedReaction>,
}

/// Reference to an earlier message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageKey {
    pub id: MessageId,
    #[serde(default)]
    pub remote_chat: Option<ChatId>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub participant: Option<UserId>,
}

/// Reply metadata attached to text and media payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextInfo {
    pub stanza_id: Option<MessageId>,
    pub participant: Option<UserId>,
    pub quoted_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedText {
    pub text: String,
    pub mentioned: Vec<UserId>,
    pub context: Option<ContextInfo>,
}

/// Image, video, document or sticker body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPayload {
    pub mime_type: Option<String>,
    pub caption: Option<String>,
    pub file_name: Option<String>,
    /// Location the media fetcher can read the bytes from.
    pub direct_path: Option<String>,
    /// Inline bytes, base64 in JSON.
    #[serde(with = "b64::option")]
    pub data: Option<Vec<u8>>,
    pub context: Option<ContextInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioPayload {
    #[serde(flatten)]
    pub media: MediaPayload,
    /// Push-to-talk: a recorded voice note rather than an audio file.
    #[serde(default)]
    pub ptt: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPayload {
    pub display_name: Option<String>,
    pub vcard: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollCreation {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Encrypted poll vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollUpdate {
    #[serde(default)]
    pub poll_key: Option<MessageKey>,
    #[serde(with = "b64")]
    pub enc_payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolPayload {
    #[serde(rename = "type")]
    pub kind: i32,
    #[serde(default)]
    pub key: Option<MessageKey>,
    /// Replacement body for `MESSAGE_EDIT`.
    #[serde(default)]
    pub edited_message: Option<Box<MessagePayload>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionPayload {
    #[serde(default)]
    pub key: Option<MessageKey>,
    /// Emoji; empty string removes the sender's reaction.
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedReaction {
    #[serde(default)]
    pub target: Option<MessageKey>,
    #[serde(with = "b64")]
    pub enc_payload: Vec<u8>,
}

/// Plaintext of an [`EncryptedReaction`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptedReaction {
    pub text: String,
}

/// Plaintext of a [`PollUpdate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptedPollVote {
    #[serde(default)]
    pub selected_options: Vec<String>,
}

// ---------------------------------------------------------------------------
// Metadata / lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushNameUpdate {
    pub user: UserId,
    pub push_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfoUpdate {
    pub chat: ChatId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureUpdate {
    pub chat: ChatId,
    /// `None` means the picture was removed.
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Delivered,
    Read,
    Played,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptEvent {
    pub chat: ChatId,
    pub sender: UserId,
    pub message_ids: Vec<MessageId>,
    pub kind: ReceiptKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub user: UserId,
    pub available: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
    LoggedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub state: ConnectionState,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Base64 (standard alphabet) encoding for byte fields in JSON.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => s.serialize_some(&STANDARD.encode(b)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
            let s = Option::<String>::deserialize(d)?;
            s.map(|s| STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_message() {
        let json = r#"{
            "type": "message",
            "info": {
                "id": "m1",
                "chat": "15550001111@s.whatsapp.net",
                "sender": "15550001111@s.whatsapp.net",
                "push_name": "Alice",
                "timestamp": "2024-03-01T10:15:30Z"
            },
            "message": { "conversation": "hello" }
        }"#;

        let event: InboundEvent = serde_json::from_str(json).unwrap();
        match event {
            InboundEvent::Message(m) => {
                assert_eq!(m.info.id.as_str(), "m1");
                assert_eq!(m.info.push_name.as_deref(), Some("Alice"));
                assert_eq!(m.message.conversation.as_deref(), Some("hello"));
                assert!(!m.info.from_me);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_missing_payload_defaults_to_empty() {
        let json = r#"{"type":"message","info":{"id":"m2","chat":"c","sender":"s","timestamp":"2024-03-01T10:15:30Z"}}"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        let InboundEvent::Message(m) = event else {
            panic!("expected message");
        };
        assert!(m.message.conversation.is_none());
        assert!(m.message.protocol.is_none());
    }

    #[test]
    fn test_inline_media_is_base64() {
        let json = r#"{"mime_type":"image/png","data":"iVBORw=="}"#;
        let media: MediaPayload = serde_json::from_str(json).unwrap();
        assert_eq!(media.data.unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_audio_flattens_media_fields() {
        let json = r#"{"mime_type":"audio/ogg","ptt":true}"#;
        let audio: AudioPayload = serde_json::from_str(json).unwrap();
        assert!(audio.ptt);
        assert_eq!(audio.media.mime_type.as_deref(), Some("audio/ogg"));
    }

    #[test]
    fn test_protocol_type_field() {
        let json = r#"{"type":0,"key":{"id":"m1"}}"#;
        let p: ProtocolPayload = serde_json::from_str(json).unwrap();
        assert_eq!(p.kind, 0);
        assert_eq!(p.key.unwrap().id.as_str(), "m1");
    }
}

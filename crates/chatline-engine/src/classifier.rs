//! Content Classifier.
//!
//! Maps one inbound message stanza to exactly one [`Classified`] outcome.
//! Classification never fails: malformed or unknown payloads degrade to a
//! label, undecryptable opaque payloads degrade to an "undecodable"
//! placeholder, and control signals missing their target key come back as
//! [`Classified::Unclassified`] for the caller to log and drop.
//!
//! Media bytes are not fetched here; a [`NewMessage`] carrying media holds a
//! [`PendingMedia`] descriptor for the media resolver.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use chatline_shared::constants::*;
use chatline_shared::crypto::{self, derive_payload_key, SymmetricKey};
use chatline_shared::error::DecodeError;
use chatline_shared::protocol::{
    ContextInfo, DecryptedPollVote, DecryptedReaction, MediaPayload, MessageEvent, MessageKey,
    MessagePayload, ProtocolPayload,
};
use chatline_shared::{ChatId, Message, MessageId, ProtocolInfo, QuotedMessage, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// Media announced by a message, resolved after classification.
#[derive(Debug, Clone)]
pub struct PendingMedia {
    pub kind: MediaKind,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
    pub direct_path: Option<String>,
    pub data: Option<Bytes>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Sender name is the bare identifier until the ingest step resolves it.
    pub message: Message,
    pub media: Option<PendingMedia>,
    /// Push name announced with the message, if any.
    pub push_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EditSignal {
    pub target: MessageId,
    pub chat: ChatId,
    pub editor: UserId,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct DeleteSignal {
    pub target: MessageId,
    pub chat: ChatId,
    pub revoked_by: UserId,
}

#[derive(Debug, Clone)]
pub struct ReactionSignal {
    pub target: MessageId,
    pub chat: ChatId,
    pub sender: UserId,
    /// Empty means the sender withdrew their reaction.
    pub emoji: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Classified {
    NewMessage(Box<NewMessage>),
    Edit(EditSignal),
    Delete(DeleteSignal),
    Reaction(ReactionSignal),
    Unclassified { id: MessageId, reason: &'static str },
}

impl Classified {
    pub fn kind(&self) -> &'static str {
        match self {
            Classified::NewMessage(_) => "new_message",
            Classified::Edit(_) => "edit",
            Classified::Delete(_) => "delete",
            Classified::Reaction(_) => "reaction",
            Classified::Unclassified { .. } => "unclassified",
        }
    }
}

/// Text and side data pulled out of a payload by the precedence chain.
#[derive(Debug, Default)]
struct Extracted {
    content: String,
    media: Option<PendingMedia>,
    quoted: Option<QuotedMessage>,
    protocol: Option<ProtocolInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    payload_key: Option<SymmetricKey>,
}

impl Classifier {
    pub fn new(payload_key: Option<SymmetricKey>) -> Self {
        Self { payload_key }
    }

    pub fn classify(&self, event: &MessageEvent) -> Classified {
        let info = &event.info;
        let payload = &event.message;

        if let Some(protocol) = &payload.protocol {
            match protocol.kind {
                PROTOCOL_REVOKE => return self.revoke(event, protocol),
                PROTOCOL_MESSAGE_EDIT => return self.edit(event, protocol),
                _ => {}
            }
        }

        if let Some(reaction) = &payload.reaction {
            return match &reaction.key {
                Some(key) => Classified::Reaction(ReactionSignal {
                    target: key.id.clone(),
                    chat: target_chat(key, &info.chat),
                    sender: info.sender.clone(),
                    emoji: reaction.text.clone(),
                    timestamp: info.timestamp,
                }),
                None => Classified::Unclassified {
                    id: info.id.clone(),
                    reason: "reaction without target key",
                },
            };
        }

        if let Some(enc) = &payload.enc_reaction {
            let Some(target) = &enc.target else {
                return Classified::Unclassified {
                    id: info.id.clone(),
                    reason: "encrypted reaction without target key",
                };
            };
            return match self.open::<DecryptedReaction>(&target.id, &info.sender, &enc.enc_payload)
            {
                Ok(reaction) => Classified::Reaction(ReactionSignal {
                    target: target.id.clone(),
                    chat: target_chat(target, &info.chat),
                    sender: info.sender.clone(),
                    emoji: reaction.text,
                    timestamp: info.timestamp,
                }),
                Err(e) => {
                    debug!(id = %info.id, error = %e, "encrypted reaction undecodable");
                    self.new_message(
                        event,
                        Extracted {
                            content: LABEL_UNDECODABLE_REACTION.to_string(),
                            ..Default::default()
                        },
                    )
                }
            };
        }

        let extracted = self.extract(payload, &info.sender);
        self.new_message(event, extracted)
    }

    fn revoke(&self, event: &MessageEvent, protocol: &ProtocolPayload) -> Classified {
        match &protocol.key {
            Some(key) => Classified::Delete(DeleteSignal {
                target: key.id.clone(),
                chat: target_chat(key, &event.info.chat),
                revoked_by: event.info.sender.clone(),
            }),
            None => Classified::Unclassified {
                id: event.info.id.clone(),
                reason: "revoke without target key",
            },
        }
    }

    fn edit(&self, event: &MessageEvent, protocol: &ProtocolPayload) -> Classified {
        match (&protocol.key, &protocol.edited_message) {
            (Some(key), Some(edited)) => Classified::Edit(EditSignal {
                target: key.id.clone(),
                chat: target_chat(key, &event.info.chat),
                editor: event.info.sender.clone(),
                content: self.extract(edited, &event.info.sender).content,
            }),
            (None, _) => Classified::Unclassified {
                id: event.info.id.clone(),
                reason: "edit without target key",
            },
            (Some(_), None) => Classified::Unclassified {
                id: event.info.id.clone(),
                reason: "edit without replacement content",
            },
        }
    }

    fn new_message(&self, event: &MessageEvent, extracted: Extracted) -> Classified {
        let info = &event.info;
        let mut message = Message::new(
            info.id.clone(),
            info.chat.clone(),
            info.sender.clone(),
            extracted.content,
            info.timestamp,
        );
        message.from_me = info.from_me;
        message.has_media = extracted.media.is_some();
        message.quoted = extracted.quoted;
        message.protocol = extracted.protocol;

        Classified::NewMessage(Box::new(NewMessage {
            message,
            media: extracted.media,
            push_name: info
                .push_name
                .as_ref()
                .filter(|n| !n.trim().is_empty())
                .cloned(),
        }))
    }

    /// Content precedence chain; the first populated field wins.
    fn extract(&self, payload: &MessagePayload, sender: &UserId) -> Extracted {
        if let Some(text) = payload.conversation.as_ref().filter(|t| !t.trim().is_empty()) {
            return text_only(text.clone());
        }

        if let Some(ext) = &payload.extended_text {
            let content = if ext.mentioned.is_empty() {
                ext.text.clone()
            } else {
                format!("{} [{} mentioned]", ext.text, ext.mentioned.len())
            };
            return Extracted {
                content,
                quoted: quoted_from(ext.context.as_ref()),
                ..Default::default()
            };
        }

        if let Some(image) = &payload.image {
            return media_extract(MediaKind::Image, image, caption_or(image, LABEL_IMAGE));
        }

        if let Some(video) = &payload.video {
            return media_extract(MediaKind::Video, video, caption_or(video, LABEL_VIDEO));
        }

        if let Some(audio) = &payload.audio {
            let label = if audio.ptt { LABEL_VOICE } else { LABEL_AUDIO };
            return media_extract(MediaKind::Audio, &audio.media, label.to_string());
        }

        if let Some(doc) = &payload.document {
            let content = match doc.file_name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => format!("[Document: {name}]"),
                None => LABEL_DOCUMENT.to_string(),
            };
            return media_extract(MediaKind::Document, doc, content);
        }

        if let Some(sticker) = &payload.sticker {
            return media_extract(MediaKind::Sticker, sticker, LABEL_STICKER.to_string());
        }

        if let Some(contact) = &payload.contact {
            return text_only(match contact.display_name.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => format!("[Contact: {name}]"),
                None => LABEL_CONTACT.to_string(),
            });
        }

        if let Some(loc) = &payload.location {
            return text_only(format!(
                "[Location: {:.6}, {:.6}]",
                loc.latitude, loc.longitude
            ));
        }

        if let Some(poll) = &payload.poll_creation {
            return text_only(format!(
                "{} {}: {}",
                LABEL_POLL,
                poll.name,
                poll.options.join(", ")
            ));
        }

        if let Some(vote) = &payload.poll_update {
            return text_only(self.poll_vote_content(vote.poll_key.as_ref(), sender, &vote.enc_payload));
        }

        if let Some(protocol) = &payload.protocol {
            let name = protocol_type_name(protocol.kind);
            return Extracted {
                content: format!("[Protocol: {name}]"),
                protocol: Some(ProtocolInfo {
                    code: protocol.kind,
                    name,
                }),
                ..Default::default()
            };
        }

        text_only(LABEL_UNKNOWN.to_string())
    }

    fn poll_vote_content(&self, poll_key: Option<&MessageKey>, sender: &UserId, data: &[u8]) -> String {
        let Some(key) = poll_key else {
            return LABEL_UNDECODABLE_POLL_VOTE.to_string();
        };
        match self.open::<DecryptedPollVote>(&key.id, sender, data) {
            Ok(vote) if vote.selected_options.is_empty() => LABEL_POLL_VOTE.to_string(),
            Ok(vote) => format!("{} {}", LABEL_POLL_VOTE, vote.selected_options.join(", ")),
            Err(e) => {
                debug!(poll = %key.id, error = %e, "poll vote undecodable");
                LABEL_UNDECODABLE_POLL_VOTE.to_string()
            }
        }
    }

    /// Decrypt and parse an opaque payload addressed to `target` by `sender`.
    fn open<T: DeserializeOwned>(
        &self,
        target: &MessageId,
        sender: &UserId,
        data: &[u8],
    ) -> Result<T, DecodeError> {
        let master = self.payload_key.as_ref().ok_or(DecodeError::MissingKey)?;
        let key = derive_payload_key(master, target.as_str(), sender.as_str());
        let plaintext = crypto::decrypt(&key, data)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

fn text_only(content: String) -> Extracted {
    Extracted {
        content,
        ..Default::default()
    }
}

fn caption_or(media: &MediaPayload, label: &str) -> String {
    media
        .caption
        .as_ref()
        .filter(|c| !c.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| label.to_string())
}

fn media_extract(kind: MediaKind, media: &MediaPayload, content: String) -> Extracted {
    Extracted {
        content,
        media: Some(PendingMedia {
            kind,
            mime_type: media.mime_type.clone(),
            file_name: media.file_name.clone(),
            direct_path: media.direct_path.clone(),
            data: media.data.clone().map(Bytes::from),
        }),
        quoted: quoted_from(media.context.as_ref()),
        protocol: None,
    }
}

fn quoted_from(context: Option<&ContextInfo>) -> Option<QuotedMessage> {
    let context = context?;
    let id = context.stanza_id.clone()?;
    Some(QuotedMessage {
        id,
        sender: context.participant.clone(),
        content: context.quoted_text.clone().unwrap_or_default(),
    })
}

fn target_chat(key: &MessageKey, fallback: &ChatId) -> ChatId {
    key.remote_chat.clone().unwrap_or_else(|| fallback.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_shared::protocol::{
        AudioPayload, ContactPayload, EncryptedReaction, ExtendedText, LocationPayload,
        MessageInfo, PollCreation, PollUpdate, ReactionPayload,
    };
    use chrono::TimeZone;

    const MASTER: SymmetricKey = [9u8; 32];

    fn event(payload: MessagePayload) -> MessageEvent {
        MessageEvent {
            info: MessageInfo {
                id: MessageId::from("m1"),
                chat: ChatId::from("c1@s.whatsapp.net"),
                sender: UserId::from("u1@s.whatsapp.net"),
                push_name: Some("Alice".to_string()),
                timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap(),
                from_me: false,
            },
            message: payload,
        }
    }

    fn key(id: &str) -> Option<MessageKey> {
        Some(MessageKey {
            id: MessageId::from(id),
            remote_chat: None,
            from_me: false,
            participant: None,
        })
    }

    fn content_of(outcome: Classified) -> (String, Message, Option<PendingMedia>) {
        match outcome {
            Classified::NewMessage(n) => (n.message.content.clone(), n.message, n.media),
            other => panic!("expected new message, got {}", other.kind()),
        }
    }

    fn classify(payload: MessagePayload) -> Classified {
        Classifier::new(Some(MASTER)).classify(&event(payload))
    }

    fn sealed<T: serde::Serialize>(target: &str, sender: &str, value: &T) -> Vec<u8> {
        let key = derive_payload_key(&MASTER, target, sender);
        crypto::encrypt(&key, &serde_json::to_vec(value).unwrap()).unwrap()
    }

    #[test]
    fn test_plain_text() {
        let (content, msg, media) = content_of(classify(MessagePayload {
            conversation: Some("hello".to_string()),
            ..Default::default()
        }));
        assert_eq!(content, "hello");
        assert!(!msg.has_media);
        assert!(media.is_none());
        assert_eq!(msg.sender_name, "u1");
    }

    #[test]
    fn test_text_beats_image() {
        let (content, msg, _) = content_of(classify(MessagePayload {
            conversation: Some("caption-less text".to_string()),
            image: Some(MediaPayload::default()),
            ..Default::default()
        }));
        assert_eq!(content, "caption-less text");
        assert!(!msg.has_media);
    }

    #[test]
    fn test_extended_text_with_mentions_and_quote() {
        let (content, msg, _) = content_of(classify(MessagePayload {
            extended_text: Some(ExtendedText {
                text: "look @bob".to_string(),
                mentioned: vec![UserId::from("bob@s.whatsapp.net")],
                context: Some(ContextInfo {
                    stanza_id: Some(MessageId::from("m0")),
                    participant: Some(UserId::from("bob@s.whatsapp.net")),
                    quoted_text: Some("original".to_string()),
                }),
            }),
            ..Default::default()
        }));
        assert_eq!(content, "look @bob [1 mentioned]");
        let quoted = msg.quoted.unwrap();
        assert_eq!(quoted.id.as_str(), "m0");
        assert_eq!(quoted.content, "original");
    }

    #[test]
    fn test_media_labels() {
        let (content, msg, media) = content_of(classify(MessagePayload {
            image: Some(MediaPayload {
                caption: Some("sunset".to_string()),
                mime_type: Some("image/jpeg".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }));
        assert_eq!(content, "sunset");
        assert!(msg.has_media);
        assert_eq!(media.unwrap().kind, MediaKind::Image);

        let (content, _, _) = content_of(classify(MessagePayload {
            video: Some(MediaPayload::default()),
            ..Default::default()
        }));
        assert_eq!(content, LABEL_VIDEO);

        let (content, _, _) = content_of(classify(MessagePayload {
            audio: Some(AudioPayload {
                media: MediaPayload::default(),
                ptt: true,
            }),
            ..Default::default()
        }));
        assert_eq!(content, LABEL_VOICE);

        let (content, _, _) = content_of(classify(MessagePayload {
            audio: Some(AudioPayload::default()),
            ..Default::default()
        }));
        assert_eq!(content, LABEL_AUDIO);

        let (content, _, media) = content_of(classify(MessagePayload {
            document: Some(MediaPayload {
                file_name: Some("report.pdf".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }));
        assert_eq!(content, "[Document: report.pdf]");
        assert_eq!(media.unwrap().file_name.as_deref(), Some("report.pdf"));

        let (content, _, _) = content_of(classify(MessagePayload {
            sticker: Some(MediaPayload::default()),
            ..Default::default()
        }));
        assert_eq!(content, LABEL_STICKER);
    }

    #[test]
    fn test_contact_location_poll() {
        let (content, _, _) = content_of(classify(MessagePayload {
            contact: Some(ContactPayload {
                display_name: Some("Carol".to_string()),
                vcard: None,
            }),
            ..Default::default()
        }));
        assert_eq!(content, "[Contact: Carol]");

        let (content, _, _) = content_of(classify(MessagePayload {
            location: Some(LocationPayload {
                latitude: 52.52,
                longitude: 13.404954,
                name: None,
            }),
            ..Default::default()
        }));
        assert_eq!(content, "[Location: 52.520000, 13.404954]");

        let (content, _, _) = content_of(classify(MessagePayload {
            poll_creation: Some(PollCreation {
                name: "Lunch?".to_string(),
                options: vec!["Pizza".to_string(), "Sushi".to_string()],
            }),
            ..Default::default()
        }));
        assert_eq!(content, "[Poll] Lunch?: Pizza, Sushi");
    }

    #[test]
    fn test_poll_vote_decrypts_or_degrades() {
        let payload = sealed(
            "poll1",
            "u1@s.whatsapp.net",
            &DecryptedPollVote {
                selected_options: vec!["Sushi".to_string()],
            },
        );
        let vote = MessagePayload {
            poll_update: Some(PollUpdate {
                poll_key: key("poll1"),
                enc_payload: payload,
            }),
            ..Default::default()
        };

        let (content, _, _) = content_of(classify(vote.clone()));
        assert_eq!(content, "[Poll vote] Sushi");

        let (content, _, _) = content_of(Classifier::default().classify(&event(vote)));
        assert_eq!(content, LABEL_UNDECODABLE_POLL_VOTE);
    }

    #[test]
    fn test_system_protocol_message() {
        let (content, msg, _) = content_of(classify(MessagePayload {
            protocol: Some(ProtocolPayload {
                kind: 5,
                key: None,
                edited_message: None,
            }),
            ..Default::default()
        }));
        assert_eq!(content, "[Protocol: HISTORY_SYNC_NOTIFICATION]");
        assert_eq!(msg.protocol.unwrap().code, 5);
    }

    #[test]
    fn test_empty_payload_is_unknown() {
        let (content, _, _) = content_of(classify(MessagePayload::default()));
        assert_eq!(content, LABEL_UNKNOWN);
    }

    #[test]
    fn test_revoke() {
        match classify(MessagePayload {
            protocol: Some(ProtocolPayload {
                kind: PROTOCOL_REVOKE,
                key: key("m0"),
                edited_message: None,
            }),
            ..Default::default()
        }) {
            Classified::Delete(d) => {
                assert_eq!(d.target.as_str(), "m0");
                assert_eq!(d.chat.as_str(), "c1@s.whatsapp.net");
            }
            other => panic!("expected delete, got {}", other.kind()),
        }
    }

    #[test]
    fn test_control_without_key_is_unclassified() {
        let revoke = classify(MessagePayload {
            protocol: Some(ProtocolPayload {
                kind: PROTOCOL_REVOKE,
                key: None,
                edited_message: None,
            }),
            ..Default::default()
        });
        assert!(matches!(revoke, Classified::Unclassified { .. }));

        let edit = classify(MessagePayload {
            protocol: Some(ProtocolPayload {
                kind: PROTOCOL_MESSAGE_EDIT,
                key: None,
                edited_message: Some(Box::new(MessagePayload {
                    conversation: Some("x".to_string()),
                    ..Default::default()
                })),
            }),
            ..Default::default()
        });
        assert!(matches!(edit, Classified::Unclassified { .. }));

        let reaction = classify(MessagePayload {
            reaction: Some(ReactionPayload {
                key: None,
                text: "👍".to_string(),
            }),
            ..Default::default()
        });
        assert!(matches!(reaction, Classified::Unclassified { .. }));
    }

    #[test]
    fn test_edit_extracts_new_content() {
        match classify(MessagePayload {
            protocol: Some(ProtocolPayload {
                kind: PROTOCOL_MESSAGE_EDIT,
                key: key("m0"),
                edited_message: Some(Box::new(MessagePayload {
                    conversation: Some("hello world".to_string()),
                    ..Default::default()
                })),
            }),
            ..Default::default()
        }) {
            Classified::Edit(e) => {
                assert_eq!(e.target.as_str(), "m0");
                assert_eq!(e.content, "hello world");
            }
            other => panic!("expected edit, got {}", other.kind()),
        }
    }

    #[test]
    fn test_reaction_plain_and_encrypted() {
        match classify(MessagePayload {
            reaction: Some(ReactionPayload {
                key: key("m0"),
                text: "👍".to_string(),
            }),
            ..Default::default()
        }) {
            Classified::Reaction(r) => {
                assert_eq!(r.target.as_str(), "m0");
                assert_eq!(r.emoji, "👍");
                assert_eq!(r.sender.as_str(), "u1@s.whatsapp.net");
            }
            other => panic!("expected reaction, got {}", other.kind()),
        }

        let enc = MessagePayload {
            enc_reaction: Some(EncryptedReaction {
                target: key("m0"),
                enc_payload: sealed(
                    "m0",
                    "u1@s.whatsapp.net",
                    &DecryptedReaction {
                        text: "😂".to_string(),
                    },
                ),
            }),
            ..Default::default()
        };
        match classify(enc.clone()) {
            Classified::Reaction(r) => assert_eq!(r.emoji, "😂"),
            other => panic!("expected reaction, got {}", other.kind()),
        }

        // Without the master key the payload cannot be opened.
        let (content, _, _) = content_of(Classifier::default().classify(&event(enc)));
        assert_eq!(content, LABEL_UNDECODABLE_REACTION);
    }

    #[test]
    fn test_push_name_carried() {
        match classify(MessagePayload {
            conversation: Some("hi".to_string()),
            ..Default::default()
        }) {
            Classified::NewMessage(n) => assert_eq!(n.push_name.as_deref(), Some("Alice")),
            other => panic!("expected new message, got {}", other.kind()),
        }
    }
}

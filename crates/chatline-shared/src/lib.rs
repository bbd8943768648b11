//! # chatline-shared
//!
//! Types shared by every chatline crate: identifiers, the canonical chat and
//! message models, the inbound event union produced by the network layer, and
//! the payload crypto used for opaque reaction and poll-vote payloads.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use models::{Chat, Message, ProtocolInfo, QuotedMessage, Reaction};
pub use types::{ChatId, MessageId, NameKind, UserId};

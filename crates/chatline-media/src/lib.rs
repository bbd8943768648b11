//! # chatline-media
//!
//! Media Resolver: persists message media to content storage and returns a
//! stable reference path.
//!
//! Layout: `{base}/{chat}/{YYYY-MM-DD}/{HH-MM-SS}_{sender}_ID{message-id}.{ext}`
//! with every name component sanitized. The path is a pure function of the
//! request and the bytes, so re-resolving a message yields the same path.

pub mod error;
pub mod mime;
pub mod resolver;

pub use error::MediaError;
pub use resolver::{sanitize_component, MediaRequest, MediaResolver};

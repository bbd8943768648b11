use thiserror::Error;

use chatline_media::MediaError;
use chatline_shared::error::DecodeError;
use chatline_store::StoreError;

/// Errors raised by engine collaborators.
///
/// None of these ever reach query or fanout consumers: the ingest pipeline
/// logs them and degrades (fallback names, messages without media, state kept
/// in memory only).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Name lookup failed: {0}")]
    Lookup(String),

    #[error("Media fetch failed: {0}")]
    Fetch(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Background task failed: {0}")]
    Task(String),
}

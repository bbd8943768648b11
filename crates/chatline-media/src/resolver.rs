use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use chatline_shared::MessageId;

use crate::error::MediaError;
use crate::mime::choose_extension;

/// Characters that are unsafe in a path component on some platform.
const UNSAFE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Metadata needed to place one message's media.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub chat_name: String,
    pub sender_name: String,
    pub timestamp: DateTime<Utc>,
    pub message_id: MessageId,
    pub mime_type: Option<String>,
    pub file_name: Option<String>,
}

/// Replace path-unsafe characters with `_`.
///
/// Control characters are replaced too, and a component made only of dots
/// (`.`/`..`) is neutralised so it can never address a parent directory.
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    if replaced.is_empty() {
        return "unknown".to_string();
    }
    if replaced.chars().all(|c| c == '.') {
        return "_".repeat(replaced.len());
    }
    replaced
}

/// Verify that a relative path only descends below the base directory.
fn ensure_within(base: &Path, relative: &Path) -> Result<PathBuf, MediaError> {
    let mut resolved = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(c) => resolved.push(c),
            _ => {
                return Err(MediaError::PathTraversal(relative.display().to_string()));
            }
        }
    }
    Ok(resolved)
}

#[derive(Debug, Clone)]
pub struct MediaResolver {
    base_path: PathBuf,
    max_size: usize,
}

impl MediaResolver {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, MediaError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            MediaError::Storage(format!(
                "Failed to create media directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        info!(path = %base_path.display(), "Media resolver initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Deterministic storage path for a request; touches no filesystem state.
    pub fn path_for(&self, request: &MediaRequest, data: &[u8]) -> Result<PathBuf, MediaError> {
        let ext = choose_extension(
            data,
            request.mime_type.as_deref(),
            request.file_name.as_deref(),
        );

        let file_name = format!(
            "{}_{}_ID{}.{}",
            request.timestamp.format("%H-%M-%S"),
            sanitize_component(&request.sender_name),
            sanitize_component(request.message_id.as_str()),
            ext
        );

        let relative = PathBuf::from(sanitize_component(&request.chat_name))
            .join(request.timestamp.format("%Y-%m-%d").to_string())
            .join(file_name);

        ensure_within(&self.base_path, &relative)
    }

    /// Write the media and return its path.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a re-delivery of the same message overwrites the same file atomically.
    pub async fn store(&self, request: &MediaRequest, data: &Bytes) -> Result<PathBuf, MediaError> {
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        if data.len() > self.max_size {
            return Err(MediaError::TooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let path = self.path_for(request, data)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MediaError::Storage(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let tmp = path.with_extension("part");
        fs::write(&tmp, data).await.map_err(|e| {
            MediaError::Storage(format!("Failed to write media {}: {}", request.message_id, e))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            MediaError::Storage(format!("Failed to move media {}: {}", request.message_id, e))
        })?;

        debug!(
            message_id = %request.message_id,
            path = %path.display(),
            size = data.len(),
            "Stored media"
        );
        Ok(path)
    }
}

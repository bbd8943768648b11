use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncReadExt;

use crate::classifier::PendingMedia;
use crate::error::EngineError;

/// Retrieves the raw bytes of a message's media.
#[async_trait]
pub trait MediaFetch: Send + Sync {
    async fn fetch(&self, media: &PendingMedia) -> Result<Bytes, EngineError>;
}

/// Uses bytes shipped inline with the event, otherwise reads `direct_path`
/// from the local filesystem.
///
/// A direct path may only descend below `root`. Without a root, only relative
/// paths are accepted. Reads stop at `max_size` bytes and only regular files
/// are opened.
pub struct InlineFetch {
    root: Option<PathBuf>,
    max_size: usize,
}

impl InlineFetch {
    pub fn new(root: Option<PathBuf>, max_size: usize) -> Self {
        Self { root, max_size }
    }

    fn locate(&self, direct: &str) -> Result<PathBuf, EngineError> {
        let requested = Path::new(direct);
        let (base, relative) = match &self.root {
            Some(root) => (root.clone(), Path::new(direct.trim_start_matches('/'))),
            None if requested.is_absolute() => {
                return Err(EngineError::Fetch(format!(
                    "absolute media path without a source root: {direct}"
                )));
            }
            None => (PathBuf::new(), requested),
        };

        let mut resolved = base;
        for component in relative.components() {
            match component {
                Component::Normal(c) => resolved.push(c),
                _ => {
                    return Err(EngineError::Fetch(format!(
                        "media path leaves the source root: {direct}"
                    )));
                }
            }
        }
        Ok(resolved)
    }

    async fn read_capped(&self, path: &Path) -> Result<Bytes, EngineError> {
        let fail = |e: std::io::Error| EngineError::Fetch(format!("{}: {e}", path.display()));

        let file = tokio::fs::File::open(path).await.map_err(fail)?;
        let meta = file.metadata().await.map_err(fail)?;
        if !meta.is_file() {
            return Err(EngineError::Fetch(format!("{}: not a regular file", path.display())));
        }
        if meta.len() > self.max_size as u64 {
            return Err(EngineError::Fetch(format!(
                "{}: {} bytes exceeds limit of {}",
                path.display(),
                meta.len(),
                self.max_size
            )));
        }

        // The file may grow after the metadata check.
        let mut data = Vec::with_capacity(meta.len() as usize);
        file.take(self.max_size as u64 + 1)
            .read_to_end(&mut data)
            .await
            .map_err(fail)?;
        if data.len() > self.max_size {
            return Err(EngineError::Fetch(format!(
                "{}: exceeds limit of {} bytes",
                path.display(),
                self.max_size
            )));
        }
        Ok(Bytes::from(data))
    }
}

#[async_trait]
impl MediaFetch for InlineFetch {
    async fn fetch(&self, media: &PendingMedia) -> Result<Bytes, EngineError> {
        if let Some(data) = &media.data {
            return Ok(data.clone());
        }

        let direct = media
            .direct_path
            .as_deref()
            .ok_or_else(|| EngineError::Fetch("no inline data and no direct path".to_string()))?;

        let path = self.locate(direct)?;
        self.read_capped(&path).await
    }
}

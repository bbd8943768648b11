use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Empty media payload")]
    Empty,

    #[error("Media too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Path traversal detected in {0}")]
    PathTraversal(String),

    #[error("Media storage error: {0}")]
    Storage(String),
}

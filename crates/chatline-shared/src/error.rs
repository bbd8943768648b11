use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Could not seal payload")]
    EncryptionFailed,

    /// Wrong key, tampered body or truncated nonce.
    #[error("Could not open sealed payload")]
    DecryptionFailed,

    #[error("Payload key must be 32 bytes")]
    InvalidKeyLength,
}

/// Failure to turn an opaque payload into a typed value.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No payload key configured")]
    MissingKey,

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

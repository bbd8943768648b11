//! Sealing for opaque reaction and poll-vote payloads.
//!
//! A sealed payload is the 24-byte XChaCha20 nonce followed by the
//! Poly1305-tagged ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::constants::{KDF_CONTEXT_PAYLOAD_KEY, NONCE_SIZE, SYMMETRIC_KEY_SIZE};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; SYMMETRIC_KEY_SIZE];

pub fn generate_symmetric_key() -> SymmetricKey {
    let mut key = SymmetricKey::default();
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

pub fn key_from_slice(bytes: &[u8]) -> Result<SymmetricKey, CryptoError> {
    SymmetricKey::try_from(bytes).map_err(|_| CryptoError::InvalidKeyLength)
}

pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut sealed = vec![0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut sealed);

    let body = XChaCha20Poly1305::new(key.into())
        .encrypt(XNonce::from_slice(&sealed), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;
    sealed.extend_from_slice(&body);
    Ok(sealed)
}

pub fn decrypt(key: &SymmetricKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }
    let (nonce, body) = sealed.split_at(NONCE_SIZE);
    XChaCha20Poly1305::new(key.into())
        .decrypt(XNonce::from_slice(nonce), body)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Per-message key for opaque reaction and poll-vote payloads.
///
/// Bound to the targeted message and the sender.
pub fn derive_payload_key(master: &SymmetricKey, message_id: &str, sender: &str) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_PAYLOAD_KEY);
    hasher.update(master);
    hasher.update(message_id.as_bytes());
    hasher.update(&[0u8]);
    hasher.update(sender.as_bytes());
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sealed_reaction_opens_with_same_key() {
        let key = generate_symmetric_key();
        let plaintext = r#"{"emoji":"👍"}"#.as_bytes();

        let sealed = encrypt(&key, plaintext).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + plaintext.len() + 16);
        assert_eq!(decrypt(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_foreign_key_or_truncation_rejected() {
        let sealed = encrypt(&generate_symmetric_key(), b"vote").unwrap();
        assert!(decrypt(&generate_symmetric_key(), &sealed).is_err());
        assert!(decrypt(&generate_symmetric_key(), &sealed[..10]).is_err());
    }

    #[test]
    fn test_payload_key_binds_message_and_sender() {
        let master = [7u8; 32];
        let a = derive_payload_key(&master, "m1", "u1");
        assert_eq!(a, derive_payload_key(&master, "m1", "u1"));
        assert_ne!(a, derive_payload_key(&master, "m2", "u1"));
        assert_ne!(a, derive_payload_key(&master, "m1", "u2"));
        // The separator keeps ("m1", "u1x") and ("m1u", "1x") apart.
        assert_ne!(
            derive_payload_key(&master, "m1", "u1x"),
            derive_payload_key(&master, "m1u", "1x")
        );
    }

    #[test]
    fn test_key_from_slice_length() {
        assert_eq!(key_from_slice(&[1u8; 32]).unwrap(), [1u8; 32]);
        assert!(matches!(
            key_from_slice(&[1u8; 16]),
            Err(CryptoError::InvalidKeyLength)
        ));
    }
}

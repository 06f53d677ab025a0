use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::crypto::EncryptionKeyPair;
use crate::error::{Error, Result};

pub const NONCE_SIZE: usize = 12;

const MESSAGE_KEY_INFO: &[u8] = b"umbra-message-encryption-v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

/// AES-256-GCM key.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Key shared by both participants of a conversation.
///
/// X25519 agreement, then HKDF salted with the conversation id so each
/// conversation between the same pair gets its own key.
pub fn conversation_key(
    ours: &EncryptionKeyPair,
    their_public: &[u8; 32],
    conversation_id: &[u8],
) -> Result<EncryptionKey> {
    let shared = ours.diffie_hellman(their_public);
    if shared.iter().all(|b| *b == 0) {
        return Err(Error::KeyExchangeFailed("low-order public key".into()));
    }

    let hkdf = Hkdf::<Sha256>::new(Some(conversation_id), &shared);
    let mut key = [0u8; 32];
    hkdf.expand(MESSAGE_KEY_INFO, &mut key)
        .map_err(|_| Error::KeyDerivationFailed("HKDF expansion failed".into()))?;
    Ok(EncryptionKey(key))
}

pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid key: {}", e)))?;

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(&nonce.0), Payload { msg: plaintext, aad })
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

    Ok((nonce, ciphertext))
}

pub fn decrypt(key: &EncryptionKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(&nonce.0), Payload { msg: ciphertext, aad })
        .map_err(|_| Error::DecryptionFailed("authentication tag mismatch".into()))
}

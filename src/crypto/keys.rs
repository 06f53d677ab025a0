//! Identity key pairs.
//!
//! Both halves of a [`KeyPair`] are derived from one seed so that a
//! recovery phrase restores the exact same DID and encryption key.

use ed25519_dalek::{SigningKey, VerifyingKey};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

const SIGNING_KEY_INFO: &[u8] = b"umbra-signing-key-v1";
const ENCRYPTION_KEY_INFO: &[u8] = b"umbra-encryption-key-v1";

/// Signing and encryption keys of one identity.
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    pub signing: SigningKeyPair,
    pub encryption: EncryptionKeyPair,
}

impl KeyPair {
    /// Derive both key pairs from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, seed);

        let mut signing = [0u8; 32];
        hkdf.expand(SIGNING_KEY_INFO, &mut signing)
            .map_err(|_| Error::KeyDerivationFailed("Failed to derive signing key".into()))?;

        let mut encryption = [0u8; 32];
        hkdf.expand(ENCRYPTION_KEY_INFO, &mut encryption)
            .map_err(|_| Error::KeyDerivationFailed("Failed to derive encryption key".into()))?;

        let pair = Self {
            signing: SigningKeyPair::from_bytes(&signing),
            encryption: EncryptionKeyPair::from_bytes(&encryption),
        };
        signing.zeroize();
        encryption.zeroize();
        Ok(pair)
    }

    pub fn public_keys(&self) -> PublicKey {
        PublicKey {
            signing: self.signing.public_bytes(),
            encryption: self.encryption.public_bytes(),
        }
    }
}

/// Ed25519 key pair.
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)] // SigningKey zeroizes itself
    secret: SigningKey,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(bytes),
        }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.secret.verifying_key().to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.secret
    }
}

/// X25519 key pair.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    #[zeroize(skip)] // StaticSecret zeroizes itself
    secret: StaticSecret,
    #[zeroize(skip)]
    public: X25519PublicKey,
}

impl EncryptionKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let secret = StaticSecret::from(*bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let their_public = X25519PublicKey::from(*their_public);
        self.secret.diffie_hellman(&their_public).to_bytes()
    }
}

/// Public half of a [`KeyPair`], hex encoded on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicKey {
    #[serde(with = "hex_key")]
    pub signing: [u8; 32],
    #[serde(with = "hex_key")]
    pub encryption: [u8; 32],
}

impl PublicKey {
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.signing)
            .map_err(|e| Error::InvalidKey(format!("Invalid signing public key: {}", e)))
    }
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 key bytes"))
    }
}

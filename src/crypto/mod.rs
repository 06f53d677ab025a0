//! # Cryptography
//!
//! Key material and primitives used by the native core: Ed25519 signing,
//! X25519 key agreement, HKDF-SHA256 derivation and AES-256-GCM.
//!
//! ```text
//! 32-byte seed (from the recovery phrase)
//!      │
//!      ├── HKDF "umbra-signing-key-v1"     ──► Ed25519 (DID, signatures)
//!      └── HKDF "umbra-encryption-key-v1"  ──► X25519  (conversation keys)
//! ```

mod encryption;
mod keys;
mod signing;

pub use encryption::{conversation_key, decrypt, encrypt, EncryptionKey, Nonce, NONCE_SIZE};
pub use keys::{EncryptionKeyPair, KeyPair, PublicKey, SigningKeyPair};
pub use signing::{sign, verify, Signature, SIGNATURE_SIZE};

//! `did:key` identifiers for Ed25519 public keys.
//!
//! `did:key:z<base58btc(0xed 0x01 || public_key)>`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DID_KEY_PREFIX: &str = "did:key:";

const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did {
    value: String,
    key: [u8; 32],
}

impl Did {
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut bytes = Vec::with_capacity(34);
        bytes.extend_from_slice(&ED25519_MULTICODEC);
        bytes.extend_from_slice(public_key);

        Self {
            value: format!("{}z{}", DID_KEY_PREFIX, bs58::encode(&bytes).into_string()),
            key: *public_key,
        }
    }

    pub fn parse(did: &str) -> Result<Self> {
        let identifier = did.strip_prefix(DID_KEY_PREFIX).ok_or_else(|| {
            Error::InvalidDid(format!("DID must start with '{}', got '{}'", DID_KEY_PREFIX, did))
        })?;

        let encoded = identifier.strip_prefix('z').ok_or_else(|| {
            Error::InvalidDid("DID identifier must start with 'z' (base58btc)".into())
        })?;

        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| Error::InvalidDid(format!("Invalid base58btc encoding: {}", e)))?;

        if decoded.len() != 34 || decoded[..2] != ED25519_MULTICODEC {
            return Err(Error::InvalidDid(
                "expected an Ed25519 multicodec key of 34 bytes".into(),
            ));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&decoded[2..]);
        Ok(Self {
            value: did.to_string(),
            key,
        })
    }

    /// Ed25519 public key embedded in the identifier.
    pub fn public_key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Did {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Did {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_did_roundtrip() {
        let did = Did::from_public_key(&[42u8; 32]);
        assert!(did.as_str().starts_with("did:key:z6Mk"));

        let parsed = Did::parse(did.as_str()).unwrap();
        assert_eq!(parsed, did);
        assert_eq!(parsed.public_key(), &[42u8; 32]);
    }

    #[test]
    fn test_did_rejects_garbage() {
        assert!(Did::parse("did:web:example.com").is_err());
        assert!(Did::parse("did:key:abc").is_err());
        assert!(Did::parse("did:key:z0OIl").is_err());
        assert!(Did::parse("").is_err());
        assert_eq!(Did::parse("abc").unwrap_err().code(), 204);
    }

    #[test]
    fn test_did_serde_validates() {
        let did = Did::from_public_key(&[1u8; 32]);
        let json = serde_json::to_string(&did).unwrap();
        assert_eq!(json, format!("\"{}\"", did));
        assert!(serde_json::from_str::<Did>("\"did:key:nope\"").is_err());
    }
}

//! # Identity
//!
//! A user's identity is a key pair derived from a 24-word recovery phrase,
//! addressed by a `did:key` identifier, plus a mutable profile.
//!
//! ```text
//! RecoveryPhrase ──► seed ──► KeyPair ──► Did (from the Ed25519 half)
//! ```

mod did;
mod profile;
mod recovery;

pub use did::{Did, DID_KEY_PREFIX};
pub use profile::{Profile, ProfileUpdate, MAX_DISPLAY_NAME_LENGTH};
pub use recovery::{RecoveryPhrase, WORD_COUNT};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{KeyPair, PublicKey, Signature};
use crate::error::{Error, Result};

/// The local user. Shared between services behind an `Arc`.
pub struct Identity {
    keypair: KeyPair,
    did: Did,
    profile: RwLock<Profile>,
    created_at: i64,
}

impl Identity {
    /// Create a fresh identity and the phrase that restores it.
    pub fn create(display_name: &str) -> Result<(Self, RecoveryPhrase)> {
        let recovery = RecoveryPhrase::generate()?;
        let identity = Self::from_recovery_phrase(&recovery, display_name)?;
        Ok((identity, recovery))
    }

    pub fn from_recovery_phrase(recovery: &RecoveryPhrase, display_name: &str) -> Result<Self> {
        let profile = Profile::new(display_name)?;
        let keypair = KeyPair::from_seed(&recovery.to_seed())?;
        let did = Did::from_public_key(&keypair.signing.public_bytes());

        Ok(Self {
            keypair,
            did,
            profile: RwLock::new(profile),
            created_at: crate::time::now_timestamp(),
        })
    }

    pub fn did(&self) -> &Did {
        &self.did
    }

    pub fn did_string(&self) -> String {
        self.did.to_string()
    }

    pub fn profile(&self) -> Profile {
        self.profile.read().clone()
    }

    pub fn display_name(&self) -> String {
        self.profile.read().display_name.clone()
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> Result<Profile> {
        let mut profile = self.profile.write();
        profile.apply(update)?;
        Ok(profile.clone())
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn public_identity(&self) -> PublicIdentity {
        let profile = self.profile.read();
        PublicIdentity {
            did: self.did.to_string(),
            display_name: profile.display_name.clone(),
            status: profile.status.clone(),
            avatar: profile.avatar.clone(),
            public_keys: self.keypair.public_keys(),
            created_at: self.created_at,
        }
    }
}

/// What other users learn about an identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicIdentity {
    pub did: String,
    pub display_name: String,
    pub status: Option<String>,
    pub avatar: Option<String>,
    pub public_keys: PublicKey,
    pub created_at: i64,
}

impl PublicIdentity {
    pub fn verify_signature(&self, message: &[u8], signature: &Signature) -> Result<()> {
        crate::crypto::verify(&self.public_keys.signing, message, signature)
    }

    /// The DID must be the one derived from the advertised signing key.
    pub fn validate_did(&self) -> Result<()> {
        if Did::from_public_key(&self.public_keys.signing).as_str() != self.did {
            return Err(Error::InvalidDid(format!(
                "DID {} does not match public key",
                self.did
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_identity() {
        let (identity, recovery) = Identity::create("Alice").unwrap();
        assert_eq!(identity.display_name(), "Alice");
        assert!(identity.did_string().starts_with("did:key:z"));
        assert_eq!(recovery.word_count(), 24);
    }

    #[test]
    fn test_restore_identity_yields_same_did() {
        let (identity, recovery) = Identity::create("Alice").unwrap();
        let restored = Identity::from_recovery_phrase(&recovery, "Alice 2").unwrap();

        assert_eq!(identity.did(), restored.did());
        assert_eq!(restored.display_name(), "Alice 2");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Identity::create("").is_err());
    }

    #[test]
    fn test_public_identity_validates() {
        let (identity, _) = Identity::create("Alice").unwrap();
        let mut public = identity.public_identity();
        assert!(public.validate_did().is_ok());

        public.did = Did::from_public_key(&[9u8; 32]).to_string();
        assert!(public.validate_did().is_err());
    }

    #[test]
    fn test_update_profile() {
        let (identity, _) = Identity::create("Alice").unwrap();
        let profile = identity
            .update_profile(ProfileUpdate {
                display_name: Some("Alice B".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(profile.display_name, "Alice B");
        assert_eq!(identity.public_identity().display_name, "Alice B");
    }
}

use std::fmt;

use bip39::Mnemonic;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Number of words in a recovery phrase (256 bits of entropy).
pub const WORD_COUNT: usize = 24;

/// BIP39 mnemonic that restores an identity.
pub struct RecoveryPhrase {
    mnemonic: Mnemonic,
}

impl RecoveryPhrase {
    pub fn generate() -> Result<Self> {
        let mut entropy = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut entropy);

        let mnemonic = Mnemonic::from_entropy(&entropy)
            .map_err(|e| Error::KeyDerivationFailed(format!("Failed to generate mnemonic: {}", e)));
        entropy.zeroize();

        Ok(Self { mnemonic: mnemonic? })
    }

    pub fn from_phrase(phrase: &str) -> Result<Self> {
        let mnemonic = Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| Error::InvalidRecoveryPhrase(e.to_string()))?;

        if mnemonic.word_count() != WORD_COUNT {
            return Err(Error::InvalidRecoveryPhrase(format!(
                "Expected {} words, got {}",
                WORD_COUNT,
                mnemonic.word_count()
            )));
        }

        Ok(Self { mnemonic })
    }

    pub fn phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    pub fn word_count(&self) -> usize {
        self.mnemonic.word_count()
    }

    /// First 32 bytes of the BIP39 seed (empty passphrase).
    pub fn to_seed(&self) -> [u8; 32] {
        let mut full = self.mnemonic.to_seed("");
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&full[..32]);
        full.zeroize();
        seed
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecoveryPhrase([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn test_generate() {
        let phrase = RecoveryPhrase::generate().unwrap();
        assert_eq!(phrase.word_count(), WORD_COUNT);
        assert!(RecoveryPhrase::from_phrase(&phrase.phrase()).is_ok());
    }

    #[test]
    fn test_parse_valid_phrase_is_deterministic() {
        let a = RecoveryPhrase::from_phrase(VALID).unwrap();
        let b = RecoveryPhrase::from_phrase(&format!("  {}\n", VALID)).unwrap();
        assert_eq!(a.to_seed(), b.to_seed());
    }

    #[test]
    fn test_rejects_bad_phrases() {
        assert_eq!(
            RecoveryPhrase::from_phrase("abandon abandon abandon").unwrap_err().code(),
            202
        );
        let bad_word = VALID.replacen("abandon", "umbra", 1);
        assert!(RecoveryPhrase::from_phrase(&bad_word).is_err());
        // valid words, broken checksum
        let bad_checksum = VALID.replace(" art", " abandon");
        assert!(RecoveryPhrase::from_phrase(&bad_checksum).is_err());
    }

    #[test]
    fn test_debug_is_redacted() {
        let phrase = RecoveryPhrase::from_phrase(VALID).unwrap();
        assert!(!format!("{:?}", phrase).contains("abandon"));
    }
}

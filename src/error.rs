//! # Error Handling
//!
//! Every failure inside the native core is an [`Error`]. At the C boundary
//! it is flattened into an error envelope: the numeric [`Error::code`] plus
//! the `Display` text.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          ERROR CODE RANGES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │     1-99   Argument decoding (bad JSON, missing / invalid field)        │
//! │   100-199  Core lifecycle                                               │
//! │   200-299  Identity                                                     │
//! │   300-399  Crypto                                                       │
//! │     404    Unknown method (reserved by the dispatcher)                  │
//! │   500-599  Network                                                      │
//! │   600-699  Friends                                                      │
//! │   700-799  Messages                                                     │
//! │   900-999  Internal (serialization, caught native faults)               │
//! │                                                                         │
//! │  Rust                         C boundary                  Host          │
//! │  Err(Error::NoIdentity)  ──►  {success:0, code:200}  ──►  UmbraError    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for bridge and core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the native core and the boundary layer.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Argument Errors (1-99)
    // ========================================================================

    /// Payload was not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// A required field was absent or empty
    #[error("Missing {0}")]
    MissingArgument(String),

    /// A field was present but unusable (bad UTF-8, out of range)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Core Lifecycle Errors (100-199)
    // ========================================================================

    /// Core has not been initialized
    #[error("Umbra core has not been initialized. Call umbra_init first.")]
    NotInitialized,

    /// Core has already been initialized
    #[error("Umbra core has already been initialized.")]
    AlreadyInitialized,

    // ========================================================================
    // Identity Errors (200-299)
    // ========================================================================

    /// No identity has been loaded
    #[error("No identity loaded. Create or restore an identity first.")]
    NoIdentity,

    /// An identity is already loaded
    #[error("An identity is already loaded.")]
    IdentityExists,

    #[error("Invalid recovery phrase: {0}")]
    InvalidRecoveryPhrase(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid DID: {0}")]
    InvalidDid(String),

    #[error("Profile update failed: {0}")]
    ProfileUpdateFailed(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Signature did not verify
    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key exchange failed: {0}")]
    KeyExchangeFailed(String),

    // ========================================================================
    // Dispatch Errors (404)
    // ========================================================================

    /// No entry in the method table matches the requested name
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    // ========================================================================
    // Network Errors (500-599)
    // ========================================================================

    /// Network service is not running
    #[error("Network not started")]
    NotConnected,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(String),

    /// Malformed multiaddr, network config or connection info
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    // ========================================================================
    // Friend Errors (600-699)
    // ========================================================================

    #[error("Already friends with this user")]
    AlreadyFriends,

    #[error("Not friends with this user")]
    NotFriends,

    #[error("A friend request is already pending")]
    RequestPending,

    #[error("Friend request not found")]
    RequestNotFound,

    #[error("User is blocked")]
    UserBlocked,

    #[error("Invalid friend request: {0}")]
    InvalidFriendRequest(String),

    #[error("Cannot send a friend request to yourself")]
    CannotAddSelf,

    // ========================================================================
    // Message Errors (700-799)
    // ========================================================================

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Message not found")]
    MessageNotFound,

    #[error("Invalid message content: {0}")]
    InvalidMessageContent(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// A panic was caught at the boundary
    #[error("Native fault: {0}")]
    NativeFault(String),
}

impl Error {
    /// Numeric code carried in the error envelope.
    pub fn code(&self) -> i32 {
        match self {
            // Arguments (1-99)
            Error::InvalidJson(_) => 1,
            Error::MissingArgument(_) => 2,
            Error::InvalidArgument(_) => 3,

            // Core (100-199)
            Error::NotInitialized => 100,
            Error::AlreadyInitialized => 101,

            // Identity (200-299)
            Error::NoIdentity => 200,
            Error::IdentityExists => 201,
            Error::InvalidRecoveryPhrase(_) => 202,
            Error::KeyDerivationFailed(_) => 203,
            Error::InvalidDid(_) => 204,
            Error::ProfileUpdateFailed(_) => 205,

            // Crypto (300-399)
            Error::EncryptionFailed(_) => 300,
            Error::DecryptionFailed(_) => 301,
            Error::VerificationFailed => 303,
            Error::InvalidKey(_) => 304,
            Error::KeyExchangeFailed(_) => 305,

            // Dispatch
            Error::UnknownMethod(_) => 404,

            // Network (500-599)
            Error::NotConnected => 500,
            Error::ConnectionFailed(_) => 501,
            Error::PeerNotFound(_) => 503,
            Error::ProtocolError(_) => 504,

            // Friends (600-699)
            Error::AlreadyFriends => 600,
            Error::NotFriends => 601,
            Error::RequestPending => 602,
            Error::RequestNotFound => 603,
            Error::UserBlocked => 604,
            Error::InvalidFriendRequest(_) => 605,
            Error::CannotAddSelf => 606,

            // Messages (700-799)
            Error::ConversationNotFound => 700,
            Error::MessageNotFound => 701,
            Error::InvalidMessageContent(_) => 704,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 902,
            Error::DeserializationError(_) => 903,
            Error::NativeFault(_) => 910,
        }
    }

    /// Recoverable errors may succeed on a later attempt without user input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::NotConnected | Error::PeerNotFound(_)
        )
    }

    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::NoIdentity
                | Error::InvalidRecoveryPhrase(_)
                | Error::UserBlocked
                | Error::NotFriends
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidJson("x".into()).code(), 1);
        assert_eq!(Error::MissingArgument("did".into()).code(), 2);
        assert_eq!(Error::NotInitialized.code(), 100);
        assert_eq!(Error::NoIdentity.code(), 200);
        assert_eq!(Error::EncryptionFailed("test".into()).code(), 300);
        assert_eq!(Error::UnknownMethod("nope".into()).code(), 404);
        assert_eq!(Error::NotConnected.code(), 500);
        assert_eq!(Error::AlreadyFriends.code(), 600);
        assert_eq!(Error::ConversationNotFound.code(), 700);
        assert_eq!(Error::Internal("test".into()).code(), 900);
        assert_eq!(Error::NativeFault("boom".into()).code(), 910);
    }

    #[test]
    fn test_no_error_uses_success_code() {
        let samples = [
            Error::InvalidArgument("limit".into()),
            Error::AlreadyInitialized,
            Error::VerificationFailed,
            Error::MessageNotFound,
            Error::DeserializationError("eof".into()),
        ];
        for err in samples {
            assert_ne!(err.code(), 0, "{err} must carry a failure code");
        }
    }

    #[test]
    fn test_unknown_method_message_names_method() {
        let err = Error::UnknownMethod("no_such_method".into());
        assert_eq!(err.to_string(), "Unknown method: no_such_method");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::ConnectionFailed("refused".into()).is_recoverable());
        assert!(Error::NotConnected.is_recoverable());
        assert!(!Error::NoIdentity.is_recoverable());
        assert!(!Error::VerificationFailed.is_recoverable());
        assert!(Error::NoIdentity.requires_user_action());
    }

    #[test]
    fn test_serde_conversion() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.code(), 902);
    }
}

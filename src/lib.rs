//! # Umbra Bridge
//!
//! The C-ABI gateway through which host runtimes (Swift on iOS, Kotlin on
//! Android, plain C) drive the Umbra native core.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          UMBRA BRIDGE                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   host ──► umbra_identity_create("Alice")                               │
//! │              │                                                          │
//! │              ├─► decode C args ─► {"display_name":"Alice"}              │
//! │              ├─► dispatch("umbra_identity_create", payload)             │
//! │              │       └─► MethodTable ─► handler ─► native core          │
//! │              ▼                                                          │
//! │   host ◄── FfiResult { success, error_code, error_message, data }       │
//! │                                                                         │
//! │   native core ──► event channel ──► host callback(type, JSON)           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error type and numeric error codes
//! - [`crypto`] - Keys, signatures and message encryption
//! - [`identity`] - Identity creation, recovery and profiles
//! - [`network`] - Connection bookkeeping for the P2P layer
//! - [`discovery`] - Shareable connection info and the peer cache
//! - [`friends`] - Signed friend requests and the social graph
//! - [`messaging`] - Encrypted direct messages and conversations
//! - [`ffi`] - Result envelope, fault bridge, dispatcher, C API, events
//!
//! ## Memory Contract
//!
//! Every `FfiResult` returned across the boundary owns its strings. The host
//! releases it exactly once with `umbra_free_result`, or any number of times
//! with the idempotent `umbra_release_result`.

#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod crypto;
pub mod discovery;
pub mod error;
pub mod friends;
pub mod identity;
pub mod messaging;
pub mod network;
/// Time helpers.
pub mod time;

#[cfg(feature = "ffi")]
pub mod ffi;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use error::{Error, Result};
pub use identity::{Identity, PublicIdentity};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

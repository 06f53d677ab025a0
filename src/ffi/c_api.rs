//! # C API
//!
//! C-compatible FFI functions for iOS and other native platforms.
//!
//! All functions follow the naming convention: `umbra_<module>_<action>`.
//! Each one decodes its C arguments, packs them into the JSON payload of the
//! dispatcher method with the same name and returns the dispatcher's
//! envelope. A null argument is treated as absent; a string that is not
//! UTF-8 fails with code 3.
//!
//! Every returned [`FfiResult`] must be released with `umbra_free_result`
//! or `umbra_release_result`.

use std::os::raw::c_char;

use serde_json::{Map, Value};

use super::bridge::guard;
use super::dispatcher::dispatch;
use super::types::{cstr_to_string, FfiResult};
use crate::error::{Error, Result};

/// Decode C string arguments into a JSON object, skipping null ones.
///
/// # Safety
/// Every pointer must be null or a valid NUL-terminated string.
unsafe fn payload(fields: &[(&str, *const c_char)]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for &(name, ptr) in fields {
        if let Some(value) = cstr_to_string(ptr)? {
            map.insert(name.to_string(), Value::String(value));
        }
    }
    Ok(map)
}

fn forward(method: &str, args: Result<Map<String, Value>>) -> FfiResult {
    match args {
        Ok(map) => dispatch(method, &Value::Object(map).to_string()),
        Err(e) => e.into(),
    }
}

/// For entry points whose single argument already is a JSON document.
fn forward_raw(method: &str, json: Result<Option<String>>) -> FfiResult {
    match json {
        Ok(json) => dispatch(method, json.as_deref().unwrap_or_default()),
        Err(e) => e.into(),
    }
}

// ============================================================================
// GENERIC DISPATCH
// ============================================================================

/// Call any method of the native core by name.
///
/// # Arguments
/// * `method` - Method name, e.g. `"umbra_identity_get_did"`
/// * `args` - JSON payload (null for none)
///
/// # Safety
/// Both pointers must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn umbra_call(method: *const c_char, args: *const c_char) -> FfiResult {
    guard("umbra_call", || {
        let method = match cstr_to_string(method) {
            Ok(Some(method)) => method,
            Ok(None) => return Error::MissingArgument("method".into()).into(),
            Err(e) => return e.into(),
        };
        match cstr_to_string(args) {
            Ok(args) => dispatch(&method, args.as_deref().unwrap_or_default()),
            Err(e) => e.into(),
        }
    })
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize Umbra Core
///
/// Must be called before any other functions.
///
/// # Arguments
/// * `storage_path` - Path to store data (null for `./umbra_data`)
///
/// # Safety
/// `storage_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_init(storage_path: *const c_char) -> FfiResult {
    guard("umbra_init", || {
        forward("umbra_init", payload(&[("storage_path", storage_path)]))
    })
}

/// Shutdown Umbra Core
///
/// Stops the network and drops all services. `umbra_init` may be called
/// again afterwards.
#[no_mangle]
pub extern "C" fn umbra_shutdown() -> FfiResult {
    guard("umbra_shutdown", || dispatch("umbra_shutdown", ""))
}

/// Library version as a JSON string.
#[no_mangle]
pub extern "C" fn umbra_version() -> FfiResult {
    guard("umbra_version", || dispatch("umbra_version", ""))
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Create a new identity
///
/// Returns `{"did": ..., "recovery_phrase": ...}`. The phrase is the only
/// way to restore the identity; show it to the user once.
///
/// # Safety
/// `display_name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_identity_create(display_name: *const c_char) -> FfiResult {
    guard("umbra_identity_create", || {
        forward(
            "umbra_identity_create",
            payload(&[("display_name", display_name)]),
        )
    })
}

/// Restore identity from recovery phrase
///
/// # Arguments
/// * `recovery_phrase` - 24-word BIP39 mnemonic
/// * `display_name` - User's display name
///
/// # Safety
/// Both pointers must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn umbra_identity_restore(
    recovery_phrase: *const c_char,
    display_name: *const c_char,
) -> FfiResult {
    guard("umbra_identity_restore", || {
        forward(
            "umbra_identity_restore",
            payload(&[
                ("recovery_phrase", recovery_phrase),
                ("display_name", display_name),
            ]),
        )
    })
}

/// Get current identity's DID
#[no_mangle]
pub extern "C" fn umbra_identity_get_did() -> FfiResult {
    guard("umbra_identity_get_did", || dispatch("umbra_identity_get_did", ""))
}

/// Get current identity's profile
#[no_mangle]
pub extern "C" fn umbra_identity_get_profile() -> FfiResult {
    guard("umbra_identity_get_profile", || {
        dispatch("umbra_identity_get_profile", "")
    })
}

/// Update profile
///
/// # Arguments
/// * `json` - JSON object with any of `display_name`, `status`, `avatar`
///
/// # Safety
/// `json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_identity_update_profile(json: *const c_char) -> FfiResult {
    guard("umbra_identity_update_profile", || {
        forward_raw("umbra_identity_update_profile", cstr_to_string(json))
    })
}

// ============================================================================
// NETWORK
// ============================================================================

/// Start the network service
///
/// # Arguments
/// * `config_json` - JSON configuration (null for defaults)
///
/// # Safety
/// `config_json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_network_start(config_json: *const c_char) -> FfiResult {
    guard("umbra_network_start", || {
        forward_raw("umbra_network_start", cstr_to_string(config_json))
    })
}

/// Stop the network service
#[no_mangle]
pub extern "C" fn umbra_network_stop() -> FfiResult {
    guard("umbra_network_stop", || dispatch("umbra_network_stop", ""))
}

/// Get network status
#[no_mangle]
pub extern "C" fn umbra_network_status() -> FfiResult {
    guard("umbra_network_status", || dispatch("umbra_network_status", ""))
}

/// Connect to a peer by multiaddr
///
/// # Safety
/// `addr` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_network_connect(addr: *const c_char) -> FfiResult {
    guard("umbra_network_connect", || {
        forward("umbra_network_connect", payload(&[("address", addr)]))
    })
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// Get our connection info for sharing
///
/// Returns the link, base64 and JSON encodings plus the decoded fields.
#[no_mangle]
pub extern "C" fn umbra_discovery_get_connection_info() -> FfiResult {
    guard("umbra_discovery_get_connection_info", || {
        dispatch("umbra_discovery_get_connection_info", "")
    })
}

/// Connect using connection info (link, base64, or JSON)
///
/// # Safety
/// `info` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_discovery_connect_with_info(info: *const c_char) -> FfiResult {
    guard("umbra_discovery_connect_with_info", || {
        forward(
            "umbra_discovery_connect_with_info",
            payload(&[("info", info)]),
        )
    })
}

/// Lookup a peer by DID
///
/// # Safety
/// `did` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_discovery_lookup_peer(did: *const c_char) -> FfiResult {
    guard("umbra_discovery_lookup_peer", || {
        forward("umbra_discovery_lookup_peer", payload(&[("did", did)]))
    })
}

// ============================================================================
// FRIENDS
// ============================================================================

/// Send a friend request
///
/// # Arguments
/// * `did` - DID of the user to befriend
/// * `message` - Optional message (null for none)
///
/// # Safety
/// Both pointers must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn umbra_friends_send_request(
    did: *const c_char,
    message: *const c_char,
) -> FfiResult {
    guard("umbra_friends_send_request", || {
        forward(
            "umbra_friends_send_request",
            payload(&[("did", did), ("message", message)]),
        )
    })
}

/// Accept a friend request
///
/// # Safety
/// `request_id` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_friends_accept_request(request_id: *const c_char) -> FfiResult {
    guard("umbra_friends_accept_request", || {
        forward(
            "umbra_friends_accept_request",
            payload(&[("request_id", request_id)]),
        )
    })
}

/// Reject a friend request
///
/// # Safety
/// `request_id` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn umbra_friends_reject_request(request_id: *const c_char) -> FfiResult {
    guard("umbra_friends_reject_request", || {
        forward(
            "umbra_friends_reject_request",
            payload(&[("request_id", request_id)]),
        )
    })
}

/// Get friends list
#[no_mangle]
pub extern "C" fn umbra_friends_list() -> FfiResult {
    guard("umbra_friends_list", || dispatch("umbra_friends_list", ""))
}

/// Get pending incoming friend requests
#[no_mangle]
pub extern "C" fn umbra_friends_pending_requests() -> FfiResult {
    guard("umbra_friends_pending_requests", || {
        dispatch("umbra_friends_pending_requests", "")
    })
}

// ============================================================================
// MESSAGING
// ============================================================================

/// Send a text message
///
/// Returns the message id, conversation id, timestamp and the encrypted
/// envelope for the host to deliver.
///
/// # Safety
/// Both pointers must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn umbra_messaging_send_text(
    recipient_did: *const c_char,
    text: *const c_char,
) -> FfiResult {
    guard("umbra_messaging_send_text", || {
        forward(
            "umbra_messaging_send_text",
            payload(&[("recipient_did", recipient_did), ("text", text)]),
        )
    })
}

/// Get conversations, most recent first
#[no_mangle]
pub extern "C" fn umbra_messaging_get_conversations() -> FfiResult {
    guard("umbra_messaging_get_conversations", || {
        dispatch("umbra_messaging_get_conversations", "")
    })
}

/// Get messages for a conversation
///
/// # Arguments
/// * `conversation_id` - Conversation ID
/// * `limit` - Maximum number of messages (0 for the default page size)
/// * `before_id` - Return messages before this ID (null for newest)
///
/// # Safety
/// Both pointers must be null or valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn umbra_messaging_get_messages(
    conversation_id: *const c_char,
    limit: i32,
    before_id: *const c_char,
) -> FfiResult {
    guard("umbra_messaging_get_messages", || {
        let args = payload(&[("conversation_id", conversation_id), ("before_id", before_id)]).map(
            |mut map| {
                map.insert("limit".to_string(), Value::from(limit));
                map
            },
        );
        forward("umbra_messaging_get_messages", args)
    })
}

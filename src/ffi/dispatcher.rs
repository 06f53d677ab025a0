//! # FFI Dispatcher
//!
//! Generic JSON-RPC style dispatcher that routes method names to native
//! core calls. Called from `umbra_call(method, args)` in c_api.rs, and by
//! every named `umbra_*` function, so both paths share one set of error
//! codes and payload shapes.
//!
//! Handler implementations live in domain sub-modules:
//!   - `dispatch_lifecycle` - init, shutdown, version, method listing
//!   - `dispatch_identity`  - umbra_identity_* methods
//!   - `dispatch_network`   - umbra_network_* methods
//!   - `dispatch_discovery` - umbra_discovery_* methods
//!   - `dispatch_friends`   - umbra_friends_* methods
//!   - `dispatch_messaging` - umbra_messaging_* methods
//!
//! Method names match exactly and case-sensitively. An unknown name yields
//! error code 404 with the name in the message; a panicking handler yields
//! code 910.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use super::bridge::catch_fault;
use super::state::Core;
use super::types::FfiResult;
use super::{
    dispatch_discovery, dispatch_friends, dispatch_identity, dispatch_lifecycle, dispatch_messaging,
    dispatch_network,
};
use crate::error::{Error, Result};

/// Handler output: JSON `data` on success, or nothing.
pub type DResult = Result<Option<String>>;

/// A method implementation. Receives the core and the raw argument payload.
pub type Handler = fn(&Core, &str) -> DResult;

/// Compiled-in mapping from method name to handler.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<&'static str, Handler>,
}

impl MethodTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every method the native core supports.
    pub fn builtin() -> Self {
        [
            dispatch_lifecycle::METHODS,
            dispatch_identity::METHODS,
            dispatch_network::METHODS,
            dispatch_discovery::METHODS,
            dispatch_friends::METHODS,
            dispatch_messaging::METHODS,
        ]
        .into_iter()
        .flatten()
        .fold(Self::empty(), |table, &(name, handler)| table.with(name, handler))
    }

    /// Add or replace a method.
    pub fn with(mut self, name: &'static str, handler: Handler) -> Self {
        self.methods.insert(name, handler);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Method names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Route one call against `core`. Never panics.
    pub fn dispatch(&self, core: &Core, method: &str, args: &str) -> FfiResult {
        let Some(handler) = self.methods.get(method) else {
            tracing::debug!("Unknown method: {}", method);
            return Error::UnknownMethod(method.to_string()).into();
        };

        tracing::debug!("dispatch {} ({} bytes)", method, args.len());
        match catch_fault(method, || handler(core, args)) {
            Ok(result) => result.into(),
            Err(fault) => {
                tracing::warn!("{}", fault);
                fault.into()
            }
        }
    }
}

static TABLE: Lazy<MethodTable> = Lazy::new(MethodTable::builtin);

/// The built-in table.
pub fn methods() -> &'static MethodTable {
    &TABLE
}

/// Dispatch against the global core.
pub fn dispatch(method: &str, args: &str) -> FfiResult {
    TABLE.dispatch(Core::global(), method, args)
}

// ============================================================================
// HELPERS  (pub(super) so domain modules can use them)
// ============================================================================

/// Parse a payload. A blank payload reads as `{}`.
pub(super) fn json_parse(args: &str) -> Result<Value> {
    if args.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(args).map_err(|e| Error::InvalidJson(e.to_string()))
}

/// Deserialize a payload into a typed argument struct.
pub(super) fn parse_args<T: serde::de::DeserializeOwned>(args: &str) -> Result<T> {
    serde_json::from_value(json_parse(args)?).map_err(|e| Error::InvalidArgument(e.to_string()))
}

/// A non-empty string field.
pub(super) fn require_str<'a>(data: &'a Value, field: &str) -> Result<&'a str> {
    optional_str(data, field).ok_or_else(|| Error::MissingArgument(field.to_string()))
}

/// A structured field (a signed request, an envelope) decoded into `T`.
pub(super) fn require_value<T: serde::de::DeserializeOwned>(data: &Value, field: &str) -> Result<T> {
    let value = data
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| Error::MissingArgument(field.to_string()))?;
    serde_json::from_value(value.clone()).map_err(|e| Error::InvalidArgument(format!("{}: {}", field, e)))
}

/// A string field that may be absent, null or empty.
pub(super) fn optional_str<'a>(data: &'a Value, field: &str) -> Option<&'a str> {
    data.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub(super) fn ok_json<T: Serialize + ?Sized>(value: &T) -> DResult {
    Ok(Some(serde_json::to_string(value)?))
}

pub(super) fn ok_empty() -> DResult {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn explode(_: &Core, _: &str) -> DResult {
        panic!("handler exploded")
    }

    fn echo(_: &Core, args: &str) -> DResult {
        let data = json_parse(args)?;
        ok_json(require_str(&data, "value")?)
    }

    #[test]
    fn test_unknown_method() {
        let core = Core::new();
        let result = methods().dispatch(&core, "no_such_method", "{}");
        assert!(!result.is_success());
        assert_eq!(result.error_code(), 404);
        assert!(result.error_message().unwrap().contains("no_such_method"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let core = Core::new();
        let result = methods().dispatch(&core, "UMBRA_VERSION", "");
        assert_eq!(result.error_code(), 404);
        assert!(methods().dispatch(&core, "umbra_version", "").is_success());
    }

    #[test]
    fn test_panicking_handler_is_contained() {
        let table = MethodTable::empty().with("explode", explode);
        let result = table.dispatch(&Core::new(), "explode", "");
        assert_eq!(result.error_code(), 910);
        assert!(result.error_message().unwrap().contains("handler exploded"));
    }

    #[test]
    fn test_payload_reaches_handler() {
        let table = MethodTable::empty().with("echo", echo);
        let core = Core::new();

        let result = table.dispatch(&core, "echo", r#"{"value":"hi"}"#);
        assert_eq!(result.data(), Some("\"hi\""));

        assert_eq!(table.dispatch(&core, "echo", "").error_code(), 2);
        assert_eq!(table.dispatch(&core, "echo", "{oops").error_code(), 1);
    }

    #[test]
    fn test_builtin_names() {
        let names = methods().names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        for name in [
            "umbra_init",
            "umbra_identity_get_did",
            "umbra_network_start",
            "umbra_discovery_connect_with_info",
            "umbra_friends_send_request",
            "umbra_messaging_get_messages",
            "umbra_messaging_mark_read",
        ] {
            assert!(methods().contains(name), "{}", name);
        }
    }

    #[test]
    fn test_helpers() {
        assert_eq!(json_parse("  ").unwrap(), json!({}));
        let data = json!({"a": "x", "b": "", "c": null});
        assert_eq!(optional_str(&data, "a"), Some("x"));
        assert_eq!(optional_str(&data, "b"), None);
        assert_eq!(optional_str(&data, "c"), None);
        assert_eq!(require_str(&data, "b").unwrap_err().to_string(), "Missing b");
    }
}

//! # FFI Event System
//!
//! Pushes events from Rust to Swift/Kotlin through one registered C
//! callback. Events: friend requests, messages, network status, etc.
//!
//! The callback lives in a single slot that can be replaced or cleared at
//! any time. [`EventChannel::emit`] copies the function pointer out under
//! the read lock and calls it after the lock is released, so an emit racing
//! a registration delivers to either the old or the new callback, never to a
//! half-written one, and a slow callback never blocks registration.
//!
//! Delivery is synchronous on the emitting thread. Without a callback the
//! event is dropped.

use std::os::raw::c_char;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;

use super::types::to_c_string;

/// C callback type for pushing events to Swift/Kotlin.
pub type EventCallback = extern "C" fn(event_type: *const c_char, data: *const c_char);

/// Single-subscriber event slot.
#[derive(Default)]
pub struct EventChannel {
    slot: RwLock<Option<EventCallback>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, or clear the slot with `None`. Returns the
    /// callback it replaced.
    pub fn register(&self, callback: Option<EventCallback>) -> Option<EventCallback> {
        std::mem::replace(&mut *self.slot.write(), callback)
    }

    pub fn is_registered(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Deliver one event. Returns false when nobody is listening.
    pub fn emit(&self, event_type: &str, data: &str) -> bool {
        let callback = *self.slot.read();
        let Some(callback) = callback else {
            return false;
        };

        let event_type = to_c_string(event_type.to_string());
        let data = to_c_string(data.to_string());
        callback(event_type.as_ptr(), data.as_ptr());
        true
    }

    pub fn emit_json<T: Serialize>(&self, event_type: &str, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(data) => self.emit(event_type, &data),
            Err(e) => {
                tracing::warn!("Dropping {} event: {}", event_type, e);
                false
            }
        }
    }
}

// ============================================================================
// GLOBAL CHANNEL
// ============================================================================

static CHANNEL: Lazy<EventChannel> = Lazy::new(EventChannel::new);

/// The process-wide channel used by the native core.
pub fn channel() -> &'static EventChannel {
    &CHANNEL
}

/// Register (or with NULL, clear) the event callback.
#[no_mangle]
pub extern "C" fn umbra_register_event_callback(callback: Option<EventCallback>) {
    let replaced = channel().register(callback);
    tracing::debug!(
        "Event callback {} (replaced: {})",
        if callback.is_some() { "registered" } else { "cleared" },
        replaced.is_some()
    );
}

pub(crate) fn emit_event<T: Serialize>(event_type: &str, payload: &T) {
    channel().emit_json(event_type, payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // Each test owns its callbacks' statics; tests run in parallel.
    static FIRST_SEEN: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());
    static SECOND_CALLS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn record_first(event_type: *const c_char, data: *const c_char) {
        let (t, d) = unsafe {
            (
                CStr::from_ptr(event_type).to_string_lossy().into_owned(),
                CStr::from_ptr(data).to_string_lossy().into_owned(),
            )
        };
        FIRST_SEEN.lock().unwrap().push((t, d));
    }

    extern "C" fn count_second(_: *const c_char, _: *const c_char) {
        SECOND_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_emit_without_callback_is_dropped() {
        let channel = EventChannel::new();
        assert!(!channel.is_registered());
        assert!(!channel.emit("peer_connected", "{}"));
    }

    #[test]
    fn test_delivers_exact_pair_once_then_deregisters() {
        let channel = EventChannel::new();
        assert!(channel.register(Some(record_first)).is_none());

        assert!(channel.emit("peer_connected", "{\"did\":\"abc\"}"));
        assert_eq!(
            *FIRST_SEEN.lock().unwrap(),
            vec![("peer_connected".to_string(), "{\"did\":\"abc\"}".to_string())]
        );

        assert!(channel.register(None).is_some());
        assert!(!channel.emit("peer_connected", "{}"));
        assert_eq!(FIRST_SEEN.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_replacement_routes_to_new_callback() {
        let channel = EventChannel::new();
        channel.register(Some(count_second));
        channel.emit("a", "1");

        let previous = channel.register(Some(count_second));
        assert!(previous.is_some());
        channel.emit("b", "2");
        assert_eq!(SECOND_CALLS.load(Ordering::SeqCst), 2);

        #[derive(Serialize)]
        struct Ping {
            n: u8,
        }
        assert!(channel.emit_json("ping", &Ping { n: 1 }));
        assert_eq!(SECOND_CALLS.load(Ordering::SeqCst), 3);
    }
}

//! The process-wide event channel, seen from a host callback.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use umbra_bridge::ffi::{
    channel, dispatch, umbra_identity_create, umbra_init, umbra_register_event_callback, umbra_shutdown,
};

static SEEN: Mutex<Vec<(String, String)>> = Mutex::new(Vec::new());

extern "C" fn record(event_type: *const c_char, data: *const c_char) {
    let event = unsafe {
        (
            CStr::from_ptr(event_type).to_string_lossy().into_owned(),
            CStr::from_ptr(data).to_string_lossy().into_owned(),
        )
    };
    SEEN.lock().unwrap().push(event);
}

fn take_seen() -> Vec<(String, String)> {
    std::mem::take(&mut *SEEN.lock().unwrap())
}

fn wait_for(event_type: &str) -> serde_json::Value {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some((_, data)) = SEEN.lock().unwrap().iter().find(|(t, _)| t == event_type) {
            return serde_json::from_str(data).unwrap();
        }
        assert!(Instant::now() < deadline, "no {} event", event_type);
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn test_event_channel() {
    // nothing registered: dropped, no fault
    assert!(!channel().emit("peer_connected", "{}"));

    umbra_register_event_callback(Some(record));
    assert!(channel().emit("peer_connected", "{\"did\":\"abc\"}"));
    assert_eq!(
        take_seen(),
        vec![("peer_connected".to_string(), "{\"did\":\"abc\"}".to_string())]
    );

    umbra_register_event_callback(None);
    assert!(!channel().emit("peer_connected", "{\"did\":\"abc\"}"));
    assert!(take_seen().is_empty());

    // events raised by the core
    umbra_register_event_callback(Some(record));
    let dir = tempfile::tempdir().unwrap();
    let path = CString::new(dir.path().to_str().unwrap()).unwrap();
    assert!(unsafe { umbra_init(path.as_ptr()) }.is_success());

    let name = CString::new("Alice").unwrap();
    assert!(unsafe { umbra_identity_create(name.as_ptr()) }.is_success());
    let loaded = wait_for("identity_loaded");
    assert_eq!(loaded["display_name"], "Alice");

    assert!(dispatch("umbra_network_start", "").is_success());
    wait_for("network_started");
    assert!(dispatch("umbra_network_connect", r#"{"address":"/ip4/10.0.0.2/tcp/4001"}"#).is_success());
    let peer = wait_for("peer_connected");
    assert_eq!(peer["address"], "/ip4/10.0.0.2/tcp/4001");

    assert!(umbra_shutdown().is_success());
    wait_for("network_stopped");

    umbra_register_event_callback(None);
}

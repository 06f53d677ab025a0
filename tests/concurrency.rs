//! Many host threads calling into the boundary at once.

use std::os::raw::c_char;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use umbra_bridge::ffi::{channel, dispatch, umbra_register_event_callback};

const THREADS: usize = 8;
const ROUNDS: usize = 50;

static DELIVERED: AtomicUsize = AtomicUsize::new(0);

extern "C" fn count(_: *const c_char, _: *const c_char) {
    DELIVERED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_concurrent_dispatch() {
    assert!(dispatch("umbra_init", "").is_success());
    let created = dispatch("umbra_identity_create", r#"{"display_name":"Alice"}"#);
    let created: serde_json::Value = serde_json::from_str(created.data().unwrap()).unwrap();
    let did = Arc::new(created["did"].as_str().unwrap().to_string());

    let workers: Vec<_> = (0..THREADS)
        .map(|t| {
            let did = did.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let version = dispatch("umbra_version", "");
                    let version: String = serde_json::from_str(version.data().unwrap()).unwrap();
                    assert_eq!(version, umbra_bridge::version());

                    let name = format!("no_such_method_{}_{}", t, round);
                    let unknown = dispatch(&name, "");
                    assert_eq!(unknown.error_code(), 404);
                    assert_eq!(unknown.error_message().unwrap(), format!("Unknown method: {}", name));

                    let got = dispatch("umbra_identity_get_did", "");
                    assert_eq!(serde_json::from_str::<String>(got.data().unwrap()).unwrap(), *did);

                    let status = format!(r#"{{"status":"thread {} round {}"}}"#, t, round);
                    assert!(dispatch("umbra_identity_update_profile", &status).is_success());

                    let lookup = dispatch("umbra_discovery_lookup_peer", &format!(r#"{{"did":"bad-{}"}}"#, t));
                    assert_eq!(lookup.error_code(), 204);
                }
            })
        })
        .collect();

    // registration racing emission
    let emitters: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(|| {
                let mut sent = 0;
                for _ in 0..ROUNDS * 4 {
                    if channel().emit("tick", "{}") {
                        sent += 1;
                    }
                }
                sent
            })
        })
        .collect();
    for i in 0..ROUNDS {
        umbra_register_event_callback(if i % 2 == 0 { Some(count) } else { None });
    }

    for worker in workers {
        worker.join().unwrap();
    }
    let sent: usize = emitters.into_iter().map(|e| e.join().unwrap()).sum();
    assert_eq!(DELIVERED.load(Ordering::SeqCst), sent);

    umbra_register_event_callback(None);
    assert!(dispatch("umbra_shutdown", "").is_success());
}

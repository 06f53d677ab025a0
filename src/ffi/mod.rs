//! # FFI Bindings
//!
//! The C boundary between host runtimes (Swift, Kotlin, C) and the native
//! core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         FFI ARCHITECTURE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Swift / Kotlin / C host                                                │
//! │         │                                    ▲                          │
//! │         │ umbra_<module>_<action>(...)       │ event callback           │
//! │         │ umbra_call(method, args)           │ (type, JSON)             │
//! │         ▼                                    │                          │
//! │  ┌────────────────────────────┐      ┌───────┴────────┐                 │
//! │  │ c_api      (named wrappers)│      │ events         │                 │
//! │  │   └─ bridge::guard         │      │ (single slot)  │                 │
//! │  │ dispatcher (method table)  │      └───────▲────────┘                 │
//! │  │   └─ bridge::catch_fault   │              │                          │
//! │  └────────────┬───────────────┘              │                          │
//! │               ▼                              │                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Native core (state::Core)                          │   │
//! │  │  Identity │ Network │ Discovery │ Friends │ Messaging           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Every exported function returns an [`FfiResult`] by value:
//! - operation failures carry the core's [`Error::code`](crate::Error::code)
//! - an unknown method name carries 404
//! - a panic anywhere below the boundary carries 910
//!
//! Nothing unwinds into the host.

mod bridge;
mod c_api;
mod dispatch_discovery;
mod dispatch_friends;
mod dispatch_identity;
mod dispatch_lifecycle;
mod dispatch_messaging;
mod dispatch_network;
mod dispatcher;
mod events;
mod logging;
mod state;
mod types;

pub use bridge::{catch_fault, guard, try_catch, BridgedError, PANIC_DOMAIN};
pub use c_api::*;
pub use dispatcher::{dispatch, methods, DResult, Handler, MethodTable};
pub use events::{channel, umbra_register_event_callback, EventCallback, EventChannel};
pub use logging::{init_logging, LOG_ENV};
pub use state::{Core, FfiState, InitOptions, DEFAULT_STORAGE_PATH};
pub use types::{cstr_to_string, umbra_free_result, umbra_free_string, umbra_release_result, FfiResult};

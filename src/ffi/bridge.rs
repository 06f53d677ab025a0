//! Fault bridge.
//!
//! A panic must never unwind into the host runtime, which has no way to
//! catch it. Every exported entry point runs its body through [`guard`], and
//! the dispatcher runs each handler through [`catch_fault`], so a panic
//! comes out as a [`BridgedError`] and then as an ordinary error envelope.
//!
//! Nothing here logs or retries; the caller decides what to do with the
//! error.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::Error;
use crate::ffi::types::FfiResult;

/// Domain reported for Rust panics.
pub const PANIC_DOMAIN: &str = "umbra.panic";

/// Origin reported by [`try_catch`].
const ANONYMOUS_ORIGIN: &str = "unit of work";

/// A caught fault, translated into a plain value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{domain}: fault in {origin}: {description}")]
pub struct BridgedError {
    /// Category of the fault
    pub domain: String,
    /// Entry point or method that was running
    pub origin: String,
    pub description: String,
}

impl BridgedError {
    fn from_panic(origin: &str, payload: Box<dyn Any + Send>) -> Self {
        Self {
            domain: PANIC_DOMAIN.to_string(),
            origin: origin.to_string(),
            description: describe(payload.as_ref()),
        }
    }
}

impl From<BridgedError> for Error {
    fn from(err: BridgedError) -> Self {
        Error::NativeFault(format!("{} ({})", err.description, err.origin))
    }
}

impl From<BridgedError> for FfiResult {
    fn from(err: BridgedError) -> Self {
        Error::from(err).into()
    }
}

fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<Error>() {
        e.to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `work`; report whether it ran to completion.
///
/// Returns `Ok(())` when it did, or the translated fault when it panicked.
pub fn try_catch<F: FnOnce()>(work: F) -> Result<(), BridgedError> {
    catch_fault(ANONYMOUS_ORIGIN, work)
}

/// Run `work`, converting a panic into a [`BridgedError`] tagged with `origin`.
pub fn catch_fault<T, F: FnOnce() -> T>(origin: &str, work: F) -> Result<T, BridgedError> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| BridgedError::from_panic(origin, payload))
}

/// Boundary form of [`catch_fault`]: always yields an envelope.
pub fn guard<F: FnOnce() -> FfiResult>(entry_point: &str, work: F) -> FfiResult {
    catch_fault(entry_point, work).unwrap_or_else(FfiResult::from)
}

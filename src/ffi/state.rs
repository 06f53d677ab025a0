//! # Shared FFI State
//!
//! The native core behind the boundary: one [`Core`] per process (see
//! [`Core::global`]) holding the services, plus the tokio runtime that
//! async operations are driven on.
//!
//! Handlers clone the `Arc`s they need out of the state and drop the lock
//! before doing any work, so no state lock is held across a `block_on` or
//! an event callback. The one exception is the network gate, which network
//! start, stop and shutdown hold for their whole duration.

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::discovery::DiscoveryService;
use crate::error::{Error, Result};
use crate::friends::FriendsService;
use crate::identity::Identity;
use crate::messaging::MessagingService;
use crate::network::NetworkService;

pub const DEFAULT_STORAGE_PATH: &str = "./umbra_data";

// ============================================================================
// RUNTIME
// ============================================================================

/// Global async runtime for FFI calls
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

pub(crate) fn runtime() -> Result<&'static Runtime> {
    RUNTIME.get_or_try_init(|| {
        Runtime::new().map_err(|e| Error::Internal(format!("Failed to create Tokio runtime: {}", e)))
    })
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Options accepted by `umbra_init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Opaque to the core; reported back in network status.
    pub storage_path: String,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            storage_path: DEFAULT_STORAGE_PATH.to_string(),
        }
    }
}

// ============================================================================
// STATE
// ============================================================================

/// FFI state holding all services
pub struct FfiState {
    pub storage_path: String,
    pub identity: Option<Arc<Identity>>,
    pub network: Option<Arc<NetworkService>>,
    pub discovery: Arc<DiscoveryService>,
    pub friends: Option<Arc<FriendsService>>,
    pub messaging: Option<Arc<MessagingService>>,
}

impl FfiState {
    pub fn new(storage_path: String) -> Self {
        Self {
            storage_path,
            identity: None,
            network: None,
            discovery: Arc::new(DiscoveryService::new()),
            friends: None,
            messaging: None,
        }
    }

    /// Install a freshly created or restored identity and the services
    /// scoped to it.
    pub fn load_identity(&mut self, identity: Identity) -> Result<Arc<Identity>> {
        if self.identity.is_some() {
            return Err(Error::IdentityExists);
        }
        let identity = Arc::new(identity);
        self.friends = Some(Arc::new(FriendsService::new(identity.clone())));
        self.messaging = Some(Arc::new(MessagingService::new(identity.clone())));
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    pub fn identity(&self) -> Result<Arc<Identity>> {
        self.identity.clone().ok_or(Error::NoIdentity)
    }

    pub fn network(&self) -> Result<Arc<NetworkService>> {
        self.network.clone().ok_or(Error::NotConnected)
    }

    pub fn friends(&self) -> Result<Arc<FriendsService>> {
        self.friends.clone().ok_or(Error::NoIdentity)
    }

    pub fn messaging(&self) -> Result<Arc<MessagingService>> {
        self.messaging.clone().ok_or(Error::NoIdentity)
    }
}

/// Lifecycle owner of the native core.
///
/// `Uninitialized ──init──► Initialized ──shutdown──► Uninitialized`
#[derive(Default)]
pub struct Core {
    state: RwLock<Option<Arc<RwLock<FfiState>>>>,
    /// Held while the network is started, stopped or torn down.
    network_gate: Mutex<()>,
}

static GLOBAL: Lazy<Core> = Lazy::new(Core::new);

impl Core {
    pub fn new() -> Self {
        Self::default()
    }

    /// The core behind the exported C functions.
    pub fn global() -> &'static Core {
        &GLOBAL
    }

    pub fn init(&self, options: InitOptions) -> Result<()> {
        let mut slot = self.state.write();
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        runtime()?;

        tracing::info!("Umbra FFI initialized with storage path: {}", options.storage_path);
        *slot = Some(Arc::new(RwLock::new(FfiState::new(options.storage_path))));
        Ok(())
    }

    pub fn state(&self) -> Result<Arc<RwLock<FfiState>>> {
        self.state.read().clone().ok_or(Error::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Serialises network start, stop and shutdown. Taken before any state
    /// lock.
    pub(crate) fn network_gate(&self) -> MutexGuard<'_, ()> {
        self.network_gate.lock()
    }

    /// Stop the network and drop every service. Shutting down an
    /// uninitialized core is a no-op; `init` may be called again afterwards.
    pub fn shutdown(&self) -> Result<()> {
        let _gate = self.network_gate();
        let Some(state) = self.state.write().take() else {
            return Ok(());
        };

        let network = state.write().network.take();
        if let Some(network) = network {
            runtime()?.block_on(network.stop())?;
        }

        tracing::info!("Umbra FFI shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let core = Core::new();
        assert_eq!(core.state().err().map(|e| e.code()), Some(100));

        core.init(InitOptions::default()).unwrap();
        assert!(core.is_initialized());
        assert_eq!(core.state().unwrap().read().storage_path, DEFAULT_STORAGE_PATH);

        let again = core.init(InitOptions::default()).unwrap_err();
        assert_eq!(again.code(), 101);

        core.shutdown().unwrap();
        assert!(!core.is_initialized());
        core.shutdown().unwrap();

        core.init(InitOptions {
            storage_path: "/tmp/umbra".into(),
        })
        .unwrap();
        assert_eq!(core.state().unwrap().read().storage_path, "/tmp/umbra");
    }

    #[test]
    fn test_load_identity_once() {
        let mut state = FfiState::new(DEFAULT_STORAGE_PATH.into());
        assert_eq!(state.identity().err().map(|e| e.code()), Some(200));
        assert_eq!(state.network().err().map(|e| e.code()), Some(500));

        let (identity, _) = Identity::create("Alice").unwrap();
        state.load_identity(identity).unwrap();
        assert!(state.friends().is_ok());
        assert!(state.messaging().is_ok());

        let (other, _) = Identity::create("Bob").unwrap();
        assert_eq!(state.load_identity(other).err().map(|e| e.code()), Some(201));
    }

    #[test]
    fn test_init_options_defaults_from_empty_json() {
        let options: InitOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, InitOptions::default());
    }
}

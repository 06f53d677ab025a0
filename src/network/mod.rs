//! # Network
//!
//! Connection bookkeeping for the P2P layer. The transport itself lives
//! outside this crate; the service tracks what the host has asked it to
//! listen on and connect to, and broadcasts [`NetworkEvent`]s.
//!
//! ```text
//! ┌──────────────────┐  Command (mpsc)   ┌───────────────────┐
//! │  NetworkService  │ ────────────────► │    event loop     │
//! │  (sync handles)  │ ◄──── oneshot ─── │  (tokio task)     │
//! └──────────────────┘                   └─────────┬─────────┘
//!                                                  │ broadcast
//!                                                  ▼
//!                                           NetworkEvent subscribers
//! ```

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Identity multihash header of a protobuf-wrapped Ed25519 public key.
const PEER_ID_PREFIX: [u8; 6] = [0x00, 0x24, 0x08, 0x01, 0x12, 0x20];

/// Network configuration, parsed from the opaque `umbra_network_start` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen addresses (e.g., "/ip4/0.0.0.0/tcp/0")
    pub listen_addrs: Vec<String>,
    pub bootstrap_peers: Vec<String>,
    pub enable_dht: bool,
    /// Enable relay for NAT traversal
    pub enable_relay: bool,
    /// Relay server URL (e.g., "wss://relay.umbra.app/ws")
    pub relay_url: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec!["/ip4/0.0.0.0/tcp/0".to_string()],
            bootstrap_peers: vec![],
            enable_dht: true,
            enable_relay: false,
            relay_url: None,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        for addr in self.listen_addrs.iter().chain(&self.bootstrap_peers) {
            validate_multiaddr(addr)?;
        }
        if self.enable_relay && self.relay_url.as_deref().map_or(true, str::is_empty) {
            return Err(Error::ProtocolError("enable_relay requires relay_url".into()));
        }
        Ok(())
    }
}

/// libp2p-compatible peer id for an Ed25519 public key.
pub fn peer_id_from_public_key(public_key: &[u8; 32]) -> String {
    let mut bytes = Vec::with_capacity(PEER_ID_PREFIX.len() + 32);
    bytes.extend_from_slice(&PEER_ID_PREFIX);
    bytes.extend_from_slice(public_key);
    bs58::encode(bytes).into_string()
}

/// Syntax check of a multiaddr such as `/ip4/1.2.3.4/tcp/4001/p2p/12D3Koo...`.
pub fn validate_multiaddr(addr: &str) -> Result<()> {
    let invalid = |reason: String| Error::ProtocolError(format!("Invalid multiaddr '{}': {}", addr, reason));

    let rest = addr
        .strip_prefix('/')
        .ok_or_else(|| invalid("must start with '/'".into()))?;
    let mut parts = rest.split('/');
    let mut seen = 0;

    while let Some(protocol) = parts.next() {
        seen += 1;
        let mut value = || {
            parts
                .next()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| invalid(format!("'{}' needs a value", protocol)))
        };
        match protocol {
            "ip4" => {
                value()?
                    .parse::<Ipv4Addr>()
                    .map_err(|e| invalid(e.to_string()))?;
            }
            "ip6" => {
                value()?
                    .parse::<Ipv6Addr>()
                    .map_err(|e| invalid(e.to_string()))?;
            }
            "dns" | "dns4" | "dns6" | "dnsaddr" => {
                value()?;
            }
            "tcp" | "udp" => {
                value()?.parse::<u16>().map_err(|e| invalid(e.to_string()))?;
            }
            "p2p" => {
                bs58::decode(value()?)
                    .into_vec()
                    .map_err(|e| invalid(e.to_string()))?;
            }
            "ws" | "wss" | "quic" | "quic-v1" | "p2p-circuit" | "webrtc" | "tls" | "noise" => {}
            "" => return Err(invalid("empty protocol".into())),
            other => return Err(invalid(format!("unsupported protocol '{}'", other))),
        }
    }

    if seen == 0 {
        return Err(invalid("no protocols".into()));
    }
    Ok(())
}

/// Peer id carried in a trailing `/p2p/<id>` component, if any.
pub fn peer_id_in_multiaddr(addr: &str) -> Option<String> {
    let mut parts = addr.split('/');
    while let Some(part) = parts.next() {
        if part == "p2p" {
            return parts.next().map(str::to_string);
        }
    }
    None
}

/// A connected peer as seen by the local node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub peer_id: Option<String>,
    pub address: String,
    pub connected_at: i64,
}

/// Events published by the event loop.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkEvent {
    Listening { address: String },
    PeerConnected { peer_id: Option<String>, address: String },
    PeerDisconnected { address: String },
    Stopped,
}

impl NetworkEvent {
    /// Event channel tag for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            NetworkEvent::Listening { .. } => "network_listening",
            NetworkEvent::PeerConnected { .. } => "peer_connected",
            NetworkEvent::PeerDisconnected { .. } => "peer_disconnected",
            NetworkEvent::Stopped => "network_stopped",
        }
    }
}

/// Snapshot returned by `umbra_network_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_running: bool,
    pub peer_id: String,
    pub listen_addresses: Vec<String>,
    pub connected_peers: usize,
    pub peers: Vec<PeerInfo>,
}

enum Command {
    Connect {
        address: String,
        reply: oneshot::Sender<PeerInfo>,
    },
    Disconnect {
        address: String,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Handle to the network layer.
pub struct NetworkService {
    peer_id: String,
    config: NetworkConfig,
    listen_addrs: Arc<RwLock<Vec<String>>>,
    connected_peers: Arc<RwLock<Vec<PeerInfo>>>,
    command_tx: RwLock<Option<mpsc::Sender<Command>>>,
    event_tx: broadcast::Sender<NetworkEvent>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkService {
    pub fn new(signing_public_key: &[u8; 32], config: NetworkConfig) -> Result<Self> {
        config.validate()?;
        let peer_id = peer_id_from_public_key(signing_public_key);
        tracing::info!("Network service created with PeerId: {}", peer_id);

        let (event_tx, _) = broadcast::channel(256);
        Ok(Self {
            peer_id,
            config,
            listen_addrs: Arc::new(RwLock::new(vec![])),
            connected_peers: Arc::new(RwLock::new(vec![])),
            command_tx: RwLock::new(None),
            event_tx,
            event_loop: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn the event loop on the current runtime and dial bootstrap peers.
    pub async fn start(&self) -> Result<()> {
        let (command_tx, command_rx) = mpsc::channel(256);
        {
            let mut slot = self.command_tx.write();
            if slot.is_some() {
                return Err(Error::ProtocolError("Network service already running".into()));
            }
            *slot = Some(command_tx);
        }

        tracing::info!("Network service starting...");

        let state = LoopState {
            listen_addrs: self.listen_addrs.clone(),
            connected_peers: self.connected_peers.clone(),
            event_tx: self.event_tx.clone(),
        };
        let listen = self.config.listen_addrs.clone();
        let handle = tokio::spawn(run_event_loop(command_rx, state, listen));
        *self.event_loop.lock() = Some(handle);

        for addr in &self.config.bootstrap_peers {
            if let Err(e) = self.connect(addr).await {
                tracing::warn!("Bootstrap peer {} unreachable: {}", addr, e);
            }
        }

        tracing::info!("Network service started");
        Ok(())
    }

    /// Stop the event loop. Stopping a stopped service is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let Some(command_tx) = self.command_tx.write().take() else {
            return Ok(());
        };

        tracing::info!("Stopping network service...");
        let _ = command_tx.send(Command::Shutdown).await;

        let handle = self.event_loop.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        tracing::info!("Network service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.command_tx.read().is_some()
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn listen_addrs(&self) -> Vec<String> {
        self.listen_addrs.read().clone()
    }

    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        self.connected_peers.read().clone()
    }

    pub async fn connect(&self, address: &str) -> Result<PeerInfo> {
        validate_multiaddr(address)?;
        let command_tx = self.sender()?;

        let (reply, response) = oneshot::channel();
        command_tx
            .send(Command::Connect {
                address: address.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::ConnectionFailed("event loop is gone".into()))?;

        response
            .await
            .map_err(|_| Error::ConnectionFailed("event loop dropped the request".into()))
    }

    /// Returns whether a connection to `address` existed.
    pub async fn disconnect(&self, address: &str) -> Result<bool> {
        let command_tx = self.sender()?;

        let (reply, response) = oneshot::channel();
        command_tx
            .send(Command::Disconnect {
                address: address.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::ConnectionFailed("event loop is gone".into()))?;

        response
            .await
            .map_err(|_| Error::ConnectionFailed("event loop dropped the request".into()))
    }

    pub fn status(&self) -> NetworkStatus {
        let peers = self.connected_peers();
        NetworkStatus {
            is_running: self.is_running(),
            peer_id: self.peer_id.clone(),
            listen_addresses: self.listen_addrs(),
            connected_peers: peers.len(),
            peers,
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<Command>> {
        self.command_tx.read().clone().ok_or(Error::NotConnected)
    }
}

struct LoopState {
    listen_addrs: Arc<RwLock<Vec<String>>>,
    connected_peers: Arc<RwLock<Vec<PeerInfo>>>,
    event_tx: broadcast::Sender<NetworkEvent>,
}

impl LoopState {
    fn publish(&self, event: NetworkEvent) {
        // no subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

async fn run_event_loop(mut commands: mpsc::Receiver<Command>, state: LoopState, listen: Vec<String>) {
    for address in listen {
        state.listen_addrs.write().push(address.clone());
        state.publish(NetworkEvent::Listening { address });
    }

    while let Some(command) = commands.recv().await {
        match command {
            Command::Connect { address, reply } => {
                let existing = state
                    .connected_peers
                    .read()
                    .iter()
                    .find(|p| p.address == address)
                    .cloned();

                let peer = match existing {
                    Some(peer) => peer,
                    None => {
                        let peer = PeerInfo {
                            peer_id: peer_id_in_multiaddr(&address),
                            address: address.clone(),
                            connected_at: crate::time::now_timestamp(),
                        };
                        state.connected_peers.write().push(peer.clone());
                        tracing::debug!("Connected to {}", address);
                        state.publish(NetworkEvent::PeerConnected {
                            peer_id: peer.peer_id.clone(),
                            address,
                        });
                        peer
                    }
                };
                let _ = reply.send(peer);
            }
            Command::Disconnect { address, reply } => {
                let removed = {
                    let mut peers = state.connected_peers.write();
                    let before = peers.len();
                    peers.retain(|p| p.address != address);
                    peers.len() != before
                };
                if removed {
                    state.publish(NetworkEvent::PeerDisconnected { address });
                }
                let _ = reply.send(removed);
            }
            Command::Shutdown => break,
        }
    }

    state.connected_peers.write().clear();
    state.listen_addrs.write().clear();
    state.publish(NetworkEvent::Stopped);
}

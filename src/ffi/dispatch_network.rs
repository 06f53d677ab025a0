//! Network dispatch handlers.
//!
//! The network service runs on the global runtime. Its broadcast events are
//! forwarded to the host event callback by a task spawned once the service
//! is installed, which exits once the service reports it has stopped.
//!
//! Start, stop and shutdown run under [`Core::network_gate`], so at most one
//! service is ever started per core.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};

use super::dispatcher::{json_parse, ok_empty, ok_json, parse_args, require_str, DResult, Handler};
use super::events::emit_event;
use super::state::{runtime, Core};
use crate::error::Error;
use crate::network::{NetworkConfig, NetworkEvent, NetworkService};

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_network_start", network_start),
    ("umbra_network_stop", network_stop),
    ("umbra_network_status", network_status),
    ("umbra_network_connect", network_connect),
];

async fn forward_events(mut events: broadcast::Receiver<NetworkEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                emit_event(event.event_type(), &event);
                if event == NetworkEvent::Stopped {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event forwarder lagged, {} network events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn network_start(core: &Core, args: &str) -> DResult {
    let config: NetworkConfig = parse_args(args)?;
    let _gate = core.network_gate();
    let state = core.state()?;
    let identity = {
        let state = state.read();
        if state.network.is_some() {
            return Err(Error::ProtocolError("Network already started".into()));
        }
        state.identity()?
    };

    let network = Arc::new(NetworkService::new(
        &identity.keypair().signing.public_bytes(),
        config,
    )?);
    let events = network.subscribe();

    let rt = runtime()?;
    rt.block_on(network.start())?;
    state.write().network = Some(network.clone());
    rt.spawn(forward_events(events));

    let peer_id = network.peer_id().to_string();
    tracing::info!("Network started as {}", peer_id);
    emit_event("network_started", &json!({ "peer_id": peer_id }));
    ok_json(&json!({ "peer_id": peer_id }))
}

fn network_stop(core: &Core, _args: &str) -> DResult {
    let _gate = core.network_gate();
    let network = core.state()?.write().network.take();
    if let Some(network) = network {
        runtime()?.block_on(network.stop())?;
    }
    ok_empty()
}

fn network_status(core: &Core, _args: &str) -> DResult {
    let state = core.state()?;
    let (network, storage_path) = {
        let state = state.read();
        (state.network()?, state.storage_path.clone())
    };

    let status = network.status();
    ok_json(&json!({
        "is_running": status.is_running,
        "peer_id": status.peer_id,
        "listen_addresses": status.listen_addresses,
        "connected_peers": status.connected_peers,
        "peers": status.peers,
        "storage_path": storage_path,
    }))
}

fn network_connect(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let address = require_str(&data, "address")?;
    let network = core.state()?.read().network()?;

    runtime()?.block_on(network.connect(address))?;
    ok_empty()
}

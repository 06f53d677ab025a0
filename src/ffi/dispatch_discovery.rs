//! Discovery dispatch handlers.

use serde_json::json;

use super::dispatcher::{json_parse, ok_json, require_str, DResult, Handler};
use super::events::emit_event;
use super::state::{runtime, Core};
use crate::discovery::ConnectionInfo;
use crate::error::Error;
use crate::network::peer_id_in_multiaddr;

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_discovery_get_connection_info", discovery_get_connection_info),
    ("umbra_discovery_connect_with_info", discovery_connect_with_info),
    ("umbra_discovery_lookup_peer", discovery_lookup_peer),
];

fn discovery_get_connection_info(core: &Core, _args: &str) -> DResult {
    let (identity, network) = {
        let state = core.state()?;
        let state = state.read();
        (state.identity()?, state.network()?)
    };

    let info = ConnectionInfo::from_identity(&identity, &network);
    ok_json(&json!({
        "link": info.to_link()?,
        "json": info.to_json()?,
        "base64": info.to_base64()?,
        "did": info.did,
        "peer_id": info.peer_id,
        "addresses": info.addresses,
        "display_name": info.display_name,
    }))
}

fn discovery_connect_with_info(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let info = ConnectionInfo::parse(require_str(&data, "info")?)?;

    let (identity, network, discovery) = {
        let state = core.state()?;
        let state = state.read();
        (state.identity()?, state.network()?, state.discovery.clone())
    };
    if info.did == identity.did_string() {
        return Err(Error::InvalidArgument("Connection info is our own".into()));
    }

    let peer = discovery.remember(&info)?;
    emit_event("peer_discovered", &peer);

    let rt = runtime()?;
    for address in &peer.addresses {
        let dial = if peer_id_in_multiaddr(address).is_some() {
            address.clone()
        } else {
            format!("{}/p2p/{}", address, peer.peer_id)
        };
        if let Err(e) = rt.block_on(network.connect(&dial)) {
            tracing::warn!("Could not reach {} at {}: {}", peer.did, dial, e);
        }
    }

    ok_json(&json!({ "peer_id": peer.peer_id, "did": peer.did }))
}

fn discovery_lookup_peer(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let did = require_str(&data, "did")?;
    let discovery = core.state()?.read().discovery.clone();
    ok_json(&discovery.lookup_peer(did)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::state::InitOptions;
    use crate::identity::Identity;

    fn started_core(name: &str) -> Core {
        let core = Core::new();
        core.init(InitOptions::default()).unwrap();
        let (identity, _) = Identity::create(name).unwrap();
        let identity = core.state().unwrap().write().load_identity(identity).unwrap();

        let network = std::sync::Arc::new(
            crate::network::NetworkService::new(
                &identity.keypair().signing.public_bytes(),
                Default::default(),
            )
            .unwrap(),
        );
        runtime().unwrap().block_on(network.start()).unwrap();
        core.state().unwrap().write().network = Some(network);
        core
    }

    #[test]
    fn test_connection_info_requires_network() {
        let core = Core::new();
        core.init(InitOptions::default()).unwrap();
        let (identity, _) = Identity::create("Alice").unwrap();
        core.state().unwrap().write().load_identity(identity).unwrap();
        assert_eq!(discovery_get_connection_info(&core, "").unwrap_err().code(), 500);
    }

    #[test]
    fn test_exchange_connection_info() {
        let alice = started_core("Alice");
        let bob = started_core("Bob");

        let info = discovery_get_connection_info(&alice, "").unwrap().unwrap();
        let info: serde_json::Value = serde_json::from_str(&info).unwrap();
        assert!(info["link"].as_str().unwrap().starts_with("umbra://connect/"));
        let alice_did = info["did"].as_str().unwrap().to_string();

        for encoding in ["link", "base64", "json"] {
            let args = json!({ "info": info[encoding] }).to_string();
            let connected = discovery_connect_with_info(&bob, &args).unwrap().unwrap();
            let connected: serde_json::Value = serde_json::from_str(&connected).unwrap();
            assert_eq!(connected["did"], alice_did.as_str());
            assert_eq!(connected["peer_id"], info["peer_id"]);
        }

        let found = discovery_lookup_peer(&bob, &json!({ "did": alice_did }).to_string())
            .unwrap()
            .unwrap();
        let found: serde_json::Value = serde_json::from_str(&found).unwrap();
        assert_eq!(found["display_name"], "Alice");

        // own info is refused
        let own = json!({ "info": info["link"] }).to_string();
        assert_eq!(discovery_connect_with_info(&alice, &own).unwrap_err().code(), 3);

        alice.shutdown().unwrap();
        bob.shutdown().unwrap();
    }

    #[test]
    fn test_lookup_errors() {
        let core = started_core("Carol");
        let err = discovery_lookup_peer(&core, r#"{"did":"not-a-did"}"#).unwrap_err();
        assert_eq!(err.code(), 204);

        let (stranger, _) = Identity::create("Stranger").unwrap();
        let args = json!({ "did": stranger.did_string() }).to_string();
        assert_eq!(discovery_lookup_peer(&core, &args).unwrap_err().code(), 503);

        let err = discovery_connect_with_info(&core, r#"{"info":"@@@"}"#).unwrap_err();
        assert_eq!(err.code(), 903);
        core.shutdown().unwrap();
    }
}

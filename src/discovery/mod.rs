//! # Discovery
//!
//! Peers find each other by exchanging [`ConnectionInfo`], shared as a link
//! (`umbra://connect/<base64>`), bare URL-safe base64, or JSON. Every
//! accepted connection info is remembered so a DID can later be resolved to
//! a peer id and addresses.

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity::{Did, Identity};
use crate::network::{peer_id_from_public_key, validate_multiaddr, NetworkService};

pub const CONNECTION_INFO_VERSION: u8 = 1;

const LINK_PREFIX: &str = "umbra://connect/";

/// Everything another user needs to reach us.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub version: u8,
    pub did: String,
    pub peer_id: String,
    pub addresses: Vec<String>,
    pub display_name: String,
    pub timestamp: i64,
}

impl ConnectionInfo {
    pub fn from_identity(identity: &Identity, network: &NetworkService) -> Self {
        Self {
            version: CONNECTION_INFO_VERSION,
            did: identity.did_string(),
            peer_id: network.peer_id().to_string(),
            addresses: network.listen_addrs(),
            display_name: identity.display_name(),
            timestamp: crate::time::now_timestamp(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_json()?))
    }

    pub fn to_link(&self) -> Result<String> {
        Ok(format!("{}{}", LINK_PREFIX, self.to_base64()?))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::DeserializationError(e.to_string()))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| Error::DeserializationError(format!("Invalid base64: {}", e)))?;
        let json = String::from_utf8(decoded)
            .map_err(|e| Error::DeserializationError(format!("Invalid UTF-8: {}", e)))?;
        Self::from_json(&json)
    }

    pub fn from_link(link: &str) -> Result<Self> {
        let encoded = link.trim().strip_prefix(LINK_PREFIX).ok_or_else(|| {
            Error::DeserializationError(format!("Invalid link: must start with '{}'", LINK_PREFIX))
        })?;
        Self::from_base64(encoded)
    }

    /// Accept any of the three shareable encodings.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.starts_with("umbra://") {
            Self::from_link(input)
        } else if input.starts_with('{') {
            Self::from_json(input)
        } else {
            Self::from_base64(input)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONNECTION_INFO_VERSION {
            return Err(Error::ProtocolError(format!(
                "Unsupported connection info version: {} (expected {})",
                self.version, CONNECTION_INFO_VERSION
            )));
        }

        let did = Did::parse(&self.did)?;
        if peer_id_from_public_key(did.public_key()) != self.peer_id {
            return Err(Error::ProtocolError(format!(
                "Peer id {} does not belong to {}",
                self.peer_id, self.did
            )));
        }

        for addr in &self.addresses {
            validate_multiaddr(addr)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub did: String,
    pub peer_id: String,
    pub addresses: Vec<String>,
    pub display_name: Option<String>,
    pub discovered_at: i64,
}

/// Cache of peers learned through connection info, keyed by DID.
#[derive(Default)]
pub struct DiscoveryService {
    peers: RwLock<HashMap<String, DiscoveredPeer>>,
}

impl DiscoveryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `info` and cache it, replacing any older entry for the DID.
    pub fn remember(&self, info: &ConnectionInfo) -> Result<DiscoveredPeer> {
        info.validate()?;

        let peer = DiscoveredPeer {
            did: info.did.clone(),
            peer_id: info.peer_id.clone(),
            addresses: info.addresses.clone(),
            display_name: Some(info.display_name.clone()).filter(|n| !n.is_empty()),
            discovered_at: crate::time::now_timestamp(),
        };
        tracing::debug!("Discovered {} ({})", peer.did, peer.peer_id);
        self.peers.write().insert(peer.did.clone(), peer.clone());
        Ok(peer)
    }

    pub fn lookup_peer(&self, did: &str) -> Result<DiscoveredPeer> {
        let did = Did::parse(did)?;
        self.peers
            .read()
            .get(did.as_str())
            .cloned()
            .ok_or_else(|| Error::PeerNotFound(did.to_string()))
    }

    pub fn peers(&self) -> Vec<DiscoveredPeer> {
        let mut peers: Vec<_> = self.peers.read().values().cloned().collect();
        peers.sort_by(|a, b| a.did.cmp(&b.did));
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_for(identity: &Identity) -> ConnectionInfo {
        let did = identity.did();
        ConnectionInfo {
            version: CONNECTION_INFO_VERSION,
            did: did.to_string(),
            peer_id: peer_id_from_public_key(did.public_key()),
            addresses: vec!["/ip4/192.168.1.5/tcp/4001".into()],
            display_name: identity.display_name(),
            timestamp: crate::time::now_timestamp(),
        }
    }

    #[test]
    fn test_connection_info_encodings() {
        let (bob, _) = Identity::create("Bob").unwrap();
        let info = info_for(&bob);

        let link = info.to_link().unwrap();
        assert!(link.starts_with("umbra://connect/"));

        assert_eq!(ConnectionInfo::parse(&link).unwrap(), info);
        assert_eq!(ConnectionInfo::parse(&info.to_base64().unwrap()).unwrap(), info);
        assert_eq!(ConnectionInfo::parse(&info.to_json().unwrap()).unwrap(), info);
        assert!(ConnectionInfo::parse("umbra://nope/abc").is_err());
        assert!(ConnectionInfo::parse("!!!").is_err());
    }

    #[test]
    fn test_validate_rejects_mismatched_peer_id() {
        let (bob, _) = Identity::create("Bob").unwrap();
        let mut info = info_for(&bob);
        assert!(info.validate().is_ok());

        info.peer_id = peer_id_from_public_key(&[0u8; 32]);
        assert_eq!(info.validate().unwrap_err().code(), 504);

        let mut info = info_for(&bob);
        info.version = 9;
        assert!(info.validate().is_err());
    }

    #[test]
    fn test_lookup_peer() {
        let discovery = DiscoveryService::new();
        let (bob, _) = Identity::create("Bob").unwrap();

        let err = discovery.lookup_peer(&bob.did_string()).unwrap_err();
        assert_eq!(err.code(), 503);
        assert_eq!(discovery.lookup_peer("not-a-did").unwrap_err().code(), 204);

        discovery.remember(&info_for(&bob)).unwrap();
        let peer = discovery.lookup_peer(&bob.did_string()).unwrap();
        assert_eq!(peer.display_name.as_deref(), Some("Bob"));
        assert_eq!(discovery.peers().len(), 1);
    }
}

//! # Friends
//!
//! Friendship is established by a signed request and a signed response.
//!
//! ```text
//!   Alice                                        Bob
//!   create_request(bob) ── FriendRequest ──►  handle_incoming_request
//!                                             accept_request / reject_request
//!   handle_response     ◄── FriendResponse ──
//! ```
//!
//! Delivery of requests and responses is the host's job; both travel as
//! JSON and verify on arrival.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{sign, verify, PublicKey, Signature};
use crate::error::{Error, Result};
use crate::identity::{Did, Identity, PublicIdentity};

/// Requests older than a week are refused.
pub const MAX_REQUEST_AGE_SECS: i64 = 7 * 24 * 60 * 60;

pub const MAX_REQUEST_MESSAGE_LENGTH: usize = 500;

fn signing_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(data)?)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendRequest {
    pub id: String,
    pub from: PublicIdentity,
    pub to_did: String,
    pub message: Option<String>,
    pub created_at: i64,
    pub signature: Signature,
}

#[derive(Serialize)]
struct RequestSignData<'a> {
    id: &'a str,
    from_did: &'a str,
    to_did: &'a str,
    message: &'a Option<String>,
    created_at: i64,
}

impl FriendRequest {
    pub fn create(identity: &Identity, to_did: &str, message: Option<String>) -> Result<Self> {
        if identity.did().as_str() == to_did {
            return Err(Error::CannotAddSelf);
        }
        if message.as_ref().map_or(false, |m| m.chars().count() > MAX_REQUEST_MESSAGE_LENGTH) {
            return Err(Error::InvalidFriendRequest(format!(
                "Message too long: max {} characters",
                MAX_REQUEST_MESSAGE_LENGTH
            )));
        }

        let from = identity.public_identity();
        let id = Uuid::new_v4().to_string();
        let created_at = crate::time::now_timestamp();

        let bytes = signing_bytes(&RequestSignData {
            id: &id,
            from_did: &from.did,
            to_did,
            message: &message,
            created_at,
        })?;

        Ok(Self {
            signature: sign(&identity.keypair().signing, &bytes),
            id,
            from,
            to_did: to_did.to_string(),
            message,
            created_at,
        })
    }

    /// Check the signature and that the sender's DID matches its key.
    pub fn verify(&self) -> Result<()> {
        self.from.validate_did()?;

        let bytes = signing_bytes(&RequestSignData {
            id: &self.id,
            from_did: &self.from.did,
            to_did: &self.to_did,
            message: &self.message,
            created_at: self.created_at,
        })?;
        self.from
            .verify_signature(&bytes, &self.signature)
            .map_err(|_| Error::InvalidFriendRequest("bad signature".into()))
    }

    pub fn is_expired(&self) -> bool {
        crate::time::has_expired(self.created_at, MAX_REQUEST_AGE_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendResponse {
    pub request_id: String,
    pub accepted: bool,
    pub responder_did: String,
    /// Present on acceptance so the requester can add the responder
    pub responder: Option<PublicIdentity>,
    pub created_at: i64,
    pub signature: Signature,
}

#[derive(Serialize)]
struct ResponseSignData<'a> {
    request_id: &'a str,
    accepted: bool,
    responder_did: &'a str,
    created_at: i64,
}

impl FriendResponse {
    fn new(request_id: &str, accepted: bool, identity: &Identity) -> Result<Self> {
        let responder_did = identity.did_string();
        let created_at = crate::time::now_timestamp();
        let bytes = signing_bytes(&ResponseSignData {
            request_id,
            accepted,
            responder_did: &responder_did,
            created_at,
        })?;

        Ok(Self {
            request_id: request_id.to_string(),
            accepted,
            responder: accepted.then(|| identity.public_identity()),
            responder_did,
            created_at,
            signature: sign(&identity.keypair().signing, &bytes),
        })
    }

    pub fn accept(request_id: &str, identity: &Identity) -> Result<Self> {
        Self::new(request_id, true, identity)
    }

    pub fn reject(request_id: &str, identity: &Identity) -> Result<Self> {
        Self::new(request_id, false, identity)
    }

    /// Verify against the DID the original request was sent to.
    pub fn verify(&self, expected_did: &str) -> Result<()> {
        if self.responder_did != expected_did {
            return Err(Error::InvalidFriendRequest("Responder DID mismatch".into()));
        }
        let did = Did::parse(&self.responder_did)?;

        if self.accepted {
            let responder = self.responder.as_ref().ok_or_else(|| {
                Error::InvalidFriendRequest("Acceptance must include responder identity".into())
            })?;
            if responder.did != self.responder_did {
                return Err(Error::InvalidFriendRequest("Responder DID mismatch".into()));
            }
            responder.validate_did()?;
        }

        let bytes = signing_bytes(&ResponseSignData {
            request_id: &self.request_id,
            accepted: self.accepted,
            responder_did: &self.responder_did,
            created_at: self.created_at,
        })?;
        verify(did.public_key(), &bytes, &self.signature)
            .map_err(|_| Error::InvalidFriendRequest("bad signature".into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friend {
    pub did: String,
    pub display_name: String,
    pub status: Option<String>,
    pub avatar: Option<String>,
    pub public_keys: PublicKey,
    pub added_at: i64,
}

impl Friend {
    pub fn from_public_identity(identity: &PublicIdentity) -> Self {
        Self {
            did: identity.did.clone(),
            display_name: identity.display_name.clone(),
            status: identity.status.clone(),
            avatar: identity.avatar.clone(),
            public_keys: identity.public_keys.clone(),
            added_at: crate::time::now_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockedUser {
    pub did: String,
    pub reason: Option<String>,
    pub blocked_at: i64,
}

#[derive(Default)]
struct Graph {
    friends: Vec<Friend>,
    incoming: Vec<FriendRequest>,
    outgoing: Vec<FriendRequest>,
    blocked: HashMap<String, BlockedUser>,
}

impl Graph {
    fn is_friend(&self, did: &str) -> bool {
        self.friends.iter().any(|f| f.did == did)
    }

    fn has_pending(&self, did: &str) -> bool {
        self.outgoing.iter().any(|r| r.to_did == did) || self.incoming.iter().any(|r| r.from.did == did)
    }

    fn request_index(requests: &[FriendRequest], id: &str) -> Result<usize> {
        requests
            .iter()
            .position(|r| r.id == id)
            .ok_or(Error::RequestNotFound)
    }
}

/// In-memory social graph of the local identity.
pub struct FriendsService {
    identity: Arc<Identity>,
    graph: RwLock<Graph>,
}

impl FriendsService {
    pub fn new(identity: Arc<Identity>) -> Self {
        Self {
            identity,
            graph: RwLock::new(Graph::default()),
        }
    }

    pub fn create_request(&self, to_did: &str, message: Option<String>) -> Result<FriendRequest> {
        Did::parse(to_did)?;
        let request = FriendRequest::create(&self.identity, to_did, message)?;

        let mut graph = self.graph.write();
        if graph.is_friend(to_did) {
            return Err(Error::AlreadyFriends);
        }
        if graph.blocked.contains_key(to_did) {
            return Err(Error::UserBlocked);
        }
        if graph.has_pending(to_did) {
            return Err(Error::RequestPending);
        }
        graph.outgoing.push(request.clone());

        tracing::info!("Created friend request to {}", to_did);
        Ok(request)
    }

    pub fn handle_incoming_request(&self, request: FriendRequest) -> Result<()> {
        request.verify()?;

        if request.to_did != self.identity.did().as_str() {
            return Err(Error::InvalidFriendRequest("Request is not for us".into()));
        }
        if request.is_expired() {
            return Err(Error::InvalidFriendRequest("Request has expired".into()));
        }

        let mut graph = self.graph.write();
        if graph.is_friend(&request.from.did) {
            return Err(Error::AlreadyFriends);
        }
        if graph.blocked.contains_key(&request.from.did) {
            return Err(Error::UserBlocked);
        }
        if graph.has_pending(&request.from.did) {
            return Err(Error::RequestPending);
        }

        tracing::info!("Received friend request from {}", request.from.did);
        graph.incoming.push(request);
        Ok(())
    }

    pub fn accept_request(&self, request_id: &str) -> Result<(Friend, FriendResponse)> {
        let mut graph = self.graph.write();
        let index = Graph::request_index(&graph.incoming, request_id)?;
        let response = FriendResponse::accept(request_id, &self.identity)?;
        let request = graph.incoming.remove(index);

        let friend = Friend::from_public_identity(&request.from);
        graph.friends.push(friend.clone());

        tracing::info!("Accepted friend request from {}", friend.did);
        Ok((friend, response))
    }

    pub fn reject_request(&self, request_id: &str) -> Result<FriendResponse> {
        let mut graph = self.graph.write();
        let index = Graph::request_index(&graph.incoming, request_id)?;
        let response = FriendResponse::reject(request_id, &self.identity)?;
        graph.incoming.remove(index);

        tracing::info!("Rejected friend request {}", request_id);
        Ok(response)
    }

    /// Process the answer to one of our outgoing requests.
    ///
    /// Returns the new friend on acceptance.
    pub fn handle_response(&self, response: FriendResponse) -> Result<Option<Friend>> {
        let mut graph = self.graph.write();
        let index = graph
            .outgoing
            .iter()
            .position(|r| r.id == response.request_id)
            .ok_or(Error::RequestNotFound)?;
        response.verify(&graph.outgoing[index].to_did)?;
        graph.outgoing.remove(index);

        if !response.accepted {
            tracing::info!("Friend request {} was rejected", response.request_id);
            return Ok(None);
        }

        let responder = response.responder.as_ref().ok_or_else(|| {
            Error::InvalidFriendRequest("Acceptance missing responder".into())
        })?;
        let friend = Friend::from_public_identity(responder);
        graph.friends.push(friend.clone());

        tracing::info!("Friend request to {} was accepted", friend.did);
        Ok(Some(friend))
    }

    pub fn remove_friend(&self, did: &str) -> Result<()> {
        let mut graph = self.graph.write();
        if !graph.is_friend(did) {
            return Err(Error::NotFriends);
        }
        graph.friends.retain(|f| f.did != did);
        tracing::info!("Removed friend {}", did);
        Ok(())
    }

    /// Block a user, dropping any friendship or pending request with them.
    pub fn block_user(&self, did: &str, reason: Option<String>) -> Result<()> {
        Did::parse(did)?;
        if did == self.identity.did().as_str() {
            return Err(Error::CannotAddSelf);
        }

        let mut graph = self.graph.write();
        graph.friends.retain(|f| f.did != did);
        graph.incoming.retain(|r| r.from.did != did);
        graph.outgoing.retain(|r| r.to_did != did);
        graph.blocked.insert(
            did.to_string(),
            BlockedUser {
                did: did.to_string(),
                reason,
                blocked_at: crate::time::now_timestamp(),
            },
        );
        tracing::info!("Blocked {}", did);
        Ok(())
    }

    /// Returns whether the user was blocked.
    pub fn unblock_user(&self, did: &str) -> bool {
        self.graph.write().blocked.remove(did).is_some()
    }

    pub fn friends(&self) -> Vec<Friend> {
        self.graph.read().friends.clone()
    }

    pub fn get_friend(&self, did: &str) -> Result<Friend> {
        self.graph
            .read()
            .friends
            .iter()
            .find(|f| f.did == did)
            .cloned()
            .ok_or(Error::NotFriends)
    }

    pub fn incoming_requests(&self) -> Vec<FriendRequest> {
        self.graph.read().incoming.clone()
    }

    pub fn outgoing_requests(&self) -> Vec<FriendRequest> {
        self.graph.read().outgoing.clone()
    }

    pub fn blocked_users(&self) -> Vec<BlockedUser> {
        let mut blocked: Vec<_> = self.graph.read().blocked.values().cloned().collect();
        blocked.sort_by_key(|b| b.blocked_at);
        blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> FriendsService {
        let (identity, _) = Identity::create(name).unwrap();
        FriendsService::new(Arc::new(identity))
    }

    fn did_of(service: &FriendsService) -> String {
        service.identity.did_string()
    }

    #[test]
    fn test_request_signature() {
        let (alice, _) = Identity::create("Alice").unwrap();
        let (bob, _) = Identity::create("Bob").unwrap();

        let mut request = FriendRequest::create(&alice, bob.did().as_str(), Some("hi".into())).unwrap();
        assert!(request.verify().is_ok());

        request.message = Some("tampered".into());
        assert_eq!(request.verify().unwrap_err().code(), 605);
    }

    #[test]
    fn test_request_roundtrip_accept() {
        let alice = service("Alice");
        let bob = service("Bob");

        let request = alice.create_request(&did_of(&bob), Some("Hey Bob".into())).unwrap();
        let wire = serde_json::to_string(&request).unwrap();

        bob.handle_incoming_request(serde_json::from_str(&wire).unwrap()).unwrap();
        assert_eq!(bob.incoming_requests().len(), 1);

        let (friend, response) = bob.accept_request(&request.id).unwrap();
        assert_eq!(friend.display_name, "Alice");
        assert!(bob.incoming_requests().is_empty());

        let added = alice.handle_response(response).unwrap().unwrap();
        assert_eq!(added.did, did_of(&bob));
        assert!(alice.outgoing_requests().is_empty());
        assert_eq!(alice.get_friend(&did_of(&bob)).unwrap().display_name, "Bob");

        assert!(matches!(alice.create_request(&did_of(&bob), None), Err(Error::AlreadyFriends)));
    }

    #[test]
    fn test_reject_is_signed() {
        let alice = service("Alice");
        let bob = service("Bob");

        let request = alice.create_request(&did_of(&bob), None).unwrap();
        bob.handle_incoming_request(request.clone()).unwrap();

        let mut response = bob.reject_request(&request.id).unwrap();
        assert!(response.responder.is_none());

        let genuine = response.clone();
        response.accepted = true;
        assert!(response.verify(&did_of(&bob)).is_err());

        assert_eq!(alice.handle_response(genuine).unwrap(), None);
        assert!(alice.friends().is_empty());
    }

    #[test]
    fn test_request_errors() {
        let alice = service("Alice");
        let bob = service("Bob");
        let carol = service("Carol");

        assert!(matches!(alice.create_request(&did_of(&alice), None), Err(Error::CannotAddSelf)));
        assert_eq!(alice.create_request("bob", None).unwrap_err().code(), 204);

        alice.create_request(&did_of(&bob), None).unwrap();
        assert!(matches!(alice.create_request(&did_of(&bob), None), Err(Error::RequestPending)));

        // a request addressed to someone else
        let request = alice.outgoing_requests().remove(0);
        assert_eq!(carol.handle_incoming_request(request).unwrap_err().code(), 605);

        assert!(matches!(bob.accept_request("missing"), Err(Error::RequestNotFound)));
        assert!(matches!(bob.remove_friend(&did_of(&alice)), Err(Error::NotFriends)));
    }

    #[test]
    fn test_answering_removes_only_that_request() {
        let alice = service("Alice");
        let carol = service("Carol");
        let bob = service("Bob");

        let from_alice = alice.create_request(&did_of(&bob), None).unwrap();
        let from_carol = carol.create_request(&did_of(&bob), None).unwrap();
        bob.handle_incoming_request(from_alice.clone()).unwrap();
        bob.handle_incoming_request(from_carol.clone()).unwrap();

        assert!(matches!(bob.accept_request("missing"), Err(Error::RequestNotFound)));
        assert!(matches!(bob.reject_request("missing"), Err(Error::RequestNotFound)));
        assert_eq!(bob.incoming_requests().len(), 2);

        let (friend, response) = bob.accept_request(&from_carol.id).unwrap();
        assert_eq!(friend.did, did_of(&carol));
        assert_eq!(response.request_id, from_carol.id);
        assert_eq!(bob.incoming_requests(), vec![from_alice.clone()]);
        assert!(matches!(bob.accept_request(&from_carol.id), Err(Error::RequestNotFound)));

        let response = bob.reject_request(&from_alice.id).unwrap();
        assert!(!response.accepted);
        assert!(bob.incoming_requests().is_empty());
        assert_eq!(bob.friends().len(), 1);
    }

    #[test]
    fn test_block_and_unblock() {
        let alice = service("Alice");
        let bob = service("Bob");

        bob.block_user(&did_of(&alice), Some("spam".into())).unwrap();
        let request = alice.create_request(&did_of(&bob), None).unwrap();
        assert!(matches!(bob.handle_incoming_request(request.clone()), Err(Error::UserBlocked)));
        assert_eq!(bob.blocked_users().len(), 1);

        assert!(bob.unblock_user(&did_of(&alice)));
        assert!(!bob.unblock_user(&did_of(&alice)));
        bob.handle_incoming_request(request).unwrap();
    }
}

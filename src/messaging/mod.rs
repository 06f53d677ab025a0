//! # Messaging
//!
//! End-to-end encrypted one-to-one text messages between friends.
//!
//! ```text
//! text ──► AES-256-GCM(key = HKDF(X25519(ours, theirs), conversation_id),
//!                      aad = sender | recipient | timestamp)
//!      ──► MessageEnvelope { nonce, ciphertext, signature(Ed25519) }
//! ```
//!
//! The envelope is handed back to the host for delivery; the receiving side
//! feeds it to [`MessagingService::receive`].

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::crypto::{conversation_key, decrypt, encrypt, sign, verify, Nonce, Signature, NONCE_SIZE};
use crate::error::{Error, Result};
use crate::friends::Friend;
use crate::identity::Identity;

pub const MESSAGE_PROTOCOL_VERSION: u8 = 1;

/// Maximum plaintext size of a message (64 KiB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Page size used when the caller passes a limit of 0.
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_did: String,
    pub recipient_did: String,
    pub text: String,
    /// Unix millis
    pub timestamp: i64,
    pub status: MessageStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub friend_did: String,
    pub created_at: i64,
    pub last_message_at: Option<i64>,
    pub unread_count: u32,
}

impl Conversation {
    /// Deterministic id for the conversation between two DIDs.
    ///
    /// Both sides compute the same value regardless of argument order.
    pub fn generate_id(did1: &str, did2: &str) -> String {
        let (first, second) = if did1 <= did2 { (did1, did2) } else { (did2, did1) };

        let mut hasher = Sha256::new();
        hasher.update(first.as_bytes());
        hasher.update(b"|");
        hasher.update(second.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Encrypted, signed form of a [`Message`] as it travels between peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub version: u8,
    pub id: String,
    pub sender_did: String,
    pub recipient_did: String,
    pub conversation_id: String,
    pub timestamp: i64,
    /// Base64
    pub nonce: String,
    /// Base64
    pub ciphertext: String,
    pub signature: Signature,
}

#[derive(Serialize)]
struct EnvelopeSignData<'a> {
    version: u8,
    id: &'a str,
    sender_did: &'a str,
    recipient_did: &'a str,
    conversation_id: &'a str,
    timestamp: i64,
    nonce: &'a str,
    ciphertext: &'a str,
}

fn build_aad(sender_did: &str, recipient_did: &str, timestamp: i64) -> Vec<u8> {
    let mut aad = Vec::with_capacity(sender_did.len() + recipient_did.len() + 8);
    aad.extend_from_slice(sender_did.as_bytes());
    aad.extend_from_slice(recipient_did.as_bytes());
    aad.extend_from_slice(&timestamp.to_be_bytes());
    aad
}

impl MessageEnvelope {
    fn sign_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&EnvelopeSignData {
            version: self.version,
            id: &self.id,
            sender_did: &self.sender_did,
            recipient_did: &self.recipient_did,
            conversation_id: &self.conversation_id,
            timestamp: self.timestamp,
            nonce: &self.nonce,
            ciphertext: &self.ciphertext,
        })?)
    }

    pub fn seal(message: &Message, sender: &Identity, recipient: &Friend) -> Result<Self> {
        let key = conversation_key(
            &sender.keypair().encryption,
            &recipient.public_keys.encryption,
            message.conversation_id.as_bytes(),
        )?;
        let aad = build_aad(&message.sender_did, &message.recipient_did, message.timestamp);
        let (nonce, ciphertext) = encrypt(&key, message.text.as_bytes(), &aad)?;

        let mut envelope = Self {
            version: MESSAGE_PROTOCOL_VERSION,
            id: message.id.clone(),
            sender_did: message.sender_did.clone(),
            recipient_did: message.recipient_did.clone(),
            conversation_id: message.conversation_id.clone(),
            timestamp: message.timestamp,
            nonce: BASE64.encode(nonce.0),
            ciphertext: BASE64.encode(ciphertext),
            signature: Signature([0u8; 64]),
        };
        envelope.signature = sign(&sender.keypair().signing, &envelope.sign_bytes()?);
        Ok(envelope)
    }

    /// Verify and decrypt an envelope sent to `recipient` by `sender`.
    pub fn open(&self, recipient: &Identity, sender: &Friend) -> Result<Message> {
        if self.version != MESSAGE_PROTOCOL_VERSION {
            return Err(Error::ProtocolError(format!(
                "Unsupported message protocol version: {} (expected {})",
                self.version, MESSAGE_PROTOCOL_VERSION
            )));
        }
        if self.sender_did != sender.did {
            return Err(Error::InvalidMessageContent("Sender DID mismatch".into()));
        }
        if self.recipient_did != recipient.did().as_str() {
            return Err(Error::InvalidMessageContent("Message not for us".into()));
        }
        if self.conversation_id != Conversation::generate_id(&self.sender_did, &self.recipient_did) {
            return Err(Error::InvalidMessageContent("Conversation id mismatch".into()));
        }

        verify(&sender.public_keys.signing, &self.sign_bytes()?, &self.signature)?;

        let nonce: [u8; NONCE_SIZE] = BASE64
            .decode(&self.nonce)
            .map_err(|e| Error::DeserializationError(format!("Invalid nonce: {}", e)))?
            .try_into()
            .map_err(|_| Error::DeserializationError("Invalid nonce length".into()))?;
        let ciphertext = BASE64
            .decode(&self.ciphertext)
            .map_err(|e| Error::DeserializationError(format!("Invalid ciphertext: {}", e)))?;

        let key = conversation_key(
            &recipient.keypair().encryption,
            &sender.public_keys.encryption,
            self.conversation_id.as_bytes(),
        )?;
        let aad = build_aad(&self.sender_did, &self.recipient_did, self.timestamp);
        let plaintext = decrypt(&key, &Nonce(nonce), &ciphertext, &aad)?;

        let text = String::from_utf8(plaintext)
            .map_err(|_| Error::InvalidMessageContent("Message is not UTF-8".into()))?;

        Ok(Message {
            id: self.id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_did: self.sender_did.clone(),
            recipient_did: self.recipient_did.clone(),
            text,
            timestamp: self.timestamp,
            status: MessageStatus::Delivered,
        })
    }
}

#[derive(Default)]
struct Store {
    conversations: HashMap<String, Conversation>,
    /// Ordered oldest first
    messages: HashMap<String, Vec<Message>>,
}

impl Store {
    fn conversation_for(&mut self, id: &str, friend_did: &str) -> &mut Conversation {
        self.conversations.entry(id.to_string()).or_insert_with(|| Conversation {
            id: id.to_string(),
            friend_did: friend_did.to_string(),
            created_at: crate::time::now_timestamp(),
            last_message_at: None,
            unread_count: 0,
        })
    }

    /// Insert keeping timestamp order. Returns false for a duplicate id.
    fn insert(&mut self, message: Message) -> bool {
        let messages = self.messages.entry(message.conversation_id.clone()).or_default();
        if messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let at = messages.partition_point(|m| m.timestamp <= message.timestamp);
        messages.insert(at, message);
        true
    }
}

pub struct MessagingService {
    identity: Arc<Identity>,
    store: RwLock<Store>,
}

impl MessagingService {
    pub fn new(identity: Arc<Identity>) -> Self {
        Self {
            identity,
            store: RwLock::new(Store::default()),
        }
    }

    pub fn send_text(&self, friend: &Friend, text: &str) -> Result<(Message, MessageEnvelope)> {
        if text.trim().is_empty() {
            return Err(Error::InvalidMessageContent("Message cannot be empty".into()));
        }
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidMessageContent(format!(
                "Message too large: {} bytes (max {})",
                text.len(),
                MAX_MESSAGE_SIZE
            )));
        }

        let our_did = self.identity.did_string();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: Conversation::generate_id(&our_did, &friend.did),
            sender_did: our_did,
            recipient_did: friend.did.clone(),
            text: text.to_string(),
            timestamp: crate::time::now_timestamp_millis(),
            status: MessageStatus::Sent,
        };
        let envelope = MessageEnvelope::seal(&message, &self.identity, friend)?;

        let mut store = self.store.write();
        store.conversation_for(&message.conversation_id, &friend.did).last_message_at =
            Some(message.timestamp);
        store.insert(message.clone());

        tracing::debug!("Sent message {} to {}", message.id, friend.did);
        Ok((message, envelope))
    }

    /// Store an incoming envelope. Replays of a known id return the stored copy.
    pub fn receive(&self, envelope: &MessageEnvelope, sender: &Friend) -> Result<Message> {
        let message = envelope.open(&self.identity, sender)?;

        let mut store = self.store.write();
        if let Some(existing) = store
            .messages
            .get(&message.conversation_id)
            .and_then(|msgs| msgs.iter().find(|m| m.id == message.id))
        {
            return Ok(existing.clone());
        }

        let conversation = store.conversation_for(&message.conversation_id, &sender.did);
        conversation.unread_count += 1;
        conversation.last_message_at = conversation.last_message_at.max(Some(message.timestamp));
        store.insert(message.clone());

        tracing::debug!("Received message {} from {}", message.id, sender.did);
        Ok(message)
    }

    /// Most recent activity first.
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut conversations: Vec<_> = self.store.read().conversations.values().cloned().collect();
        conversations.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        conversations
    }

    /// Up to `limit` messages (0 means [`DEFAULT_PAGE_SIZE`]) ending just
    /// before `before_id`, or at the newest message. Oldest first.
    pub fn messages(&self, conversation_id: &str, limit: usize, before_id: Option<&str>) -> Result<Vec<Message>> {
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };

        let store = self.store.read();
        if !store.conversations.contains_key(conversation_id) {
            return Err(Error::ConversationNotFound);
        }
        let messages = store.messages.get(conversation_id).map(Vec::as_slice).unwrap_or_default();

        let end = match before_id {
            Some(id) => messages
                .iter()
                .position(|m| m.id == id)
                .ok_or(Error::MessageNotFound)?,
            None => messages.len(),
        };
        let start = end.saturating_sub(limit);
        Ok(messages[start..end].to_vec())
    }

    /// Mark every received message in the conversation as read.
    pub fn mark_read(&self, conversation_id: &str) -> Result<usize> {
        let mut store = self.store.write();
        let conversation = store
            .conversations
            .get_mut(conversation_id)
            .ok_or(Error::ConversationNotFound)?;
        conversation.unread_count = 0;

        let our_did = self.identity.did().as_str();
        let mut marked = 0;
        if let Some(messages) = store.messages.get_mut(conversation_id) {
            for message in messages.iter_mut().filter(|m| m.recipient_did == our_did) {
                if message.status != MessageStatus::Read {
                    message.status = MessageStatus::Read;
                    marked += 1;
                }
            }
        }
        Ok(marked)
    }
}

//! Messaging dispatch handlers (direct messages).

use std::sync::Arc;

use serde_json::{json, Value};

use super::dispatcher::{json_parse, ok_json, optional_str, require_str, require_value, DResult, Handler};
use super::events::emit_event;
use super::state::Core;
use crate::error::{Error, Result};
use crate::friends::FriendsService;
use crate::messaging::{MessageEnvelope, MessagingService};

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_messaging_send_text", messaging_send_text),
    ("umbra_messaging_get_conversations", messaging_get_conversations),
    ("umbra_messaging_get_messages", messaging_get_messages),
    ("umbra_messaging_receive", messaging_receive),
    ("umbra_messaging_mark_read", messaging_mark_read),
];

fn services(core: &Core) -> Result<(Arc<FriendsService>, Arc<MessagingService>)> {
    let state = core.state()?;
    let state = state.read();
    Ok((state.friends()?, state.messaging()?))
}

/// Page size from the payload: absent means default, negative is refused.
fn page_limit(data: &Value) -> Result<usize> {
    match data.get("limit") {
        None | Some(Value::Null) => Ok(0),
        Some(limit) => {
            let limit = limit
                .as_i64()
                .ok_or_else(|| Error::InvalidArgument("limit must be an integer".into()))?;
            usize::try_from(limit).map_err(|_| Error::InvalidArgument(format!("limit must not be negative: {}", limit)))
        }
    }
}

fn messaging_send_text(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let recipient_did = require_str(&data, "recipient_did")?;
    let text = data
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingArgument("text".into()))?;

    let (friends, messaging) = services(core)?;
    let friend = friends.get_friend(recipient_did)?;
    let (message, envelope) = messaging.send_text(&friend, text)?;

    emit_event(
        "message_sent",
        &json!({
            "id": message.id,
            "conversation_id": message.conversation_id,
            "recipient_did": message.recipient_did,
        }),
    );
    ok_json(&json!({
        "id": message.id,
        "conversation_id": message.conversation_id,
        "timestamp": message.timestamp,
        "envelope": envelope,
    }))
}

fn messaging_get_conversations(core: &Core, _args: &str) -> DResult {
    let (_, messaging) = services(core)?;
    ok_json(&messaging.conversations())
}

fn messaging_get_messages(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let conversation_id = require_str(&data, "conversation_id")?;
    let limit = page_limit(&data)?;
    let before_id = optional_str(&data, "before_id");

    let (_, messaging) = services(core)?;
    ok_json(&messaging.messages(conversation_id, limit, before_id)?)
}

fn messaging_receive(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let envelope: MessageEnvelope = require_value(&data, "envelope")?;

    let (friends, messaging) = services(core)?;
    let sender = friends.get_friend(&envelope.sender_did)?;
    let message = messaging.receive(&envelope, &sender)?;

    emit_event("message_received", &message);
    ok_json(&message)
}

fn messaging_mark_read(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let conversation_id = require_str(&data, "conversation_id")?;

    let (_, messaging) = services(core)?;
    let marked = messaging.mark_read(conversation_id)?;
    ok_json(&json!({ "marked": marked }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::state::InitOptions;
    use crate::friends::Friend;
    use crate::identity::Identity;

    struct Party {
        core: Core,
        identity: Arc<Identity>,
    }

    fn party(name: &str) -> Party {
        let core = Core::new();
        core.init(InitOptions::default()).unwrap();
        let (identity, _) = Identity::create(name).unwrap();
        let identity = core.state().unwrap().write().load_identity(identity).unwrap();
        Party { core, identity }
    }

    /// Make `a` and `b` friends without going through the request flow.
    fn befriend(a: &Party, b: &Party) {
        let (a_friends, _) = services(&a.core).unwrap();
        let (b_friends, _) = services(&b.core).unwrap();

        let request = b_friends.create_request(&a.identity.did_string(), None).unwrap();
        a_friends.handle_incoming_request(request.clone()).unwrap();
        let (_, response) = a_friends.accept_request(&request.id).unwrap();
        b_friends.handle_response(response).unwrap();
    }

    fn call(handler: Handler, party: &Party, args: Value) -> Value {
        let data = handler(&party.core, &args.to_string()).unwrap().unwrap();
        serde_json::from_str(&data).unwrap()
    }

    #[test]
    fn test_send_requires_friend() {
        let alice = party("Alice");
        let bob = party("Bob");
        let args = json!({ "recipient_did": bob.identity.did_string(), "text": "hi" });
        let err = messaging_send_text(&alice.core, &args.to_string()).unwrap_err();
        assert_eq!(err.code(), 601);
    }

    #[test]
    fn test_send_receive_page() {
        let alice = party("Alice");
        let bob = party("Bob");
        befriend(&alice, &bob);

        let mut last = Value::Null;
        for i in 0..3 {
            last = call(
                messaging_send_text,
                &alice,
                json!({ "recipient_did": bob.identity.did_string(), "text": format!("hello {}", i) }),
            );
        }
        let conversation_id = last["conversation_id"].as_str().unwrap().to_string();

        let received = call(messaging_receive, &bob, json!({ "envelope": last["envelope"] }));
        assert_eq!(received["text"], "hello 2");
        assert_eq!(received["sender_did"], alice.identity.did_string().as_str());

        let conversations = call(messaging_get_conversations, &bob, json!({}));
        assert_eq!(conversations[0]["unread_count"], 1);
        let marked = call(messaging_mark_read, &bob, json!({ "conversation_id": conversation_id }));
        assert_eq!(marked["marked"], 1);

        let page = call(
            messaging_get_messages,
            &alice,
            json!({ "conversation_id": conversation_id, "limit": 0 }),
        );
        assert_eq!(page.as_array().unwrap().len(), 3);

        let page = call(
            messaging_get_messages,
            &alice,
            json!({ "conversation_id": conversation_id, "limit": 1 }),
        );
        assert_eq!(page[0]["text"], "hello 2");

        let args = json!({ "conversation_id": conversation_id, "limit": -1 }).to_string();
        assert_eq!(messaging_get_messages(&alice.core, &args).unwrap_err().code(), 3);
    }

    #[test]
    fn test_unknown_conversation() {
        let alice = party("Alice");
        let args = r#"{"conversation_id":"deadbeef"}"#;
        assert_eq!(messaging_get_messages(&alice.core, args).unwrap_err().code(), 700);
        assert_eq!(messaging_mark_read(&alice.core, args).unwrap_err().code(), 700);
    }

    #[test]
    fn test_receive_from_stranger() {
        let alice = party("Alice");
        let bob = party("Bob");
        let bob_as_friend = Friend::from_public_identity(&bob.identity.public_identity());

        let (_, alice_messaging) = services(&alice.core).unwrap();
        let (_, envelope) = alice_messaging.send_text(&bob_as_friend, "hi").unwrap();
        let args = json!({ "envelope": envelope }).to_string();
        assert_eq!(messaging_receive(&bob.core, &args).unwrap_err().code(), 601);
    }

    #[test]
    fn test_empty_text() {
        let alice = party("Alice");
        let bob = party("Bob");
        befriend(&alice, &bob);
        let args = json!({ "recipient_did": bob.identity.did_string(), "text": "" });
        assert_eq!(messaging_send_text(&alice.core, &args.to_string()).unwrap_err().code(), 704);
    }
}

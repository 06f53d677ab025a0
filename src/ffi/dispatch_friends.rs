//! Friends dispatch handlers.
//!
//! Requests and responses are signed objects that travel between peers.
//! The `send`/`accept`/`reject` handlers return them for the host to deliver;
//! `receive_request`/`receive_response` take them in on the other side.

use std::sync::Arc;

use serde_json::json;

use super::dispatcher::{
    json_parse, ok_empty, ok_json, optional_str, require_str, require_value, DResult, Handler,
};
use super::events::emit_event;
use super::state::Core;
use crate::friends::{FriendRequest, FriendResponse, FriendsService};

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_friends_send_request", friends_send_request),
    ("umbra_friends_accept_request", friends_accept_request),
    ("umbra_friends_reject_request", friends_reject_request),
    ("umbra_friends_list", friends_list),
    ("umbra_friends_pending_requests", friends_pending_requests),
    ("umbra_friends_outgoing_requests", friends_outgoing_requests),
    ("umbra_friends_receive_request", friends_receive_request),
    ("umbra_friends_receive_response", friends_receive_response),
    ("umbra_friends_remove", friends_remove),
    ("umbra_friends_block", friends_block),
    ("umbra_friends_unblock", friends_unblock),
];

fn friends(core: &Core) -> crate::Result<Arc<FriendsService>> {
    core.state()?.read().friends()
}

fn friends_send_request(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let did = require_str(&data, "did")?;
    let message = optional_str(&data, "message").map(str::to_string);

    let request = friends(core)?.create_request(did, message)?;
    ok_json(&json!({
        "id": request.id,
        "to_did": request.to_did,
        "status": "pending",
        "request": request,
    }))
}

fn friends_accept_request(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let request_id = require_str(&data, "request_id")?;

    let (friend, response) = friends(core)?.accept_request(request_id)?;
    emit_event("friend_added", &friend);
    ok_json(&json!({
        "did": friend.did,
        "display_name": friend.display_name,
        "response": response,
    }))
}

fn friends_reject_request(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let request_id = require_str(&data, "request_id")?;

    let response = friends(core)?.reject_request(request_id)?;
    ok_json(&json!({ "request_id": request_id, "response": response }))
}

fn friends_list(core: &Core, _args: &str) -> DResult {
    ok_json(&friends(core)?.friends())
}

fn friends_pending_requests(core: &Core, _args: &str) -> DResult {
    ok_json(&friends(core)?.incoming_requests())
}

fn friends_outgoing_requests(core: &Core, _args: &str) -> DResult {
    ok_json(&friends(core)?.outgoing_requests())
}

fn friends_receive_request(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let request: FriendRequest = require_value(&data, "request")?;

    friends(core)?.handle_incoming_request(request.clone())?;
    emit_event("friend_request_received", &request);
    ok_json(&json!({ "id": request.id, "from_did": request.from.did }))
}

fn friends_receive_response(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let response: FriendResponse = require_value(&data, "response")?;

    let friend = friends(core)?.handle_response(response.clone())?;
    match &friend {
        Some(friend) => {
            emit_event(
                "friend_request_accepted",
                &json!({ "request_id": response.request_id, "did": friend.did }),
            );
            emit_event("friend_added", friend);
        }
        None => emit_event(
            "friend_request_rejected",
            &json!({ "request_id": response.request_id, "did": response.responder_did }),
        ),
    }
    ok_json(&json!({
        "request_id": response.request_id,
        "accepted": response.accepted,
        "friend": friend,
    }))
}

fn friends_remove(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    friends(core)?.remove_friend(require_str(&data, "did")?)?;
    ok_empty()
}

fn friends_block(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let did = require_str(&data, "did")?;
    let reason = optional_str(&data, "reason").map(str::to_string);
    friends(core)?.block_user(did, reason)?;
    ok_empty()
}

fn friends_unblock(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let unblocked = friends(core)?.unblock_user(require_str(&data, "did")?);
    ok_json(&json!({ "unblocked": unblocked }))
}

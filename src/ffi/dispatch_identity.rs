//! Identity dispatch handlers.

use serde_json::json;

use super::dispatcher::{json_parse, ok_empty, ok_json, parse_args, require_str, DResult, Handler};
use super::events::emit_event;
use super::state::Core;
use crate::error::Error;
use crate::identity::{Identity, ProfileUpdate, RecoveryPhrase};

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_identity_create", identity_create),
    ("umbra_identity_restore", identity_restore),
    ("umbra_identity_get_did", identity_get_did),
    ("umbra_identity_get_profile", identity_get_profile),
    ("umbra_identity_update_profile", identity_update_profile),
];

/// Install `identity` into the core and announce it.
fn load(core: &Core, identity: Identity) -> crate::Result<String> {
    let state = core.state()?;
    let identity = state.write().load_identity(identity)?;

    let did = identity.did_string();
    tracing::info!("Identity loaded: {}", did);
    emit_event(
        "identity_loaded",
        &json!({ "did": did, "display_name": identity.display_name() }),
    );
    Ok(did)
}

fn ensure_no_identity(core: &Core) -> crate::Result<()> {
    if core.state()?.read().identity.is_some() {
        return Err(Error::IdentityExists);
    }
    Ok(())
}

fn identity_create(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let name = require_str(&data, "display_name")?;
    ensure_no_identity(core)?;

    let (identity, recovery_phrase) = Identity::create(name)?;
    let phrase = recovery_phrase.phrase();
    let did = load(core, identity)?;
    ok_json(&json!({ "did": did, "recovery_phrase": phrase }))
}

fn identity_restore(core: &Core, args: &str) -> DResult {
    let data = json_parse(args)?;
    let phrase = require_str(&data, "recovery_phrase")?;
    let name = require_str(&data, "display_name")?;
    ensure_no_identity(core)?;

    let recovery = RecoveryPhrase::from_phrase(phrase)?;
    let identity = Identity::from_recovery_phrase(&recovery, name)?;
    ok_json(&load(core, identity)?)
}

fn identity_get_did(core: &Core, _args: &str) -> DResult {
    let identity = core.state()?.read().identity()?;
    ok_json(&identity.did_string())
}

fn identity_get_profile(core: &Core, _args: &str) -> DResult {
    let identity = core.state()?.read().identity()?;
    let profile = identity.profile();
    let keys = identity.keypair().public_keys();
    ok_json(&json!({
        "did": identity.did_string(),
        "display_name": profile.display_name,
        "status": profile.status,
        "avatar": profile.avatar,
        "signing_key": hex::encode(keys.signing),
        "encryption_key": hex::encode(keys.encryption),
    }))
}

fn identity_update_profile(core: &Core, args: &str) -> DResult {
    let update: ProfileUpdate = parse_args(args)?;
    let identity = core.state()?.read().identity()?;
    identity.update_profile(update)?;
    ok_empty()
}

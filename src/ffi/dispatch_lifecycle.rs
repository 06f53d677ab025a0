//! Lifecycle dispatch handlers.

use super::dispatcher::{methods, ok_empty, ok_json, parse_args, DResult, Handler};
use super::logging::init_logging;
use super::state::{Core, InitOptions};

pub(super) const METHODS: &[(&str, Handler)] = &[
    ("umbra_init", init),
    ("umbra_shutdown", shutdown),
    ("umbra_version", version),
    ("umbra_methods", list_methods),
];

fn init(core: &Core, args: &str) -> DResult {
    init_logging();
    let options: InitOptions = parse_args(args)?;
    core.init(options)?;
    ok_empty()
}

fn shutdown(core: &Core, _args: &str) -> DResult {
    core.shutdown()?;
    ok_empty()
}

fn version(_core: &Core, _args: &str) -> DResult {
    ok_json(crate::version())
}

fn list_methods(_core: &Core, _args: &str) -> DResult {
    ok_json(&methods().names())
}

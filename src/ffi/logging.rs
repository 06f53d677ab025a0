//! Log setup for hosts that embed the library.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "UMBRA_LOG";

#[cfg(feature = "verbose-logging")]
const DEFAULT_FILTER: &str = "debug";
#[cfg(not(feature = "verbose-logging"))]
const DEFAULT_FILTER: &str = "warn";

/// Install a global fmt subscriber. Later calls, or a host that already
/// installed its own subscriber, leave the existing one in place.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
        tracing::debug!("logging initialized");
    }
}

//! Structured logging setup.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DROPLET_LOG";

/// Install the global fmt subscriber. Output goes to stderr so stdout stays
/// free for command results and RPC responses. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

//! Log output for the demo host.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Installs a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Records from the `log` facade are forwarded to it.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .map_err(|err| anyhow!(err))
}

//! Tracing subscriber setup for binaries

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber at `level`
///
/// `RUST_LOG`, when set, takes precedence over `level`.
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::Config(format!("invalid log level '{}': {}", level, e)))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Internal(format!("failed to install tracing subscriber: {}", e)))
}

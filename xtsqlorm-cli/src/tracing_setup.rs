//! Tracing setup for the xtsqlorm CLI
//!
//! Usage:
//!   xtsqlorm --debug ...              # Debug logging to stderr
//!   xtsqlorm --echo ...               # Log every SQL statement
//!   RUST_LOG=xtsqlorm=debug xtsqlorm  # Fine-grained log control
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets RUST_LOG=debug if not already set)
    pub debug: bool,
}

pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let fallback = if config.debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

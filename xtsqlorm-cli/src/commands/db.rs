//! Connectivity commands: ping, pool-status, connect-str

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::debug;

use super::Target;

#[derive(Args, Debug)]
pub struct ConnectStrArgs {
    /// Registry key (defaults to --db-key)
    pub key: Option<String>,

    /// Driver alias for the URL scheme (e.g. mariadb, postgres)
    #[arg(long)]
    pub driver: Option<String>,
}

pub async fn run_ping(target: &Target) -> Result<()> {
    let manager = target.connect().await?;
    let alive = manager.ping().await;
    let dialect = manager.dialect();
    manager.dispose().await;

    if !alive {
        bail!("{dialect} database did not answer");
    }
    println!("ok ({dialect})");
    Ok(())
}

pub async fn run_pool_status(target: &Target) -> Result<()> {
    let manager = target.connect().await?;
    // Touch the pool so the counters reflect a live connection
    manager.ping().await;
    let status = manager
        .pool_status()
        .context("Connection pool is already disposed")?;
    debug!(?status, "pool status");
    manager.dispose().await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub fn run_connect_str(target: &Target, args: ConnectStrArgs) -> Result<()> {
    let registry = target.registry()?;
    let key = args.key.as_deref().unwrap_or(&target.db_key);
    let url = registry
        .connect_str(key, args.driver.as_deref())
        .with_context(|| format!("Failed to build connection URL for '{key}'"))?;
    println!("{url}");
    Ok(())
}

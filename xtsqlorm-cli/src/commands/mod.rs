//! Subcommand implementations

pub mod data;
pub mod db;
pub mod table;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use xtsqlorm::{ConnectionManager, EngineOptions, Registry, DEFAULT_KEY};

pub use data::{run_export, run_stats, ExportArgs, StatsArgs};
pub use db::{run_connect_str, run_ping, run_pool_status, ConnectStrArgs};
pub use table::{
    run_copy_table, run_gen_model, run_reflect, run_tables, CopyTableArgs, GenModelArgs,
    ReflectArgs,
};

/// Which database a command talks to
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Connection URL, e.g. sqlite://app.db?mode=rwc (wins over --db-key)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Registry key of the database
    #[arg(long, global = true, default_value = DEFAULT_KEY)]
    pub db_key: String,

    /// Path to the database registry TOML
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log every SQL statement
    #[arg(long, global = true)]
    pub echo: bool,
}

impl Target {
    pub fn registry(&self) -> Result<Registry> {
        let registry = match &self.config {
            Some(path) => Registry::load_from(path)?,
            None => Registry::load()?,
        };
        Ok(registry)
    }

    pub fn options(&self) -> Result<EngineOptions> {
        // One-shot commands never need more than a couple of connections
        let options = EngineOptions::new()
            .db_key(&self.db_key)
            .pool_size(1)
            .max_overflow(1)
            .echo(self.echo);

        match &self.url {
            Some(url) => Ok(options.url(url)),
            None => Ok(options.registry(self.registry()?)),
        }
    }

    pub async fn connect(&self) -> Result<ConnectionManager> {
        let options = self.options()?;
        ConnectionManager::connect(options)
            .await
            .context("Failed to connect to database")
    }
}

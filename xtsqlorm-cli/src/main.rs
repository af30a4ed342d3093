//! xtsqlorm CLI - inspect, copy and export database tables
//!
//! The connection target is `--url`, or the registry entry named by `--db-key`
//! (registry at `--config`, `$XTSQLORM_CONFIG` or `~/.xtsqlorm/config.toml`).

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use commands::{
    ConnectStrArgs, CopyTableArgs, ExportArgs, GenModelArgs, ReflectArgs, StatsArgs, Target,
};
use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "xtsqlorm",
    author,
    version,
    about = "Inspect, copy and export database tables",
    long_about = "Work with any database the xtsqlorm registry or a connection URL points at: \
                  check connectivity, reflect and copy tables, generate Rust models and export rows."
)]
struct Cli {
    #[command(flatten)]
    target: Target,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the database answers a trivial query
    Ping,
    /// Show connection pool counters as JSON
    PoolStatus,
    /// Print the connection URL for a registry key
    ConnectStr(ConnectStrArgs),
    /// List the tables in the database
    Tables,
    /// Show the columns of a table
    Reflect(ReflectArgs),
    /// Create a new table with the structure of an existing one
    CopyTable(CopyTableArgs),
    /// Generate a Rust model struct for a table
    GenModel(GenModelArgs),
    /// Count, min, max and average of one column
    Stats(StatsArgs),
    /// Export table rows as JSON
    Export(ExportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Ping => commands::run_ping(&cli.target).await,
        Commands::PoolStatus => commands::run_pool_status(&cli.target).await,
        Commands::ConnectStr(args) => commands::run_connect_str(&cli.target, args),
        Commands::Tables => commands::run_tables(&cli.target).await,
        Commands::Reflect(args) => commands::run_reflect(&cli.target, args).await,
        Commands::CopyTable(args) => commands::run_copy_table(&cli.target, args).await,
        Commands::GenModel(args) => commands::run_gen_model(&cli.target, args).await,
        Commands::Stats(args) => commands::run_stats(&cli.target, args).await,
        Commands::Export(args) => commands::run_export(&cli.target, args).await,
    }
}

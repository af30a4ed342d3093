//! Table commands: tables, reflect, copy-table, gen-model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::Target;

#[derive(Args, Debug)]
pub struct ReflectArgs {
    /// Table to inspect
    pub table: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CopyTableArgs {
    /// Existing table
    pub source: String,

    /// New table (replaced if it exists)
    pub target: String,
}

#[derive(Args, Debug)]
pub struct GenModelArgs {
    /// Table to generate a model for
    pub table: String,

    /// Write the model to this file instead of stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

pub async fn run_tables(target: &Target) -> Result<()> {
    let manager = target.connect().await?;
    let tables = xtsqlorm::list_tables(&manager).await?;
    manager.dispose().await;

    for table in tables {
        println!("{table}");
    }
    Ok(())
}

pub async fn run_reflect(target: &Target, args: ReflectArgs) -> Result<()> {
    let manager = target.connect().await?;
    let shape = xtsqlorm::reflect_table(&manager, &args.table).await;
    manager.dispose().await;
    let shape = shape?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shape)?);
        return Ok(());
    }

    println!("{}", shape.name());
    for column in shape.columns() {
        let mut flags = Vec::new();
        if column.primary_key {
            flags.push("primary key".to_string());
        }
        if column.auto_increment {
            flags.push("auto increment".to_string());
        }
        if !column.nullable {
            flags.push("not null".to_string());
        }
        if let Some(default) = &column.default {
            flags.push(format!("default {default}"));
        }
        println!(
            "  {:<24} {:<10} {}",
            column.name,
            format!("{:?}", column.column_type).to_lowercase(),
            flags.join(", ")
        );
    }
    Ok(())
}

pub async fn run_copy_table(target: &Target, args: CopyTableArgs) -> Result<()> {
    let manager = target.connect().await?;
    let copied = xtsqlorm::copy_table(&manager, &args.source, &args.target).await;
    manager.dispose().await;
    let shape = copied
        .with_context(|| format!("Failed to copy {} to {}", args.source, args.target))?;

    info!(source = %args.source, target = %shape.name(), "table copied");
    println!("Created {} ({} columns)", shape.name(), shape.columns().len());
    Ok(())
}

pub async fn run_gen_model(target: &Target, args: GenModelArgs) -> Result<()> {
    let manager = target.connect().await?;

    let result = match &args.out {
        Some(path) => xtsqlorm::generate_model_file(&manager, &args.table, path)
            .await
            .map(|_| None),
        None => xtsqlorm::reflect_table(&manager, &args.table)
            .await
            .map(|shape| Some(xtsqlorm::generate_model_source(&shape))),
    };
    manager.dispose().await;

    match result? {
        Some(source) => print!("{source}"),
        None => {
            if let Some(path) = &args.out {
                println!("Wrote {}", path.display());
            }
        }
    }
    Ok(())
}

//! Data commands: stats, export

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use xtsqlorm::{Condition, ConnectionManager, Operations, Record, Repository, SessionProvider, Value};

use super::Target;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Table to read
    pub table: String,

    /// Column to summarize
    pub column: String,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Table to export
    pub table: String,

    /// Columns to include, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Equality filter as column=value; repeat to AND several
    #[arg(long = "where", value_name = "COLUMN=VALUE")]
    pub filters: Vec<String>,

    /// Write JSON to this file instead of stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

/// Operations over a table whose shape is read from the database
async fn table_operations(manager: &ConnectionManager, table: &str) -> Result<Operations<Record>> {
    let shape = xtsqlorm::reflect_table(manager, table).await?;
    let provider = SessionProvider::new(manager.clone());
    Ok(Operations::new(Repository::with_shape(shape, provider)).cache_enabled(false))
}

/// Integers and floats bind as numbers, everything else as text
fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::from(float);
    }
    Value::from(raw)
}

fn parse_filters(filters: &[String]) -> Result<Option<Condition>> {
    let mut condition: Option<Condition> = None;
    for filter in filters {
        let Some((column, value)) = filter.split_once('=') else {
            bail!("Invalid filter '{filter}', expected COLUMN=VALUE");
        };
        let eq = Condition::eq(column.trim(), parse_value(value.trim()));
        condition = Some(match condition {
            Some(existing) => existing.and(eq),
            None => eq,
        });
    }
    Ok(condition)
}

pub async fn run_stats(target: &Target, args: StatsArgs) -> Result<()> {
    let manager = target.connect().await?;
    let stats = match table_operations(&manager, &args.table).await {
        Ok(ops) => ops.get_field_stats(&args.column).await.map_err(Into::into),
        Err(err) => Err(err),
    };
    manager.dispose().await;
    let stats = stats?;

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

pub async fn run_export(target: &Target, args: ExportArgs) -> Result<()> {
    let filter = parse_filters(&args.filters)?;
    let manager = target.connect().await?;

    let columns: Vec<&str> = args.columns.iter().map(String::as_str).collect();
    let selected = (!columns.is_empty()).then_some(columns.as_slice());

    let table = match table_operations(&manager, &args.table).await {
        Ok(ops) => ops.export_table(selected, filter).await.map_err(Into::into),
        Err(err) => Err(err),
    };
    manager.dispose().await;
    let table = table?;

    let json = serde_json::to_string_pretty(&table.to_json())?;
    match &args.out {
        Some(path) => {
            fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported {} rows to {}", table.num_rows(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_parse_as_numbers_when_they_can() {
        assert_eq!(parse_value("42"), Value::Int(42));
        assert_eq!(parse_value("2.5"), Value::from(2.5));
        assert_eq!(parse_value("alice"), Value::from("alice"));
    }

    #[test]
    fn filters_need_an_equals_sign() {
        assert!(parse_filters(&[]).unwrap().is_none());
        assert!(parse_filters(&["age=3".into(), "name=x".into()]).unwrap().is_some());
        let err = parse_filters(&["age".into()]).unwrap_err();
        assert!(err.to_string().contains("COLUMN=VALUE"));
    }
}

//! Rust model source generation from reflected tables

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::engine::ConnectionManager;
use crate::error::Result;
use crate::reflect::reflect_table;
use crate::schema::{ColumnInfo, ColumnType, TableShape};

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub",
    "ref", "return", "self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use",
    "where", "while", "yield", "abstract", "become", "box", "do", "final", "gen", "macro",
    "override", "priv", "try", "typeof", "unsized", "virtual",
];

/// Render a `FromRow` struct plus its `Model` impl for `shape`.
pub fn generate_model_source(shape: &TableShape) -> String {
    let type_name = struct_name(shape.name());
    let mut out = String::new();

    let _ = writeln!(out, "//! Model for table `{}`, generated by xtsqlorm", shape.name());
    out.push('\n');
    out.push_str("use serde::{Deserialize, Serialize};\n");
    out.push_str("use xtsqlorm::{ColumnInfo, ColumnType, Model, TableShape};\n\n");

    out.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]\n");
    let _ = writeln!(out, "pub struct {type_name} {{");
    for column in shape.columns() {
        let field = field_name(&column.name);
        if field != column.name {
            let _ = writeln!(out, "    #[sqlx(rename = {:?})]", column.name);
            let _ = writeln!(out, "    #[serde(rename = {:?})]", column.name);
        }
        let ty = column.column_type.rust_type();
        if column.nullable {
            let _ = writeln!(out, "    pub {field}: Option<{ty}>,");
        } else {
            let _ = writeln!(out, "    pub {field}: {ty},");
        }
    }
    out.push_str("}\n\n");

    let _ = writeln!(out, "impl Model for {type_name} {{");
    out.push_str("    fn table() -> TableShape {\n");
    out.push_str("        TableShape::new(\n");
    let _ = writeln!(out, "            {:?},", shape.name());
    out.push_str("            vec![\n");
    for column in shape.columns() {
        let _ = writeln!(out, "                {},", column_expr(column));
    }
    out.push_str("            ],\n");
    out.push_str("        )\n");
    for call in lifecycle_calls(shape) {
        let _ = writeln!(out, "        .and_then(|shape| shape.{call})");
    }
    out.push_str("        .expect(\"generated table shape is valid\")\n");
    out.push_str("    }\n");
    out.push_str("}\n");
    out
}

/// Reflect `table` and write its model source to `path`.
pub async fn generate_model_file(manager: &ConnectionManager, table: &str, path: &Path) -> Result<TableShape> {
    let shape = reflect_table(manager, table).await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_model_source(&shape))?;
    info!(table, path = %path.display(), "model source written");
    Ok(shape)
}

fn lifecycle_calls(shape: &TableShape) -> Vec<String> {
    let lifecycle = shape.lifecycle();
    let mut calls = Vec::new();
    if let (Some(created), Some(updated)) = (&lifecycle.created_at, &lifecycle.updated_at) {
        calls.push(format!("with_timestamps({created:?}, {updated:?})"));
    }
    if let Some(deleted) = &lifecycle.deleted_at {
        calls.push(format!("with_soft_delete({deleted:?})"));
    }
    if let Some(version) = &lifecycle.version {
        calls.push(format!("with_version({version:?})"));
    }
    calls
}

fn column_expr(column: &ColumnInfo) -> String {
    let mut expr = format!(
        "ColumnInfo::new({:?}, ColumnType::{})",
        column.name,
        variant(column.column_type)
    );
    if column.primary_key {
        expr.push_str(".primary_key()");
    } else if !column.nullable {
        expr.push_str(".not_null()");
    }
    if column.auto_increment {
        expr.push_str(".auto_increment()");
    }
    if let Some(default) = &column.default {
        let _ = write!(expr, ".default_expr({default:?})");
    }
    expr
}

fn variant(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Integer => "Integer",
        ColumnType::Float => "Float",
        ColumnType::Text => "Text",
        ColumnType::Boolean => "Boolean",
        ColumnType::Blob => "Blob",
        ColumnType::Timestamp => "Timestamp",
    }
}

/// `user_accounts` -> `UserAccounts`
fn struct_name(table: &str) -> String {
    let name: String = table
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect();

    match name.chars().next() {
        None => "Table".to_string(),
        Some(c) if c.is_ascii_digit() => format!("T{name}"),
        Some(_) => name,
    }
}

fn field_name(column: &str) -> String {
    let lower = column.to_ascii_lowercase();
    if lower.starts_with(|c: char| c.is_ascii_digit()) {
        format!("c_{lower}")
    } else if KEYWORDS.contains(&lower.as_str()) {
        format!("{lower}_")
    } else {
        lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> TableShape {
        TableShape::new(
            "user_accounts",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("Name", ColumnType::Text).not_null(),
                ColumnInfo::new("type", ColumnType::Integer).default_expr("0"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn names() {
        assert_eq!(struct_name("user_accounts"), "UserAccounts");
        assert_eq!(struct_name("2024_logs"), "T2024Logs");
        assert_eq!(field_name("type"), "type_");
        assert_eq!(field_name("9lives"), "c_9lives");
        assert_eq!(field_name("Email"), "email");
    }

    #[test]
    fn renders_struct_and_model() {
        let src = generate_model_source(&shape());

        assert!(src.contains("pub struct UserAccounts {"));
        assert!(src.contains("    pub id: i64,\n"));
        assert!(src.contains("    #[sqlx(rename = \"Name\")]\n"));
        assert!(src.contains("    pub name: String,\n"));
        assert!(src.contains("    pub type_: Option<i64>,\n"));
        assert!(src.contains(
            "ColumnInfo::new(\"id\", ColumnType::Integer).primary_key().auto_increment(),"
        ));
        assert!(src.contains(
            "ColumnInfo::new(\"type\", ColumnType::Integer).default_expr(\"0\"),"
        ));
        assert!(src.contains("impl Model for UserAccounts {"));
        assert!(!src.contains("and_then"));
    }

    #[test]
    fn renders_lifecycle_options() {
        let shape = TableShape::new(
            "posts",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("deleted_at", ColumnType::Timestamp),
                ColumnInfo::new("version", ColumnType::Integer).not_null(),
            ],
        )
        .and_then(|s| s.with_soft_delete("deleted_at"))
        .and_then(|s| s.with_version("version"))
        .unwrap();

        let src = generate_model_source(&shape);
        assert!(src.contains(
            "        )\n        .and_then(|shape| shape.with_soft_delete(\"deleted_at\"))\n        .and_then(|shape| shape.with_version(\"version\"))\n        .expect("
        ));
    }
}

//! Table utilities: reflect, create, copy, drop and list tables
//!
//! Reflection reads the backend catalog (`pragma_table_info` on SQLite,
//! `information_schema` elsewhere) into a [`TableShape`], which then drives
//! repositories over [`Record`] rows, DDL for copies, and model code generation.

use tracing::{debug, info};

use crate::dialect::Dialect;
use crate::engine::ConnectionManager;
use crate::error::{Error, Result};
use crate::query::{SqlBuilder, Statement};
use crate::schema::{validate_sql_identifier, ColumnInfo, ColumnType, TableShape};
use crate::session::{SessionProvider, TransactionScope};
use crate::value::{Record, Value};

/// Read the shape of an existing table.
///
/// # Errors
///
/// `Error::TableNotFound` when the table does not exist, `Error::Schema` when
/// it has no single-column primary key.
pub async fn reflect_table(manager: &ConnectionManager, table: &str) -> Result<TableShape> {
    validate_sql_identifier("table", table)?;
    let dialect = manager.dialect();
    let stmt = columns_query(dialect, table);

    let rows = scope(manager)
        .transaction(move |s| Box::pin(async move { s.fetch_all::<Record>(&stmt).await }))
        .await?;
    if rows.is_empty() {
        return Err(Error::TableNotFound(table.to_owned()));
    }

    let mut columns: Vec<ColumnInfo> = rows.iter().map(|r| column_from_row(dialect, r)).collect();

    // A lone INTEGER primary key aliases the rowid and is assigned automatically
    if dialect == Dialect::Sqlite {
        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key)
            .map(|(i, _)| i)
            .collect();
        if let &[key] = keys.as_slice() {
            let declared = rows[key].get("declared").and_then(text).unwrap_or_default();
            if declared.eq_ignore_ascii_case("INTEGER") {
                columns[key].auto_increment = true;
            }
        }
    }

    let shape = TableShape::new(table, columns)?;
    debug!(table, columns = shape.columns().len(), "table reflected");
    Ok(shape)
}

/// Create a table from a shape
pub async fn create_table(manager: &ConnectionManager, shape: &TableShape, if_not_exists: bool) -> Result<()> {
    let stmt = Statement::new(create_table_sql(manager.dialect(), shape, if_not_exists), vec![]);
    scope(manager)
        .transaction(move |s| Box::pin(async move { s.execute(&stmt).await.map(|_| ()) }))
        .await?;
    info!(table = %shape.name(), "table created");
    Ok(())
}

/// Drop a table. With `if_exists` a missing table is not an error.
pub async fn drop_table(manager: &ConnectionManager, table: &str, if_exists: bool) -> Result<()> {
    validate_sql_identifier("table", table)?;
    let dialect = manager.dialect();
    let mut sql = SqlBuilder::new(dialect);
    sql.push(if if_exists { "DROP TABLE IF EXISTS " } else { "DROP TABLE " });
    sql.push_ident(table);
    let stmt = sql.finish();

    scope(manager)
        .transaction(move |s| Box::pin(async move { s.execute(&stmt).await.map(|_| ()) }))
        .await?;
    info!(table, "table dropped");
    Ok(())
}

/// Copy a table's structure (not its rows) under a new name.
///
/// Any existing `target` table is dropped first. Returns the new shape.
pub async fn copy_table(manager: &ConnectionManager, source: &str, target: &str) -> Result<TableShape> {
    validate_sql_identifier("table", target)?;
    let shape = reflect_table(manager, source).await?.renamed(target)?;

    drop_table(manager, target, true).await?;
    create_table(manager, &shape, false).await?;
    info!(source, target, "table structure copied");
    Ok(shape)
}

pub async fn table_exists(manager: &ConnectionManager, table: &str) -> Result<bool> {
    validate_sql_identifier("table", table)?;
    let sql = match manager.dialect() {
        Dialect::Sqlite => "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        Dialect::Postgres => {
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1"
        }
        Dialect::MySql => {
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?"
        }
    };
    let stmt = Statement::new(sql, vec![table.into()]);
    let n = scope(manager)
        .transaction(move |s| Box::pin(async move { s.fetch_i64(&stmt).await }))
        .await?;
    Ok(n > 0)
}

/// Names of the user tables in the current database, sorted
pub async fn list_tables(manager: &ConnectionManager) -> Result<Vec<String>> {
    let sql = match manager.dialect() {
        Dialect::Sqlite => {
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        }
        Dialect::Postgres => {
            "SELECT table_name::text AS name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' ORDER BY name"
        }
        Dialect::MySql => {
            "SELECT table_name AS name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY name"
        }
    };
    let stmt = Statement::new(sql, vec![]);
    let rows = scope(manager)
        .transaction(move |s| Box::pin(async move { s.fetch_all::<Record>(&stmt).await }))
        .await?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get("name").and_then(text))
        .collect())
}

/// `CREATE TABLE` statement for a shape
pub fn create_table_sql(dialect: Dialect, shape: &TableShape, if_not_exists: bool) -> String {
    let columns: Vec<String> = shape
        .columns()
        .iter()
        .map(|c| column_definition(dialect, c))
        .collect();
    format!(
        "CREATE TABLE {}{} ({})",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        dialect.quote(shape.name()),
        columns.join(", ")
    )
}

fn column_definition(dialect: Dialect, column: &ColumnInfo) -> String {
    let auto_key = column.primary_key && column.auto_increment;
    let mut def = format!(
        "{} {}",
        dialect.quote(&column.name),
        dialect.column_type(column.column_type, auto_key)
    );

    if column.primary_key {
        match dialect {
            // AUTOINCREMENT is only legal straight after PRIMARY KEY
            Dialect::Sqlite => {
                def.push_str(" PRIMARY KEY");
                if auto_key {
                    def.push_str(dialect.auto_increment());
                }
            }
            Dialect::Postgres | Dialect::MySql => {
                if auto_key {
                    def.push_str(dialect.auto_increment());
                }
                def.push_str(" PRIMARY KEY");
            }
        }
        return def;
    }

    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    def
}

fn scope(manager: &ConnectionManager) -> SessionProvider {
    SessionProvider::new(manager.clone())
}

fn columns_query(dialect: Dialect, table: &str) -> Statement {
    let sql = match dialect {
        Dialect::Sqlite => {
            r#"SELECT name, type AS declared, "notnull" AS not_null, dflt_value AS dflt, pk
               FROM pragma_table_info(?) ORDER BY cid"#
        }
        Dialect::Postgres => {
            r#"SELECT c.column_name::text AS name,
                      c.data_type::text AS declared,
                      c.is_nullable::text AS nullable,
                      c.column_default::text AS dflt,
                      c.is_identity::text AS identity,
                      EXISTS (
                          SELECT 1
                          FROM information_schema.table_constraints tc
                          JOIN information_schema.key_column_usage k
                            ON tc.constraint_name = k.constraint_name
                           AND tc.table_schema = k.table_schema
                           AND tc.table_name = k.table_name
                          WHERE tc.constraint_type = 'PRIMARY KEY'
                            AND tc.table_schema = c.table_schema
                            AND tc.table_name = c.table_name
                            AND k.column_name = c.column_name
                      ) AS pk
               FROM information_schema.columns c
               WHERE c.table_schema = current_schema() AND c.table_name = $1
               ORDER BY c.ordinal_position"#
        }
        Dialect::MySql => {
            r#"SELECT column_name AS name,
                      column_type AS declared,
                      is_nullable AS nullable,
                      column_default AS dflt,
                      column_key AS pk,
                      extra AS extra
               FROM information_schema.columns
               WHERE table_schema = DATABASE() AND table_name = ?
               ORDER BY ordinal_position"#
        }
    };
    Statement::new(sql, vec![table.into()])
}

fn column_from_row(dialect: Dialect, row: &Record) -> ColumnInfo {
    let field = |key: &str| row.get(key).and_then(text);
    let name = field("name").unwrap_or_default();
    let declared = field("declared").unwrap_or_default();
    let mut column = ColumnInfo::new(name, ColumnType::from_declared(&declared));
    let default = field("dflt");

    match dialect {
        Dialect::Sqlite => {
            column.nullable = !row.get("not_null").is_some_and(flag);
            column.primary_key = row.get("pk").is_some_and(flag);
            column.default = default;
        }
        Dialect::Postgres => {
            column.nullable = field("nullable").as_deref() == Some("YES");
            column.primary_key = row.get("pk").is_some_and(flag);
            let serial = default.as_deref().is_some_and(|d| d.starts_with("nextval("));
            column.auto_increment = serial || field("identity").as_deref() == Some("YES");
            if !serial {
                column.default = default;
            }
        }
        Dialect::MySql => {
            column.nullable = field("nullable").as_deref() == Some("YES");
            column.primary_key = field("pk").as_deref() == Some("PRI");
            let extra = field("extra").unwrap_or_default().to_ascii_lowercase();
            column.auto_increment = extra.contains("auto_increment");
            // Literal defaults come back unquoted; expression defaults are flagged
            column.default = default.map(|d| {
                if extra.contains("default_generated") || d.eq_ignore_ascii_case("NULL") {
                    d
                } else {
                    format!("'{}'", d.replace('\'', "''"))
                }
            });
        }
    }

    if column.primary_key {
        column.nullable = false;
    }
    column
}

/// Catalog text, which some drivers hand back as bytes
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Text(s) => s.eq_ignore_ascii_case("YES") || s == "1",
        _ => false,
    }
}

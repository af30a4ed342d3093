//! Filter conditions, SELECT descriptions and SQL rendering
//!
//! All identifiers are checked against the target [`TableShape`] before they
//! reach SQL text. Every value travels as a bind argument except `Null`, which
//! is written as the `NULL` keyword.

use std::fmt;
use std::str::FromStr;

use sqlx::any::AnyArguments;
use sqlx::Arguments;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::schema::TableShape;
use crate::value::{Record, Value};

/// A WHERE predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Like(String, String),
    In(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq(column.into(), value.into())
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Ne(column.into(), value.into())
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Gt(column.into(), value.into())
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Ge(column.into(), value.into())
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Lt(column.into(), value.into())
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Le(column.into(), value.into())
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like(column.into(), pattern.into())
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Condition::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Condition::IsNotNull(column.into())
    }

    /// Equality on every key of `record`; `Null` values become `IS NULL`.
    pub fn matching(record: &Record) -> Self {
        Condition::And(
            record
                .iter()
                .map(|(column, value)| match value {
                    Value::Null => Condition::IsNull(column.clone()),
                    v => Condition::Eq(column.clone(), v.clone()),
                })
                .collect(),
        )
    }

    /// OR of AND groups, one group per record. `None` for an empty list.
    pub fn any_of(groups: &[Record]) -> Option<Self> {
        if groups.is_empty() {
            None
        } else {
            Some(Condition::Or(groups.iter().map(Condition::matching).collect()))
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut parts) => {
                parts.push(other);
                Condition::And(parts)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut parts) => {
                parts.push(other);
                Condition::Or(parts)
            }
            first => Condition::Or(vec![first, other]),
        }
    }

    fn check_columns(&self, shape: &TableShape) -> Result<()> {
        match self {
            Condition::Eq(c, _)
            | Condition::Ne(c, _)
            | Condition::Gt(c, _)
            | Condition::Ge(c, _)
            | Condition::Lt(c, _)
            | Condition::Le(c, _)
            | Condition::Like(c, _)
            | Condition::In(c, _)
            | Condition::IsNull(c)
            | Condition::IsNotNull(c) => shape.check_column(c),
            Condition::And(parts) | Condition::Or(parts) => {
                parts.iter().try_for_each(|p| p.check_columns(shape))
            }
        }
    }

    fn render(&self, sql: &mut SqlBuilder) {
        let compare = |sql: &mut SqlBuilder, column: &str, op: &str, value: &Value| {
            sql.push_ident(column);
            sql.push(op);
            sql.push_bind(value.clone());
        };

        match self {
            Condition::Eq(c, v) => compare(sql, c, " = ", v),
            Condition::Ne(c, v) => compare(sql, c, " <> ", v),
            Condition::Gt(c, v) => compare(sql, c, " > ", v),
            Condition::Ge(c, v) => compare(sql, c, " >= ", v),
            Condition::Lt(c, v) => compare(sql, c, " < ", v),
            Condition::Le(c, v) => compare(sql, c, " <= ", v),
            Condition::Like(c, pattern) => {
                compare(sql, c, " LIKE ", &Value::Text(pattern.clone()))
            }
            Condition::In(_, values) if values.is_empty() => sql.push("1 = 0"),
            Condition::In(c, values) => {
                sql.push_ident(c);
                sql.push(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_bind(v.clone());
                }
                sql.push(")");
            }
            Condition::IsNull(c) => {
                sql.push_ident(c);
                sql.push(" IS NULL");
            }
            Condition::IsNotNull(c) => {
                sql.push_ident(c);
                sql.push(" IS NOT NULL");
            }
            Condition::And(parts) if parts.is_empty() => sql.push("1 = 1"),
            Condition::Or(parts) if parts.is_empty() => sql.push("1 = 0"),
            Condition::And(parts) => render_joined(sql, parts, " AND "),
            Condition::Or(parts) => render_joined(sql, parts, " OR "),
        }
    }
}

fn render_joined(sql: &mut SqlBuilder, parts: &[Condition], joiner: &str) {
    sql.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            sql.push(joiner);
        }
        part.render(sql);
    }
    sql.push(")");
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            other => Err(Error::config(format!(
                "invalid sort direction '{other}' (expected asc or desc)"
            ))),
        }
    }
}

/// Description of a SELECT against one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub columns: Option<Vec<String>>,
    pub distinct: bool,
    pub filter: Option<Condition>,
    pub order_by: Vec<(String, Order)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the selected columns (all columns by default)
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Add a predicate, AND-ed with any existing one
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    pub fn filter_opt(self, condition: Option<Condition>) -> Self {
        match condition {
            Some(c) => self.filter(c),
            None => self,
        }
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by.push((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render against `shape`, rejecting columns the shape does not declare.
    pub fn to_statement(&self, shape: &TableShape, dialect: Dialect) -> Result<Statement> {
        let mut sql = SqlBuilder::new(dialect);
        sql.push("SELECT ");
        if self.distinct {
            sql.push("DISTINCT ");
        }
        match &self.columns {
            Some(columns) if !columns.is_empty() => {
                for (i, column) in columns.iter().enumerate() {
                    shape.check_column(column)?;
                    if i > 0 {
                        sql.push(", ");
                    }
                    sql.push_ident(column);
                }
            }
            _ => sql.push("*"),
        }
        sql.push(" FROM ");
        sql.push_ident(shape.name());
        push_where(&mut sql, shape, self.filter.as_ref())?;

        if !self.order_by.is_empty() {
            sql.push(" ORDER BY ");
            for (i, (column, order)) in self.order_by.iter().enumerate() {
                shape.check_column(column)?;
                if i > 0 {
                    sql.push(", ");
                }
                sql.push_ident(column);
                sql.push(" ");
                sql.push(order.keyword());
            }
        }
        sql.push(&dialect.limit_offset(self.limit, self.offset));
        Ok(sql.finish())
    }
}

/// Rendered SQL text with its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub(crate) fn arguments<'q>(&self) -> std::result::Result<AnyArguments<'q>, sqlx::Error> {
        arguments(&self.args)
    }
}

/// Encode values into driver arguments.
pub(crate) fn arguments<'q>(values: &[Value]) -> std::result::Result<AnyArguments<'q>, sqlx::Error> {
    let mut args = AnyArguments::default();
    for value in values {
        let added = match value.clone() {
            // Only raw statements get here with a null. Any has no untyped one.
            Value::Null => args.add(None::<String>),
            Value::Bool(v) => args.add(v),
            Value::Int(v) => args.add(v),
            Value::Float(v) => args.add(v),
            Value::Text(v) => args.add(v),
            Value::Bytes(v) => args.add(v),
        };
        added.map_err(sqlx::Error::Encode)?;
    }
    Ok(args)
}

/// Incremental SQL text builder that numbers placeholders for the dialect
#[derive(Debug)]
pub(crate) struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    args: Vec<Value>,
}

impl SqlBuilder {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            args: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub(crate) fn push_ident(&mut self, identifier: &str) {
        let quoted = self.dialect.quote(identifier);
        self.sql.push_str(&quoted);
    }

    /// Bind `value`, or write `NULL` for a null so no column type is implied.
    pub(crate) fn push_bind(&mut self, value: Value) {
        if value.is_null() {
            self.sql.push_str("NULL");
            return;
        }
        self.args.push(value);
        let placeholder = self.dialect.placeholder(self.args.len());
        self.sql.push_str(&placeholder);
    }

    /// Current UTC time as SQL
    pub(crate) fn push_now(&mut self) {
        let now = self.dialect.now();
        self.sql.push_str(now);
    }

    /// Bind a `YYYY-MM-DD HH:MM:SS` string to compare against a timestamp column.
    pub(crate) fn push_timestamp(&mut self, value: String) {
        self.args.push(Value::Text(value));
        let placeholder = self.dialect.timestamp_placeholder(self.args.len());
        self.sql.push_str(&placeholder);
    }

    pub(crate) fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

fn push_where(sql: &mut SqlBuilder, shape: &TableShape, filter: Option<&Condition>) -> Result<()> {
    if let Some(condition) = filter {
        condition.check_columns(shape)?;
        sql.push(" WHERE ");
        condition.render(sql);
    }
    Ok(())
}

/// `SELECT * FROM t WHERE pk = ?`
pub(crate) fn select_by_id(shape: &TableShape, dialect: Dialect, id: i64) -> Statement {
    let mut sql = SqlBuilder::new(dialect);
    sql.push("SELECT * FROM ");
    sql.push_ident(shape.name());
    sql.push(" WHERE ");
    sql.push_ident(shape.primary_key());
    sql.push(" = ");
    sql.push_bind(Value::Int(id));
    sql.finish()
}

/// `SELECT COUNT(*) FROM t [WHERE ..]`
pub(crate) fn count(shape: &TableShape, dialect: Dialect, filter: Option<&Condition>) -> Result<Statement> {
    let mut sql = SqlBuilder::new(dialect);
    sql.push("SELECT COUNT(*) FROM ");
    sql.push_ident(shape.name());
    push_where(&mut sql, shape, filter)?;
    Ok(sql.finish())
}

/// `SELECT 1 FROM t WHERE pk = ?`
pub(crate) fn exists(shape: &TableShape, dialect: Dialect, id: i64) -> Statement {
    let mut sql = SqlBuilder::new(dialect);
    sql.push("SELECT 1 FROM ");
    sql.push_ident(shape.name());
    sql.push(" WHERE ");
    sql.push_ident(shape.primary_key());
    sql.push(" = ");
    sql.push_bind(Value::Int(id));
    sql.finish()
}

/// `INSERT INTO t (..) VALUES (..)`, with `RETURNING *` where supported
///
/// Lifecycle columns missing from `data` are filled in: timestamps with the
/// current UTC time, the version counter with 0.
pub(crate) fn insert(shape: &TableShape, dialect: Dialect, data: &Record) -> Result<Statement> {
    shape.check_record(data)?;
    let generated = generated_on_insert(shape, dialect, data);
    let mut sql = SqlBuilder::new(dialect);
    sql.push("INSERT INTO ");
    sql.push_ident(shape.name());

    if data.is_empty() && generated.is_empty() {
        sql.push(dialect.empty_insert());
    } else {
        sql.push(" (");
        let columns = data.keys().chain(generated.iter().map(|(column, _)| *column));
        for (i, column) in columns.enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push_ident(column);
        }
        sql.push(") VALUES (");
        for (i, (_, value)) in data.iter().enumerate() {
            if i > 0 {
                sql.push(", ");
            }
            sql.push_bind(value.clone());
        }
        for (i, (_, expr)) in generated.iter().enumerate() {
            if i > 0 || !data.is_empty() {
                sql.push(", ");
            }
            sql.push(expr);
        }
        sql.push(")");
    }

    if dialect.supports_returning() {
        sql.push(" RETURNING *");
    }
    Ok(sql.finish())
}

fn generated_on_insert<'s>(
    shape: &'s TableShape,
    dialect: Dialect,
    data: &Record,
) -> Vec<(&'s str, &'static str)> {
    let lifecycle = shape.lifecycle();
    let stamps = [lifecycle.created_at.as_deref(), lifecycle.updated_at.as_deref()]
        .into_iter()
        .flatten()
        .map(|column| (column, dialect.now()));
    let version = lifecycle.version.as_deref().map(|column| (column, "0"));

    stamps
        .chain(version)
        .filter(|(column, _)| !data.contains_key(column))
        .collect()
}

/// The version a versioned update expects to find, when `data` names one
pub(crate) fn version_guard<'d>(shape: &TableShape, data: &'d Record) -> Option<&'d Value> {
    shape
        .version_column()
        .and_then(|column| data.get(column))
        .filter(|value| !value.is_null())
}

/// `UPDATE t SET .. WHERE pk = ?`; `None` when `data` has nothing to set.
///
/// The primary key and the version counter are never part of the SET list
/// taken from `data`. The updated-at column is stamped and the version is
/// bumped. A version value in `data` becomes an extra `WHERE` guard.
pub(crate) fn update(
    shape: &TableShape,
    dialect: Dialect,
    id: i64,
    data: &Record,
) -> Result<Option<Statement>> {
    shape.check_record(data)?;
    let version = shape.version_column();
    let assignments: Vec<_> = data
        .iter()
        .filter(|(column, _)| column.as_str() != shape.primary_key())
        .filter(|(column, _)| Some(column.as_str()) != version)
        .collect();
    if assignments.is_empty() {
        return Ok(None);
    }

    let mut sql = SqlBuilder::new(dialect);
    sql.push("UPDATE ");
    sql.push_ident(shape.name());
    sql.push(" SET ");
    for (i, (column, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            sql.push(", ");
        }
        sql.push_ident(column);
        sql.push(" = ");
        sql.push_bind(value.clone());
    }
    let stamp = shape.lifecycle().updated_at.as_deref();
    if let Some(updated) = stamp.filter(|column| !data.contains_key(column)) {
        sql.push(", ");
        sql.push_ident(updated);
        sql.push(" = ");
        sql.push_now();
    }
    if let Some(version) = version {
        sql.push(", ");
        sql.push_ident(version);
        sql.push(" = ");
        sql.push_ident(version);
        sql.push(" + 1");
    }

    sql.push(" WHERE ");
    sql.push_ident(shape.primary_key());
    sql.push(" = ");
    sql.push_bind(Value::Int(id));
    if let (Some(version), Some(expected)) = (version, version_guard(shape, data)) {
        sql.push(" AND ");
        sql.push_ident(version);
        sql.push(" = ");
        sql.push_bind(expected.clone());
    }
    Ok(Some(sql.finish()))
}

/// `DELETE FROM t WHERE pk = ?`
pub(crate) fn delete(shape: &TableShape, dialect: Dialect, id: i64) -> Statement {
    let mut sql = SqlBuilder::new(dialect);
    sql.push("DELETE FROM ");
    sql.push_ident(shape.name());
    sql.push(" WHERE ");
    sql.push_ident(shape.primary_key());
    sql.push(" = ");
    sql.push_bind(Value::Int(id));
    sql.finish()
}

/// Stamp (`deleted = true`) or clear the soft-delete column of a live or
/// deleted row respectively. Matches nothing when the row is already in the
/// target state.
pub(crate) fn mark_deleted(
    shape: &TableShape,
    dialect: Dialect,
    id: i64,
    deleted: bool,
) -> Result<Statement> {
    let column = shape.require_soft_delete()?;
    let mut sql = SqlBuilder::new(dialect);
    sql.push("UPDATE ");
    sql.push_ident(shape.name());
    sql.push(" SET ");
    sql.push_ident(column);
    sql.push(" = ");
    if deleted {
        sql.push_now();
    } else {
        sql.push("NULL");
    }
    sql.push(" WHERE ");
    sql.push_ident(shape.primary_key());
    sql.push(" = ");
    sql.push_bind(Value::Int(id));
    sql.push(" AND ");
    sql.push_ident(column);
    sql.push(if deleted { " IS NULL" } else { " IS NOT NULL" });
    Ok(sql.finish())
}

/// `DELETE FROM t WHERE deleted IS NOT NULL AND deleted < cutoff`
///
/// `cutoff` is a UTC `YYYY-MM-DD HH:MM:SS` string.
pub(crate) fn purge_deleted(shape: &TableShape, dialect: Dialect, cutoff: String) -> Result<Statement> {
    let column = shape.require_soft_delete()?;
    let mut sql = SqlBuilder::new(dialect);
    sql.push("DELETE FROM ");
    sql.push_ident(shape.name());
    sql.push(" WHERE ");
    sql.push_ident(column);
    sql.push(" IS NOT NULL AND ");
    sql.push_ident(column);
    sql.push(" < ");
    sql.push_timestamp(cutoff);
    Ok(sql.finish())
}

/// `SELECT COUNT(c), MIN(c), MAX(c), AVG(c) FROM t`
pub(crate) fn field_stats(shape: &TableShape, dialect: Dialect, field: &str) -> Result<Statement> {
    shape.check_column(field)?;
    let column = dialect.quote(field);
    let mut sql = SqlBuilder::new(dialect);
    sql.push(&format!(
        "SELECT COUNT({column}) AS count, MIN({column}) AS min, MAX({column}) AS max, {} AS avg FROM ",
        dialect.avg(&column)
    ));
    sql.push_ident(shape.name());
    Ok(sql.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::schema::{ColumnInfo, ColumnType};

    fn users() -> TableShape {
        TableShape::new(
            "users",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("username", ColumnType::Text),
                ColumnInfo::new("age", ColumnType::Integer),
            ],
        )
        .unwrap()
    }

    #[test]
    fn select_with_filter_order_and_page() {
        let stmt = Select::new()
            .filter(Condition::eq("username", "alice"))
            .filter(Condition::gt("age", 18))
            .order_by("age", Order::Desc)
            .limit(10)
            .offset(20)
            .to_statement(&users(), Dialect::Postgres)
            .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "users" WHERE ("username" = $1 AND "age" > $2) ORDER BY "age" DESC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(stmt.args, vec![Value::from("alice"), Value::Int(18)]);
    }

    #[test]
    fn or_of_and_groups() {
        let groups = vec![
            record! { "username" => "a", "age" => 1 },
            record! { "username" => Value::Null },
        ];
        let stmt = Select::new()
            .filter_opt(Condition::any_of(&groups))
            .to_statement(&users(), Dialect::Sqlite)
            .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT * FROM "users" WHERE (("age" = ? AND "username" = ?) OR ("username" IS NULL))"#
        );
        assert_eq!(stmt.args.len(), 2);
        assert!(Condition::any_of(&[]).is_none());
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = Select::new()
            .order_by("nickname", Order::Asc)
            .to_statement(&users(), Dialect::Sqlite)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));

        let err = insert(&users(), Dialect::Sqlite, &record! { "bogus" => 1 }).unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let stmt = Select::new()
            .filter(Condition::is_in("id", Vec::<i64>::new()))
            .to_statement(&users(), Dialect::Sqlite)
            .unwrap();
        assert!(stmt.sql.ends_with("WHERE 1 = 0"));
    }

    #[test]
    fn insert_rendering() {
        let data = record! { "username" => "bob", "age" => 30 };
        let stmt = insert(&users(), Dialect::Postgres, &data).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("age", "username") VALUES ($1, $2) RETURNING *"#
        );

        let stmt = insert(&users(), Dialect::MySql, &Record::new()).unwrap();
        assert_eq!(stmt.sql, "INSERT INTO `users` () VALUES ()");
    }

    #[test]
    fn update_skips_primary_key() {
        let data = record! { "id" => 9, "username" => "carol" };
        let stmt = update(&users(), Dialect::Sqlite, 1, &data).unwrap().unwrap();
        assert_eq!(stmt.sql, r#"UPDATE "users" SET "username" = ? WHERE "id" = ?"#);
        assert_eq!(stmt.args, vec![Value::from("carol"), Value::Int(1)]);

        assert!(update(&users(), Dialect::Sqlite, 1, &record! { "id" => 1 })
            .unwrap()
            .is_none());
    }

    #[test]
    fn nulls_are_written_inline() {
        let stmt = update(&users(), Dialect::Postgres, 1, &record! { "age" => Value::Null })
            .unwrap()
            .unwrap();
        assert_eq!(stmt.sql, r#"UPDATE "users" SET "age" = NULL WHERE "id" = $1"#);
        assert_eq!(stmt.args, vec![Value::Int(1)]);

        let data = record! { "age" => Value::Null, "username" => "dave" };
        let stmt = insert(&users(), Dialect::Postgres, &data).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "users" ("age", "username") VALUES (NULL, $1) RETURNING *"#
        );
        assert_eq!(stmt.args, vec![Value::from("dave")]);
    }

    fn posts() -> TableShape {
        TableShape::new(
            "posts",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("title", ColumnType::Text),
                ColumnInfo::new("created_at", ColumnType::Timestamp),
                ColumnInfo::new("updated_at", ColumnType::Timestamp),
                ColumnInfo::new("deleted_at", ColumnType::Timestamp),
                ColumnInfo::new("version", ColumnType::Integer),
            ],
        )
        .and_then(|s| s.with_timestamps("created_at", "updated_at"))
        .and_then(|s| s.with_soft_delete("deleted_at"))
        .and_then(|s| s.with_version("version"))
        .unwrap()
    }

    #[test]
    fn insert_fills_lifecycle_columns() {
        let stmt = insert(&posts(), Dialect::Sqlite, &record! { "title" => "hi" }).unwrap();
        assert_eq!(
            stmt.sql,
            r#"INSERT INTO "posts" ("title", "created_at", "updated_at", "version") VALUES (?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP, 0) RETURNING *"#
        );

        let data = record! { "created_at" => "2020-01-01 00:00:00" };
        let stmt = insert(&posts(), Dialect::MySql, &data).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO `posts` (`created_at`, `updated_at`, `version`) VALUES (?, UTC_TIMESTAMP(), 0)"
        );

        let stmt = insert(&posts(), Dialect::Postgres, &Record::new()).unwrap();
        assert!(stmt.sql.contains("VALUES ((NOW() AT TIME ZONE 'UTC'), "));
    }

    #[test]
    fn versioned_update() {
        let stmt = update(&posts(), Dialect::Postgres, 4, &record! { "title" => "x" })
            .unwrap()
            .unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "posts" SET "title" = $1, "updated_at" = (NOW() AT TIME ZONE 'UTC'), "version" = "version" + 1 WHERE "id" = $2"#
        );

        let data = record! { "title" => "x", "version" => 2 };
        let stmt = update(&posts(), Dialect::Sqlite, 4, &data).unwrap().unwrap();
        assert!(stmt.sql.ends_with(r#"WHERE "id" = ? AND "version" = ?"#));
        assert_eq!(stmt.args, vec![Value::from("x"), Value::Int(4), Value::Int(2)]);

        assert!(update(&posts(), Dialect::Sqlite, 4, &record! { "version" => 2 })
            .unwrap()
            .is_none());
    }

    #[test]
    fn soft_delete_statements() {
        let stmt = mark_deleted(&posts(), Dialect::Sqlite, 3, true).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "posts" SET "deleted_at" = CURRENT_TIMESTAMP WHERE "id" = ? AND "deleted_at" IS NULL"#
        );
        let stmt = mark_deleted(&posts(), Dialect::Sqlite, 3, false).unwrap();
        assert_eq!(
            stmt.sql,
            r#"UPDATE "posts" SET "deleted_at" = NULL WHERE "id" = ? AND "deleted_at" IS NOT NULL"#
        );

        let stmt = purge_deleted(&posts(), Dialect::Postgres, "2024-01-01 00:00:00".into()).unwrap();
        assert_eq!(
            stmt.sql,
            r#"DELETE FROM "posts" WHERE "deleted_at" IS NOT NULL AND "deleted_at" < CAST($1 AS TIMESTAMP)"#
        );

        assert!(matches!(
            mark_deleted(&users(), Dialect::Sqlite, 3, true),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn order_parsing() {
        assert_eq!("DESC".parse::<Order>().unwrap(), Order::Desc);
        assert_eq!("asc".parse::<Order>().unwrap(), Order::Asc);
        assert!("sideways".parse::<Order>().is_err());
    }
}

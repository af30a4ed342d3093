//! SQL dialect differences across the drivers behind `sqlx::Any`

use std::fmt;

use crate::error::{Error, Result};
use crate::schema::ColumnType;

/// Backend family, selected from the connection URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    /// Pick the dialect from a connection URL such as `postgres://..`.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| Error::config(format!("connection URL has no scheme: '{url}'")))?;

        match scheme.as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            other => Err(Error::config(format!(
                "unsupported database driver '{other}' (expected sqlite, postgres or mysql)"
            ))),
        }
    }

    /// Bind placeholder for the `n`th (1-based) argument
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite | Dialect::MySql => "?".to_owned(),
        }
    }

    /// Quote an identifier. Callers validate identifiers first, so no escaping is done.
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Dialect::MySql => format!("`{identifier}`"),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{identifier}\""),
        }
    }

    /// `LIMIT`/`OFFSET` suffix, empty when neither is set.
    ///
    /// SQLite and MySQL cannot take an `OFFSET` without a `LIMIT`, so an
    /// unbounded limit is written in that case.
    pub fn limit_offset(self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (None, None) => String::new(),
            (Some(limit), None) => format!(" LIMIT {limit}"),
            (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
            (None, Some(offset)) => match self {
                Dialect::Postgres => format!(" OFFSET {offset}"),
                Dialect::Sqlite => format!(" LIMIT -1 OFFSET {offset}"),
                Dialect::MySql => format!(" LIMIT 18446744073709551615 OFFSET {offset}"),
            },
        }
    }

    /// `AVG` over an already-quoted column, cast so the driver decodes it as a float.
    pub fn avg(self, quoted_column: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST(AVG({quoted_column}) AS DOUBLE PRECISION)"),
            Dialect::MySql => format!("CAST(AVG({quoted_column}) AS DOUBLE)"),
            Dialect::Sqlite => format!("AVG({quoted_column})"),
        }
    }

    /// Whether inserted rows are read back with `RETURNING *`.
    ///
    /// The bundled SQLite is newer than 3.35. MySQL reads the row back through
    /// `last_insert_id` instead.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Sqlite | Dialect::Postgres)
    }

    /// Expression for the current UTC time, without a zone
    pub fn now(self) -> &'static str {
        match self {
            Dialect::Sqlite => "CURRENT_TIMESTAMP",
            Dialect::Postgres => "(NOW() AT TIME ZONE 'UTC')",
            Dialect::MySql => "UTC_TIMESTAMP()",
        }
    }

    /// Placeholder for the `n`th argument when it carries a
    /// `YYYY-MM-DD HH:MM:SS` string compared against a timestamp column.
    pub fn timestamp_placeholder(self, n: usize) -> String {
        match self {
            Dialect::Sqlite => self.placeholder(n),
            Dialect::Postgres => format!("CAST(${n} AS TIMESTAMP)"),
            Dialect::MySql => "CAST(? AS DATETIME)".to_owned(),
        }
    }

    /// Tail of an `INSERT INTO t` that supplies no column values
    pub fn empty_insert(self) -> &'static str {
        match self {
            Dialect::MySql => " () VALUES ()",
            Dialect::Sqlite | Dialect::Postgres => " DEFAULT VALUES",
        }
    }

    /// Column type in DDL. `auto_key` marks the auto-incrementing primary key.
    pub fn column_type(self, column_type: ColumnType, auto_key: bool) -> &'static str {
        match (self, column_type) {
            (Dialect::Postgres, ColumnType::Integer) if auto_key => "BIGSERIAL",
            (Dialect::Sqlite, ColumnType::Integer) => "INTEGER",
            (_, ColumnType::Integer) => "BIGINT",
            (Dialect::Sqlite, ColumnType::Float) => "REAL",
            (_, ColumnType::Float) => "DOUBLE PRECISION",
            (_, ColumnType::Text) => "TEXT",
            (Dialect::Sqlite, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::MySql, ColumnType::Boolean) => "TINYINT(1)",
            (Dialect::Postgres, ColumnType::Blob) => "BYTEA",
            (_, ColumnType::Blob) => "BLOB",
            (Dialect::Postgres, ColumnType::Timestamp) => "TIMESTAMP",
            (Dialect::Sqlite, ColumnType::Timestamp) => "TIMESTAMP",
            (Dialect::MySql, ColumnType::Timestamp) => "DATETIME",
        }
    }

    /// Keyword suffix that makes the primary key auto-incrementing, if any
    pub fn auto_increment(self) -> &'static str {
        match self {
            Dialect::Sqlite => " AUTOINCREMENT",
            Dialect::MySql => " AUTO_INCREMENT",
            Dialect::Postgres => "",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_from_url() {
        assert_eq!(Dialect::from_url("sqlite::memory:").unwrap(), Dialect::Sqlite);
        assert_eq!(
            Dialect::from_url("postgresql://u:p@localhost/db").unwrap(),
            Dialect::Postgres
        );
        assert_eq!(Dialect::from_url("mariadb://h/db").unwrap(), Dialect::MySql);

        assert!(matches!(
            Dialect::from_url("oracle://h/db"),
            Err(Error::Config { .. })
        ));
        assert!(matches!(Dialect::from_url("nonsense"), Err(Error::Config { .. })));
    }

    #[test]
    fn placeholders_and_quoting() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
        assert_eq!(Dialect::MySql.quote("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote("users"), "\"users\"");
    }

    #[test]
    fn offset_without_limit() {
        assert_eq!(Dialect::Sqlite.limit_offset(None, None), "");
        assert_eq!(Dialect::Sqlite.limit_offset(None, Some(0)), " LIMIT -1 OFFSET 0");
        assert_eq!(Dialect::Postgres.limit_offset(None, Some(5)), " OFFSET 5");
        assert_eq!(Dialect::MySql.limit_offset(Some(10), Some(20)), " LIMIT 10 OFFSET 20");
    }

    #[test]
    fn returning_support() {
        assert!(Dialect::Sqlite.supports_returning());
        assert!(Dialect::Postgres.supports_returning());
        assert!(!Dialect::MySql.supports_returning());
    }

    #[test]
    fn utc_clock_and_timestamp_args() {
        assert_eq!(Dialect::Sqlite.now(), "CURRENT_TIMESTAMP");
        assert_eq!(Dialect::MySql.now(), "UTC_TIMESTAMP()");
        assert_eq!(Dialect::Postgres.timestamp_placeholder(2), "CAST($2 AS TIMESTAMP)");
        assert_eq!(Dialect::Sqlite.timestamp_placeholder(2), "?");
    }

    #[test]
    fn ddl_types() {
        assert_eq!(Dialect::Postgres.column_type(ColumnType::Integer, true), "BIGSERIAL");
        assert_eq!(Dialect::Sqlite.column_type(ColumnType::Integer, true), "INTEGER");
        assert_eq!(Dialect::MySql.column_type(ColumnType::Boolean, false), "TINYINT(1)");
    }
}

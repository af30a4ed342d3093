//! Entity shapes: table name, columns and the single integer primary key

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::any::AnyRow;
use sqlx::FromRow;

use crate::error::{Error, Result};
use crate::value::Record;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    // Table and column names are interpolated into SQL text, so only plain
    // identifiers are accepted.
    Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier regex is valid")
});

/// True when `identifier` contains only letters, digits and underscores.
pub fn is_valid_identifier(identifier: &str) -> bool {
    IDENTIFIER_RE.is_match(identifier)
}

/// Reject anything that is not a plain SQL identifier.
///
/// `kind` names what is being checked ("table", "column") for the error message.
pub fn validate_sql_identifier(kind: &'static str, identifier: &str) -> Result<()> {
    if is_valid_identifier(identifier) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            kind,
            identifier: identifier.to_owned(),
        })
    }
}

/// Storage class of a column, independent of dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Blob,
    Timestamp,
}

impl ColumnType {
    /// Map a declared SQL type (as reported by a catalog) onto a column type.
    ///
    /// Follows SQLite's affinity rules closely enough for PostgreSQL and MySQL
    /// type names as well.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.starts_with("TINYINT(1)") || upper.contains("BOOL") {
            ColumnType::Boolean
        } else if upper.contains("INT") || upper == "SERIAL" || upper == "BIGSERIAL" {
            ColumnType::Integer
        } else if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
            ColumnType::Text
        } else if upper.contains("BLOB") || upper.contains("BYTEA") || upper.contains("BINARY") {
            ColumnType::Blob
        } else if upper.contains("REAL")
            || upper.contains("FLOA")
            || upper.contains("DOUB")
            || upper.contains("NUMERIC")
            || upper.contains("DECIMAL")
        {
            ColumnType::Float
        } else if upper.contains("TIME") || upper.contains("DATE") {
            ColumnType::Timestamp
        } else if upper.is_empty() {
            ColumnType::Blob
        } else {
            ColumnType::Text
        }
    }

    /// Rust field type used by generated model code
    pub fn rust_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "i64",
            ColumnType::Float => "f64",
            ColumnType::Text | ColumnType::Timestamp => "String",
            ColumnType::Boolean => "bool",
            ColumnType::Blob => "Vec<u8>",
        }
    }
}

/// One column of a table shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Default as an SQL expression, ready to splice into DDL
    pub default: Option<String>,
}

impl ColumnInfo {
    /// Nullable, non-key column
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            default: None,
        }
    }

    /// Auto-incrementing integer primary key
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
            .primary_key()
            .auto_increment()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

/// Columns the repository maintains on the caller's behalf
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Set to the current UTC time on insert
    pub created_at: Option<String>,
    /// Set to the current UTC time on insert and on every update
    pub updated_at: Option<String>,
    /// Soft-delete marker; `NULL` means the row is live
    pub deleted_at: Option<String>,
    /// Optimistic lock counter, starting at 0 and bumped by every update
    pub version: Option<String>,
}

impl Lifecycle {
    pub fn is_empty(&self) -> bool {
        self == &Lifecycle::default()
    }
}

/// Declared shape of an entity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableShape {
    name: String,
    primary_key: String,
    columns: Vec<ColumnInfo>,
    #[serde(default, skip_serializing_if = "Lifecycle::is_empty")]
    lifecycle: Lifecycle,
}

impl TableShape {
    /// Build a shape, checking identifiers and locating the primary key.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Result<Self> {
        let name = name.into();
        validate_sql_identifier("table", &name)?;

        for (i, column) in columns.iter().enumerate() {
            validate_sql_identifier("column", &column.name)?;
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::Schema(format!(
                    "duplicate column '{}' on table '{}'",
                    column.name, name
                )));
            }
        }

        let keys: Vec<&ColumnInfo> = columns.iter().filter(|c| c.primary_key).collect();
        let primary_key = match keys.as_slice() {
            [single] => single.name.clone(),
            [] => {
                return Err(Error::Schema(format!(
                    "table '{name}' has no primary key column"
                )))
            }
            _ => {
                return Err(Error::Schema(format!(
                    "table '{name}' has a composite primary key; a single integer key is required"
                )))
            }
        };

        Ok(Self {
            name,
            primary_key,
            columns,
            lifecycle: Lifecycle::default(),
        })
    }

    /// Maintain `created` and `updated` as UTC timestamps.
    pub fn with_timestamps(mut self, created: &str, updated: &str) -> Result<Self> {
        if created == updated {
            return Err(Error::Schema(format!(
                "created and updated timestamps of '{}' need separate columns",
                self.name
            )));
        }
        self.lifecycle.created_at = Some(self.lifecycle_column(created, "timestamp")?);
        self.lifecycle.updated_at = Some(self.lifecycle_column(updated, "timestamp")?);
        Ok(self)
    }

    /// Mark rows deleted by stamping `column` instead of removing them.
    ///
    /// The column must be nullable.
    pub fn with_soft_delete(mut self, column: &str) -> Result<Self> {
        let name = self.lifecycle_column(column, "soft-delete")?;
        if self.column(&name).is_some_and(|c| !c.nullable) {
            return Err(Error::Schema(format!(
                "soft-delete column '{name}' on table '{}' must be nullable",
                self.name
            )));
        }
        self.lifecycle.deleted_at = Some(name);
        Ok(self)
    }

    /// Use the integer `column` as an optimistic lock counter.
    pub fn with_version(mut self, column: &str) -> Result<Self> {
        let name = self.lifecycle_column(column, "version")?;
        if self.column(&name).is_some_and(|c| c.column_type != ColumnType::Integer) {
            return Err(Error::Schema(format!(
                "version column '{name}' on table '{}' must be an integer",
                self.name
            )));
        }
        self.lifecycle.version = Some(name);
        Ok(self)
    }

    fn lifecycle_column(&self, column: &str, role: &str) -> Result<String> {
        self.check_column(column)?;
        if column == self.primary_key {
            return Err(Error::Schema(format!(
                "primary key '{column}' cannot be the {role} column of '{}'",
                self.name
            )));
        }
        Ok(column.to_owned())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn soft_delete_column(&self) -> Option<&str> {
        self.lifecycle.deleted_at.as_deref()
    }

    pub fn version_column(&self) -> Option<&str> {
        self.lifecycle.version.as_deref()
    }

    /// The soft-delete column, or a schema error naming the table
    pub(crate) fn require_soft_delete(&self) -> Result<&str> {
        self.soft_delete_column().ok_or_else(|| {
            Error::Schema(format!("table '{}' has no soft-delete column", self.name))
        })
    }

    /// Same columns and lifecycle under a different table name
    pub fn renamed(&self, name: impl Into<String>) -> Result<Self> {
        let mut shape = Self::new(name, self.columns.clone())?;
        shape.lifecycle = self.lifecycle.clone();
        Ok(shape)
    }

    /// Fail with `UnknownColumn` if `column` is not declared on this shape.
    pub fn check_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(Error::unknown_column(&self.name, column))
        }
    }

    /// Check every key of a payload against the declared columns.
    pub fn check_record(&self, record: &Record) -> Result<()> {
        record.keys().try_for_each(|key| self.check_column(key))
    }
}

/// Anything that can be decoded from a row of the runtime-selected driver.
///
/// Implemented automatically for `#[derive(sqlx::FromRow)]` structs and for
/// [`Record`].
pub trait Entity: for<'r> FromRow<'r, AnyRow> + Clone + Send + Sync + Unpin + 'static {}

impl<T> Entity for T where T: for<'r> FromRow<'r, AnyRow> + Clone + Send + Sync + Unpin + 'static {}

/// An entity with a statically known table shape.
pub trait Model: Entity {
    fn table() -> TableShape;
}

//! xtsqlorm: connection pooling, transaction scopes, repositories and unit of
//! work over sqlx
//!
//! The async API lives at the crate root; [`blocking`] mirrors it for
//! synchronous callers.

pub mod blocking;
pub mod codegen;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod export;
pub mod factory;
pub mod operations;
pub mod pagination;
pub mod query;
pub mod reflect;
pub mod repository;
pub mod schema;
pub mod session;
pub mod uow;
pub mod validate;
pub mod value;

pub use codegen::{generate_model_file, generate_model_source};
pub use config::{DatabaseConfig, EngineOptions, Registry, CONFIG_ENV, DEFAULT_KEY};
pub use dialect::Dialect;
pub use engine::{ConnectionManager, PoolStatus};
pub use error::{Error, Result};
pub use export::Table;
pub use factory::{create_connection_manager, create_operations, create_repository, create_session_provider};
pub use operations::{BulkUpdateReport, FieldStats, Operations};
pub use pagination::{Paginated, Pagination};
pub use query::{Condition, Order, Select, Statement};
pub use reflect::{copy_table, create_table, create_table_sql, drop_table, list_tables, reflect_table, table_exists};
pub use repository::{CrudRepository, Repository};
pub use schema::{is_valid_identifier, validate_sql_identifier, ColumnInfo, ColumnType, Entity, Lifecycle, Model, TableShape};
pub use session::{Session, SessionProvider, TransactionScope};
pub use uow::{SharedSession, UnitOfWork, UnitOfWorkState};
pub use validate::{ValidationError, ValidationMode, Validator};
pub use value::{Record, Value};

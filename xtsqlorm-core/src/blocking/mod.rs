//! Blocking mirror of the async API
//!
//! Same types, same contracts, no `.await`. A connection manager owns a small
//! private tokio runtime and every type derived from it drives the async
//! implementation on that runtime with `block_on`.
//!
//! Calling into this module from inside an async context panics; use the
//! async types there.

mod engine;
mod operations;
mod repository;
mod session;
mod uow;

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;

pub use engine::ConnectionManager;
pub use operations::Operations;
pub use repository::Repository;
pub use session::{Session, SessionProvider};
pub use uow::UnitOfWork;

use crate::config::EngineOptions;
use crate::error::Result;
use crate::schema::{Model, TableShape};
use crate::validate::Validator;

fn runtime() -> Result<Arc<Runtime>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("xtsqlorm-blocking")
        .enable_all()
        .build()?;
    Ok(Arc::new(rt))
}

pub fn create_connection_manager(options: EngineOptions) -> Result<ConnectionManager> {
    ConnectionManager::connect(options)
}

pub fn create_session_provider(manager: &ConnectionManager) -> SessionProvider {
    SessionProvider::new(manager)
}

pub fn create_repository<T: Model>(provider: &SessionProvider) -> Repository<T> {
    Repository::new(provider)
}

pub fn create_operations<T: Model>(
    provider: &SessionProvider,
    validator: Option<Arc<dyn Validator>>,
    cache_enabled: bool,
) -> Operations<T> {
    Operations::new(provider)
        .with_shared_validator(validator)
        .cache_enabled(cache_enabled)
}

pub fn reflect_table(manager: &ConnectionManager, table: &str) -> Result<TableShape> {
    manager.block_on(crate::reflect::reflect_table(manager.as_async(), table))
}

pub fn create_table(manager: &ConnectionManager, shape: &TableShape, if_not_exists: bool) -> Result<()> {
    manager.block_on(crate::reflect::create_table(manager.as_async(), shape, if_not_exists))
}

pub fn drop_table(manager: &ConnectionManager, table: &str, if_exists: bool) -> Result<()> {
    manager.block_on(crate::reflect::drop_table(manager.as_async(), table, if_exists))
}

pub fn copy_table(manager: &ConnectionManager, source: &str, target: &str) -> Result<TableShape> {
    manager.block_on(crate::reflect::copy_table(manager.as_async(), source, target))
}

pub fn table_exists(manager: &ConnectionManager, table: &str) -> Result<bool> {
    manager.block_on(crate::reflect::table_exists(manager.as_async(), table))
}

pub fn list_tables(manager: &ConnectionManager) -> Result<Vec<String>> {
    manager.block_on(crate::reflect::list_tables(manager.as_async()))
}

pub fn generate_model_file(manager: &ConnectionManager, table: &str, path: &Path) -> Result<TableShape> {
    manager.block_on(crate::codegen::generate_model_file(manager.as_async(), table, path))
}

//! One-call constructors for the common wiring

use std::sync::Arc;

use crate::config::EngineOptions;
use crate::engine::ConnectionManager;
use crate::error::Result;
use crate::operations::Operations;
use crate::repository::Repository;
use crate::schema::Model;
use crate::session::SessionProvider;
use crate::validate::Validator;

/// Connect a pool for `options`
pub async fn create_connection_manager(options: EngineOptions) -> Result<ConnectionManager> {
    ConnectionManager::connect(options).await
}

pub fn create_session_provider(manager: ConnectionManager) -> SessionProvider {
    SessionProvider::new(manager)
}

pub fn create_repository<T: Model>(provider: SessionProvider) -> Repository<T> {
    Repository::new(provider)
}

/// Operations for `T` with an optional validator and the result cache on or off
pub fn create_operations<T: Model>(
    provider: SessionProvider,
    validator: Option<Arc<dyn Validator>>,
    cache_enabled: bool,
) -> Operations<T> {
    Operations::for_model(provider)
        .with_shared_validator(validator)
        .cache_enabled(cache_enabled)
}

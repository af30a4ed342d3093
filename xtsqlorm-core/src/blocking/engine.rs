use std::future::Future;
use std::sync::Arc;

use sqlx::AnyPool;
use tokio::runtime::Runtime;

use crate::config::EngineOptions;
use crate::dialect::Dialect;
use crate::engine::PoolStatus;
use crate::error::Result;

/// Blocking [`crate::ConnectionManager`]. Cloning shares the pool and runtime.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: crate::ConnectionManager,
    rt: Arc<Runtime>,
}

impl ConnectionManager {
    pub fn connect(options: EngineOptions) -> Result<Self> {
        let rt = super::runtime()?;
        let inner = rt.block_on(crate::ConnectionManager::connect(options))?;
        Ok(Self { inner, rt })
    }

    pub fn engine(&self) -> &AnyPool {
        self.inner.engine()
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    pub fn ping(&self) -> bool {
        self.rt.block_on(self.inner.ping())
    }

    pub fn dispose(&self) {
        self.rt.block_on(self.inner.dispose())
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    pub fn pool_status(&self) -> Option<PoolStatus> {
        self.inner.pool_status()
    }

    /// The async manager driven by this one
    pub fn as_async(&self) -> &crate::ConnectionManager {
        &self.inner
    }

    pub(crate) fn runtime(&self) -> &Arc<Runtime> {
        &self.rt
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.rt.block_on(future)
    }
}

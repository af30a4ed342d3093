use std::fmt;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::warn;

use super::{Repository, SessionProvider};
use crate::error::{Error, Result};
use crate::schema::{Model, TableShape};
use crate::uow::{SharedSession, UnitOfWorkState};
use crate::value::Record;

/// Blocking [`crate::UnitOfWork`].
///
/// Dropping an active unit of work rolls it back.
pub struct UnitOfWork {
    inner: crate::UnitOfWork,
    rt: Arc<Runtime>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl UnitOfWork {
    pub fn new(provider: &SessionProvider) -> Self {
        Self {
            inner: crate::UnitOfWork::new(provider.as_async().clone()),
            rt: provider.runtime(),
        }
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.inner.state()
    }

    pub fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    pub fn repository<T: Model>(&self) -> Result<Repository<T, SharedSession>> {
        let repository = self.inner.repository::<T>()?;
        Ok(Repository::from_async(repository, Arc::clone(&self.rt)))
    }

    pub fn repository_for(&self, shape: TableShape) -> Result<Repository<Record, SharedSession>> {
        let repository = self.inner.repository_for(shape)?;
        Ok(Repository::from_async(repository, Arc::clone(&self.rt)))
    }

    pub fn repository_count(&self) -> usize {
        self.inner.repository_count()
    }

    pub fn commit(&self) -> Result<()> {
        self.rt.block_on(self.inner.commit())
    }

    pub fn rollback(&self) -> Result<()> {
        self.rt.block_on(self.inner.rollback())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.complete())
    }

    pub fn abort(&mut self) -> Result<()> {
        self.rt.block_on(self.inner.abort())
    }

    /// Run `f` inside a fresh unit of work: commit on `Ok`, roll back on `Err`.
    pub fn run<R, E, F>(provider: &SessionProvider, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&UnitOfWork) -> std::result::Result<R, E>,
        E: From<Error>,
    {
        let mut uow = UnitOfWork::new(provider);
        uow.begin()?;

        match f(&uow) {
            Ok(value) => {
                uow.complete()?;
                Ok(value)
            }
            Err(err) => {
                uow.abort()?;
                Err(err)
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.inner.state() == UnitOfWorkState::Active {
            warn!("blocking unit of work dropped while active; rolling back");
            if let Err(e) = self.rt.block_on(self.inner.abort()) {
                warn!(error = %e, "rollback of dropped unit of work failed");
            }
        }
    }
}

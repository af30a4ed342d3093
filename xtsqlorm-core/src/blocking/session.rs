use std::fmt;
use std::sync::Arc;

use sqlx::any::AnyQueryResult;
use tokio::runtime::Runtime;
use tracing::warn;

use super::ConnectionManager;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::query::Statement;
use crate::schema::Entity;

/// Blocking [`crate::Session`].
///
/// Dropping an unclosed session rolls back whatever it holds.
pub struct Session {
    inner: Option<crate::Session>,
    dialect: Dialect,
    rt: Arc<Runtime>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

impl Session {
    fn new(inner: crate::Session, rt: Arc<Runtime>) -> Self {
        Self {
            dialect: inner.dialect(),
            inner: Some(inner),
            rt,
        }
    }

    pub(crate) fn as_async_mut(&mut self) -> Result<&mut crate::Session> {
        self.inner.as_mut().ok_or(Error::SessionClosed)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn in_transaction(&self) -> bool {
        self.inner.as_ref().is_some_and(crate::Session::in_transaction)
    }

    pub fn begin(&mut self) -> Result<()> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.begin())
    }

    pub fn commit(&mut self) -> Result<()> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.commit())
    }

    pub fn rollback(&mut self) -> Result<()> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.rollback())
    }

    /// Discard anything uncommitted and release the connection.
    pub fn close(mut self) -> Result<()> {
        match self.inner.take() {
            Some(session) => self.rt.block_on(session.close()),
            None => Ok(()),
        }
    }

    pub fn execute(&mut self, stmt: &Statement) -> Result<AnyQueryResult> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.execute(stmt))
    }

    pub fn fetch_all<T: Entity>(&mut self, stmt: &Statement) -> Result<Vec<T>> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.fetch_all(stmt))
    }

    pub fn fetch_optional<T: Entity>(&mut self, stmt: &Statement) -> Result<Option<T>> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.fetch_optional(stmt))
    }

    pub fn fetch_i64(&mut self, stmt: &Statement) -> Result<i64> {
        let session = self.inner.as_mut().ok_or(Error::SessionClosed)?;
        self.rt.block_on(session.fetch_i64(stmt))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(session) = self.inner.take() {
            if let Err(e) = self.rt.block_on(session.close()) {
                warn!(error = %e, "failed to close dropped session");
            }
        }
    }
}

/// Blocking [`crate::SessionProvider`]
#[derive(Debug, Clone)]
pub struct SessionProvider {
    manager: ConnectionManager,
    inner: crate::SessionProvider,
}

impl SessionProvider {
    pub fn new(manager: &ConnectionManager) -> Self {
        Self {
            inner: crate::SessionProvider::new(manager.as_async().clone()),
            manager: manager.clone(),
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn dialect(&self) -> Dialect {
        self.manager.dialect()
    }

    pub fn as_async(&self) -> &crate::SessionProvider {
        &self.inner
    }

    pub(crate) fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(self.manager.runtime())
    }

    /// New session; the caller owns its lifecycle.
    pub fn create_session(&self) -> Session {
        Session::new(self.inner.create_session(), self.runtime())
    }

    /// Run `f` in a fresh session: commit and close on `Ok`, roll back and
    /// close on `Err`. The body's error is returned unchanged unless the
    /// rollback itself fails.
    pub fn transaction<R, E, F>(&self, f: F) -> std::result::Result<R, E>
    where
        F: FnOnce(&mut Session) -> std::result::Result<R, E>,
        E: From<Error>,
    {
        let mut session = self.create_session();
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                session.close()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.rollback() {
                    warn!(error = %rollback_err, "rollback failed after transaction body error");
                    return Err(rollback_err.into());
                }
                session.close()?;
                Err(err)
            }
        }
    }
}

//! Unit of work: many repositories, one session, one commit
//!
//! Repositories handed out by a [`UnitOfWork`] use a [`SharedSession`] as
//! their transaction scope. Its `transaction` runs the closure against the
//! shared session and leaves commit/rollback to the unit of work, so every
//! repository call made through it lands in the same transaction.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::schema::{Entity, Model, TableShape};
use crate::session::{Session, SessionProvider, TransactionScope};
use crate::value::Record;

/// Lifecycle of a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOfWorkState {
    NotStarted,
    Active,
    Closed,
}

impl UnitOfWorkState {
    fn as_str(self) -> &'static str {
        match self {
            UnitOfWorkState::NotStarted => "not started",
            UnitOfWorkState::Active => "active",
            UnitOfWorkState::Closed => "closed",
        }
    }
}

/// A session shared by every repository of one unit of work.
///
/// Calls are serialized through an async mutex. Once the unit of work has
/// finished, every call fails with `Error::SessionClosed`.
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<AsyncMutex<Option<Session>>>,
    dialect: Dialect,
}

impl fmt::Debug for SharedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSession")
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl SharedSession {
    fn new(session: Session) -> Self {
        let dialect = session.dialect();
        Self {
            inner: Arc::new(AsyncMutex::new(Some(session))),
            dialect,
        }
    }

    async fn commit(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.as_mut().ok_or(Error::SessionClosed)?.commit().await
    }

    async fn rollback(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        guard.as_mut().ok_or(Error::SessionClosed)?.rollback().await
    }

    async fn take(&self) -> Result<Session> {
        self.inner.lock().await.take().ok_or(Error::SessionClosed)
    }
}

impl TransactionScope for SharedSession {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn transaction<'a, R, E, F>(&'a self, f: F) -> BoxFuture<'a, std::result::Result<R, E>>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, std::result::Result<R, E>>
            + Send
            + 'a,
        R: Send + 'a,
        E: From<Error> + Send + 'a,
    {
        Box::pin(async move {
            let mut guard = self.inner.lock().await;
            match guard.as_mut() {
                Some(session) => f(session).await,
                None => Err(E::from(Error::SessionClosed)),
            }
        })
    }
}

type RepositoryCache = HashMap<(TypeId, String), Box<dyn Any + Send + Sync>>;

/// One transaction spanning several repositories.
///
/// ```ignore
/// let user = UnitOfWork::run(&provider, |uow| Box::pin(async move {
///     let users = uow.repository::<User>()?;
///     let logs = uow.repository::<AuditLog>()?;
///     let user = users.create(&record! { "username" => "alice" }).await?;
///     logs.create(&record! { "user_id" => user.id, "action" => "signup" }).await?;
///     Ok::<_, Error>(user)
/// })).await?;
/// ```
pub struct UnitOfWork {
    provider: SessionProvider,
    state: UnitOfWorkState,
    session: Option<SharedSession>,
    repositories: Mutex<RepositoryCache>,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("state", &self.state)
            .finish()
    }
}

impl UnitOfWork {
    pub fn new(provider: SessionProvider) -> Self {
        Self {
            provider,
            state: UnitOfWorkState::NotStarted,
            session: None,
            repositories: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    fn expect_state(&self, expected: UnitOfWorkState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(Error::UnitOfWorkState {
                actual: self.state.as_str(),
                expected: expected.as_str(),
            })
        }
    }

    /// Create the shared session. Only valid once.
    pub fn begin(&mut self) -> Result<()> {
        self.expect_state(UnitOfWorkState::NotStarted)?;
        self.session = Some(SharedSession::new(self.provider.create_session()));
        self.state = UnitOfWorkState::Active;
        debug!("unit of work started");
        Ok(())
    }

    /// Scope handle for composing custom work into this unit of work
    pub fn session(&self) -> Result<SharedSession> {
        self.expect_state(UnitOfWorkState::Active)?;
        self.session.clone().ok_or(Error::SessionClosed)
    }

    /// Repository for model `T` bound to the shared session, cached per model.
    pub fn repository<T: Model>(&self) -> Result<Repository<T, SharedSession>> {
        let shape = T::table();
        let key = (TypeId::of::<T>(), shape.name().to_owned());
        self.cached(key, shape)
    }

    /// Record repository for an explicit (e.g. reflected) shape, cached per table.
    pub fn repository_for(&self, shape: TableShape) -> Result<Repository<Record, SharedSession>> {
        let key = (TypeId::of::<Record>(), shape.name().to_owned());
        self.cached(key, shape)
    }

    fn cached<T: Entity>(
        &self,
        key: (TypeId, String),
        shape: TableShape,
    ) -> Result<Repository<T, SharedSession>> {
        let session = self.session()?;
        let mut repositories = self
            .repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let entry = repositories.entry(key).or_insert_with(|| {
            let repository: Box<dyn Any + Send + Sync> =
                Box::new(Repository::<T, SharedSession>::with_shape(shape, session));
            repository
        });

        (**entry)
            .downcast_ref::<Repository<T, SharedSession>>()
            .cloned()
            .ok_or_else(|| Error::Schema("repository cache holds a different entity type".into()))
    }

    /// Number of distinct repositories created so far
    pub fn repository_count(&self) -> usize {
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Commit work so far; later calls start a new transaction on the same session.
    pub async fn commit(&self) -> Result<()> {
        self.session()?.commit().await
    }

    /// Discard work so far; later calls start a new transaction on the same session.
    pub async fn rollback(&self) -> Result<()> {
        self.session()?.rollback().await
    }

    /// Commit, then close the session.
    pub async fn complete(&mut self) -> Result<()> {
        let mut session = self.finish()?.take().await?;
        session.commit().await?;
        session.close().await?;
        debug!("unit of work committed");
        Ok(())
    }

    /// Roll back, then close the session.
    pub async fn abort(&mut self) -> Result<()> {
        let mut session = self.finish()?.take().await?;
        session.rollback().await?;
        session.close().await?;
        warn!("unit of work rolled back");
        Ok(())
    }

    fn finish(&mut self) -> Result<SharedSession> {
        self.expect_state(UnitOfWorkState::Active)?;
        self.state = UnitOfWorkState::Closed;
        self.repositories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.session.take().ok_or(Error::SessionClosed)
    }

    /// Run `f` inside a fresh unit of work: commit on `Ok`, roll back on `Err`.
    ///
    /// The body's error is returned unchanged unless finalizing fails.
    pub async fn run<R, E, F>(provider: &SessionProvider, f: F) -> std::result::Result<R, E>
    where
        F: for<'u> FnOnce(&'u UnitOfWork) -> BoxFuture<'u, std::result::Result<R, E>>,
        E: From<Error>,
    {
        let mut uow = UnitOfWork::new(provider.clone());
        uow.begin()?;

        let outcome = f(&uow).await;
        match outcome {
            Ok(value) => {
                uow.complete().await?;
                Ok(value)
            }
            Err(err) => {
                uow.abort().await?;
                Err(err)
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Active {
            // The session's open transaction is rolled back by sqlx when dropped
            warn!("unit of work dropped while active; pending work is discarded");
        }
    }
}

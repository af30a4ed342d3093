//! Execution scopes and the transaction-scope contract
//!
//! A [`Session`] wraps at most one open transaction. It begins one lazily on
//! first use, and after `commit`/`rollback` the next statement begins a fresh
//! one. `close` rolls back whatever is still pending.
//!
//! [`TransactionScope::transaction`] is the scoped form: commit on `Ok`,
//! roll back on `Err`, close in both cases.

use std::fmt;

use futures::future::BoxFuture;
use sqlx::any::AnyQueryResult;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use tracing::{debug, warn};

use crate::dialect::Dialect;
use crate::engine::ConnectionManager;
use crate::error::{Error, Result};
use crate::query::Statement;
use crate::schema::Entity;

/// One unit of execution against the pool
pub struct Session {
    pool: AnyPool,
    dialect: Dialect,
    tx: Option<Transaction<'static, Any>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("dialect", &self.dialect)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(pool: AnyPool, dialect: Dialect) -> Self {
        Self {
            pool,
            dialect,
            tx: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Whether a transaction is currently open
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Begin a transaction now instead of on first use. No-op if one is open.
    pub async fn begin(&mut self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    /// Connection inside the open transaction, beginning one if needed.
    ///
    /// Use this to run hand-written sqlx queries inside the session.
    pub async fn connection(&mut self) -> Result<&mut AnyConnection> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => {
                let tx = self.pool.begin().await?;
                debug!(dialect = %self.dialect, "transaction started");
                tx
            }
        };
        Ok(&mut **self.tx.insert(tx))
    }

    /// Commit pending work. No-op when nothing is open.
    pub async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!("transaction committed");
        }
        Ok(())
    }

    /// Discard pending work. No-op when nothing is open.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            warn!("transaction rolled back");
        }
        Ok(())
    }

    /// Release the session, rolling back anything not yet committed.
    pub async fn close(mut self) -> Result<()> {
        self.rollback().await
    }

    pub async fn execute(&mut self, stmt: &Statement) -> Result<AnyQueryResult> {
        let args = stmt.arguments()?;
        let conn = self.connection().await?;
        Ok(sqlx::query_with(&stmt.sql, args).execute(conn).await?)
    }

    pub async fn fetch_all<T: Entity>(&mut self, stmt: &Statement) -> Result<Vec<T>> {
        let args = stmt.arguments()?;
        let conn = self.connection().await?;
        Ok(sqlx::query_as_with::<_, T, _>(&stmt.sql, args)
            .fetch_all(conn)
            .await?)
    }

    pub async fn fetch_optional<T: Entity>(&mut self, stmt: &Statement) -> Result<Option<T>> {
        let args = stmt.arguments()?;
        let conn = self.connection().await?;
        Ok(sqlx::query_as_with::<_, T, _>(&stmt.sql, args)
            .fetch_optional(conn)
            .await?)
    }

    /// Single integer result, e.g. a `COUNT(*)`
    pub async fn fetch_i64(&mut self, stmt: &Statement) -> Result<i64> {
        let args = stmt.arguments()?;
        let conn = self.connection().await?;
        Ok(sqlx::query_scalar_with::<_, i64, _>(&stmt.sql, args)
            .fetch_one(conn)
            .await?)
    }
}

/// Something that can run a closure inside a transaction.
///
/// The closure receives a session; returning `Ok` asks the scope to make the
/// work durable, returning `Err` asks it to discard the work. The original
/// error is returned unchanged unless finalizing itself fails.
pub trait TransactionScope: Send + Sync {
    fn dialect(&self) -> Dialect;

    fn transaction<'a, R, E, F>(&'a self, f: F) -> BoxFuture<'a, std::result::Result<R, E>>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, std::result::Result<R, E>>
            + Send
            + 'a,
        R: Send + 'a,
        E: From<Error> + Send + 'a;
}

/// Creates sessions bound to one connection manager
#[derive(Debug, Clone)]
pub struct SessionProvider {
    manager: ConnectionManager,
}

impl SessionProvider {
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// New session; the caller owns its lifecycle and must commit or close it.
    pub fn create_session(&self) -> Session {
        Session::new(self.manager.engine().clone(), self.manager.dialect())
    }
}

impl TransactionScope for SessionProvider {
    fn dialect(&self) -> Dialect {
        self.manager.dialect()
    }

    fn transaction<'a, R, E, F>(&'a self, f: F) -> BoxFuture<'a, std::result::Result<R, E>>
    where
        F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, std::result::Result<R, E>>
            + Send
            + 'a,
        R: Send + 'a,
        E: From<Error> + Send + 'a,
    {
        Box::pin(run_in_transaction(self.create_session(), f))
    }
}

async fn run_in_transaction<R, E, F>(mut session: Session, f: F) -> std::result::Result<R, E>
where
    F: for<'c> FnOnce(&'c mut Session) -> BoxFuture<'c, std::result::Result<R, E>>,
    E: From<Error>,
{
    let outcome = f(&mut session).await;
    match outcome {
        Ok(value) => {
            session.commit().await?;
            session.close().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                // The rollback failure replaces the body's error
                warn!(error = %rollback_err, "rollback failed after transaction body error");
                return Err(rollback_err.into());
            }
            session.close().await?;
            Err(err)
        }
    }
}

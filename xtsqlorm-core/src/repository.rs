//! Generic CRUD over one table shape
//!
//! Two families of operations:
//! - auto-transaction (`get_by_id`, `create`, ..): each call runs in its own
//!   transaction obtained from the repository's [`TransactionScope`]
//! - in-session (`get_by_id_in`, `create_in`, ..): run against a session the
//!   caller owns and never commit or close it
//!
//! Not-found is not an error: lookups return `None`, deletes `false`.
//!
//! Shapes with a soft-delete column also get `soft_delete`, `restore`,
//! `get_active`, `get_deleted` and `permanent_delete_old_records`. Plain
//! reads such as `get_all` still see soft-deleted rows.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::query::{self, Condition, Select};
use crate::schema::{Entity, Model, TableShape};
use crate::session::{Session, SessionProvider, TransactionScope};
use crate::value::{Record, Value};

/// The repository contract shared by [`Repository`] and [`crate::Operations`]
pub trait CrudRepository<T: Entity>: Send + Sync {
    fn get_by_id(&self, id: i64) -> BoxFuture<'_, Result<Option<T>>>;
    fn create<'a>(&'a self, data: &'a Record) -> BoxFuture<'a, Result<T>>;
    fn update<'a>(&'a self, id: i64, data: &'a Record) -> BoxFuture<'a, Result<Option<T>>>;
    fn delete(&self, id: i64) -> BoxFuture<'_, Result<bool>>;
    fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> BoxFuture<'_, Result<Vec<T>>>;
    fn count(&self) -> BoxFuture<'_, Result<u64>>;
    fn exists(&self, id: i64) -> BoxFuture<'_, Result<bool>>;
}

/// CRUD binding of a table shape to a source of transactions
pub struct Repository<T, S = SessionProvider> {
    shape: Arc<TableShape>,
    source: S,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S: Clone> Clone for Repository<T, S> {
    fn clone(&self) -> Self {
        Self {
            shape: Arc::clone(&self.shape),
            source: self.source.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, S> std::fmt::Debug for Repository<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.shape.name())
            .finish()
    }
}

impl<T: Model, S: TransactionScope> Repository<T, S> {
    /// Repository for a model with a static table shape
    pub fn new(source: S) -> Self {
        Self::with_shape(T::table(), source)
    }
}

impl<T: Entity, S: TransactionScope> Repository<T, S> {
    /// Repository for an explicit shape, typically a reflected one with `T = Record`
    pub fn with_shape(shape: impl Into<Arc<TableShape>>, source: S) -> Self {
        Self {
            shape: shape.into(),
            source,
            _entity: PhantomData,
        }
    }

    pub fn shape(&self) -> &TableShape {
        &self.shape
    }

    pub(crate) fn shared_shape(&self) -> Arc<TableShape> {
        Arc::clone(&self.shape)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn dialect(&self) -> Dialect {
        self.source.dialect()
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<T>> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { fetch_by_id(s, &shape, id).await }))
            .await
    }

    /// Insert a row and return it as stored, generated key included.
    pub async fn create(&self, data: &Record) -> Result<T> {
        let shape = Arc::clone(&self.shape);
        let data = data.clone();
        self.source
            .transaction(move |s| Box::pin(async move { insert_row(s, &shape, &data).await }))
            .await
    }

    /// Apply `data` to row `id`; `None` when the row does not exist.
    ///
    /// On a versioned shape, a version value in `data` must match the stored
    /// one or the update fails with `Error::VersionConflict`.
    pub async fn update(&self, id: i64, data: &Record) -> Result<Option<T>> {
        let shape = Arc::clone(&self.shape);
        let data = data.clone();
        self.source
            .transaction(move |s| Box::pin(async move { update_row(s, &shape, id, &data).await }))
            .await
    }

    /// `true` when a row was removed
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { delete_row(s, &shape, id).await }))
            .await
    }

    /// Stamp the soft-delete column of a live row. `false` when the row is
    /// missing or already deleted.
    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { mark_row(s, &shape, id, true).await }))
            .await
    }

    /// Clear the soft-delete column. `false` when the row is missing or live.
    pub async fn restore(&self, id: i64) -> Result<bool> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { mark_row(s, &shape, id, false).await }))
            .await
    }

    /// Rows not soft-deleted
    pub async fn get_active(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.find(deleted_window(&self.shape, false, limit, offset)?).await
    }

    /// Soft-deleted rows only
    pub async fn get_deleted(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.find(deleted_window(&self.shape, true, limit, offset)?).await
    }

    /// Physically remove rows soft-deleted more than `days` days ago.
    /// Returns the number removed.
    pub async fn permanent_delete_old_records(&self, days: u32) -> Result<u64> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { purge_rows(s, &shape, days).await }))
            .await
    }

    /// All rows, or a window of them. `offset: Some(0)` and `None` mean the same
    /// rows but are kept distinct. Soft-deleted rows are included.
    pub async fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.find(window(limit, offset)).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.count_where(None).await
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { row_exists(s, &shape, id).await }))
            .await
    }

    /// Rows matching an arbitrary [`Select`]
    pub async fn find(&self, select: Select) -> Result<Vec<T>> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| Box::pin(async move { select_rows(s, &shape, &select).await }))
            .await
    }

    /// Row count under an optional filter
    pub async fn count_where(&self, filter: Option<Condition>) -> Result<u64> {
        let shape = Arc::clone(&self.shape);
        self.source
            .transaction(move |s| {
                Box::pin(async move { count_rows(s, &shape, filter.as_ref()).await })
            })
            .await
    }

    pub async fn get_by_id_in(&self, session: &mut Session, id: i64) -> Result<Option<T>> {
        fetch_by_id(session, &self.shape, id).await
    }

    pub async fn create_in(&self, session: &mut Session, data: &Record) -> Result<T> {
        insert_row(session, &self.shape, data).await
    }

    pub async fn update_in(&self, session: &mut Session, id: i64, data: &Record) -> Result<Option<T>> {
        update_row(session, &self.shape, id, data).await
    }

    pub async fn delete_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        delete_row(session, &self.shape, id).await
    }

    pub async fn soft_delete_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        mark_row(session, &self.shape, id, true).await
    }

    pub async fn restore_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        mark_row(session, &self.shape, id, false).await
    }

    pub async fn get_all_in(
        &self,
        session: &mut Session,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<T>> {
        select_rows(session, &self.shape, &window(limit, offset)).await
    }

    pub async fn count_in(&self, session: &mut Session) -> Result<u64> {
        count_rows(session, &self.shape, None).await
    }

    pub async fn exists_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        row_exists(session, &self.shape, id).await
    }

    pub async fn find_in(&self, session: &mut Session, select: &Select) -> Result<Vec<T>> {
        select_rows(session, &self.shape, select).await
    }
}

impl<T: Entity, S: TransactionScope> CrudRepository<T> for Repository<T, S> {
    fn get_by_id(&self, id: i64) -> BoxFuture<'_, Result<Option<T>>> {
        Box::pin(Repository::get_by_id(self, id))
    }

    fn create<'a>(&'a self, data: &'a Record) -> BoxFuture<'a, Result<T>> {
        Box::pin(Repository::create(self, data))
    }

    fn update<'a>(&'a self, id: i64, data: &'a Record) -> BoxFuture<'a, Result<Option<T>>> {
        Box::pin(Repository::update(self, id, data))
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Repository::delete(self, id))
    }

    fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> BoxFuture<'_, Result<Vec<T>>> {
        Box::pin(Repository::get_all(self, limit, offset))
    }

    fn count(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(Repository::count(self))
    }

    fn exists(&self, id: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Repository::exists(self, id))
    }
}

fn window(limit: Option<u64>, offset: Option<u64>) -> Select {
    Select {
        limit,
        offset,
        ..Select::default()
    }
}

fn deleted_window(
    shape: &TableShape,
    deleted: bool,
    limit: Option<u64>,
    offset: Option<u64>,
) -> Result<Select> {
    let column = shape.require_soft_delete()?;
    let filter = if deleted {
        Condition::is_not_null(column)
    } else {
        Condition::is_null(column)
    };
    Ok(window(limit, offset).filter(filter))
}

pub(crate) async fn fetch_by_id<T: Entity>(
    session: &mut Session,
    shape: &TableShape,
    id: i64,
) -> Result<Option<T>> {
    let stmt = query::select_by_id(shape, session.dialect(), id);
    session.fetch_optional(&stmt).await
}

pub(crate) async fn insert_row<T: Entity>(
    session: &mut Session,
    shape: &TableShape,
    data: &Record,
) -> Result<T> {
    let materialize = || Error::Materialize {
        table: shape.name().to_owned(),
    };
    let stmt = query::insert(shape, session.dialect(), data)?;

    if session.dialect().supports_returning() {
        let row = session.fetch_optional(&stmt).await?;
        return row.ok_or_else(materialize);
    }

    let result = session.execute(&stmt).await?;
    let id = data
        .get(shape.primary_key())
        .and_then(Value::as_i64)
        .or_else(|| result.last_insert_id())
        .ok_or_else(materialize)?;
    debug!(table = %shape.name(), id, "row inserted");

    fetch_by_id(session, shape, id).await?.ok_or_else(materialize)
}

pub(crate) async fn update_row<T: Entity>(
    session: &mut Session,
    shape: &TableShape,
    id: i64,
    data: &Record,
) -> Result<Option<T>> {
    if let Some(stmt) = query::update(shape, session.dialect(), id, data)? {
        let affected = session.execute(&stmt).await?.rows_affected();
        if affected == 0
            && query::version_guard(shape, data).is_some()
            && row_exists(session, shape, id).await?
        {
            return Err(Error::VersionConflict {
                table: shape.name().to_owned(),
                id,
            });
        }
    }
    // Read back rather than trusting rows_affected: MySQL reports 0 for
    // updates that leave values unchanged.
    let row = fetch_by_id(session, shape, id).await?;
    if row.is_some() {
        debug!(table = %shape.name(), id, "row updated");
    }
    Ok(row)
}

pub(crate) async fn delete_row(session: &mut Session, shape: &TableShape, id: i64) -> Result<bool> {
    let stmt = query::delete(shape, session.dialect(), id);
    let removed = session.execute(&stmt).await?.rows_affected() > 0;
    if removed {
        debug!(table = %shape.name(), id, "row deleted");
    }
    Ok(removed)
}

pub(crate) async fn mark_row(
    session: &mut Session,
    shape: &TableShape,
    id: i64,
    deleted: bool,
) -> Result<bool> {
    let stmt = query::mark_deleted(shape, session.dialect(), id, deleted)?;
    let changed = session.execute(&stmt).await?.rows_affected() > 0;
    if changed {
        debug!(table = %shape.name(), id, deleted, "soft-delete marker changed");
    }
    Ok(changed)
}

pub(crate) async fn purge_rows(session: &mut Session, shape: &TableShape, days: u32) -> Result<u64> {
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    let stmt = query::purge_deleted(
        shape,
        session.dialect(),
        cutoff.format("%Y-%m-%d %H:%M:%S").to_string(),
    )?;
    let removed = session.execute(&stmt).await?.rows_affected();
    debug!(table = %shape.name(), removed, days, "old soft-deleted rows purged");
    Ok(removed)
}

pub(crate) async fn select_rows<T: Entity>(
    session: &mut Session,
    shape: &TableShape,
    select: &Select,
) -> Result<Vec<T>> {
    let stmt = select.to_statement(shape, session.dialect())?;
    session.fetch_all(&stmt).await
}

pub(crate) async fn count_rows(
    session: &mut Session,
    shape: &TableShape,
    filter: Option<&Condition>,
) -> Result<u64> {
    let stmt = query::count(shape, session.dialect(), filter)?;
    let n = session.fetch_i64(&stmt).await?;
    Ok(u64::try_from(n).unwrap_or_default())
}

pub(crate) async fn row_exists(session: &mut Session, shape: &TableShape, id: i64) -> Result<bool> {
    let stmt = query::exists(shape, session.dialect(), id);
    let row: Option<Record> = session.fetch_optional(&stmt).await?;
    Ok(row.is_some())
}

use std::sync::Arc;

use tokio::runtime::Runtime;

use super::{Session, SessionProvider};
use crate::dialect::Dialect;
use crate::error::Result;
use crate::query::{Condition, Select};
use crate::schema::{Entity, Model, TableShape};
use crate::session::TransactionScope;
use crate::value::Record;

/// Blocking [`crate::Repository`]
pub struct Repository<T, S = crate::SessionProvider> {
    inner: crate::Repository<T, S>,
    rt: Arc<Runtime>,
}

impl<T, S: Clone> Clone for Repository<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            rt: Arc::clone(&self.rt),
        }
    }
}

impl<T, S> std::fmt::Debug for Repository<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T: Model> Repository<T> {
    pub fn new(provider: &SessionProvider) -> Self {
        Self::from_async(crate::Repository::new(provider.as_async().clone()), provider.runtime())
    }
}

impl Repository<Record> {
    /// Record repository over an explicit shape
    pub fn with_shape(shape: TableShape, provider: &SessionProvider) -> Self {
        Self::from_async(
            crate::Repository::with_shape(shape, provider.as_async().clone()),
            provider.runtime(),
        )
    }
}

impl<T: Entity, S: TransactionScope> Repository<T, S> {
    pub(crate) fn from_async(inner: crate::Repository<T, S>, rt: Arc<Runtime>) -> Self {
        Self { inner, rt }
    }

    pub(crate) fn into_async(self) -> (crate::Repository<T, S>, Arc<Runtime>) {
        (self.inner, self.rt)
    }

    pub fn shape(&self) -> &TableShape {
        self.inner.shape()
    }

    pub fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<T>> {
        self.rt.block_on(self.inner.get_by_id(id))
    }

    pub fn create(&self, data: &Record) -> Result<T> {
        self.rt.block_on(self.inner.create(data))
    }

    pub fn update(&self, id: i64, data: &Record) -> Result<Option<T>> {
        self.rt.block_on(self.inner.update(id, data))
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.inner.delete(id))
    }

    pub fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.get_all(limit, offset))
    }

    pub fn soft_delete(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.inner.soft_delete(id))
    }

    pub fn restore(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.inner.restore(id))
    }

    pub fn get_active(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.get_active(limit, offset))
    }

    pub fn get_deleted(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.get_deleted(limit, offset))
    }

    pub fn permanent_delete_old_records(&self, days: u32) -> Result<u64> {
        self.rt.block_on(self.inner.permanent_delete_old_records(days))
    }

    pub fn count(&self) -> Result<u64> {
        self.rt.block_on(self.inner.count())
    }

    pub fn exists(&self, id: i64) -> Result<bool> {
        self.rt.block_on(self.inner.exists(id))
    }

    pub fn find(&self, select: Select) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.find(select))
    }

    pub fn count_where(&self, filter: Option<Condition>) -> Result<u64> {
        self.rt.block_on(self.inner.count_where(filter))
    }

    pub fn get_by_id_in(&self, session: &mut Session, id: i64) -> Result<Option<T>> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.get_by_id_in(session, id))
    }

    pub fn create_in(&self, session: &mut Session, data: &Record) -> Result<T> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.create_in(session, data))
    }

    pub fn update_in(&self, session: &mut Session, id: i64, data: &Record) -> Result<Option<T>> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.update_in(session, id, data))
    }

    pub fn delete_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.delete_in(session, id))
    }

    pub fn soft_delete_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.soft_delete_in(session, id))
    }

    pub fn restore_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.restore_in(session, id))
    }

    pub fn get_all_in(&self, session: &mut Session, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.get_all_in(session, limit, offset))
    }

    pub fn count_in(&self, session: &mut Session) -> Result<u64> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.count_in(session))
    }

    pub fn exists_in(&self, session: &mut Session, id: i64) -> Result<bool> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.exists_in(session, id))
    }

    pub fn find_in(&self, session: &mut Session, select: &Select) -> Result<Vec<T>> {
        let session = session.as_async_mut()?;
        self.rt.block_on(self.inner.find_in(session, select))
    }
}

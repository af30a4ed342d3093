use std::sync::Arc;

use tokio::runtime::Runtime;

use super::{Repository, SessionProvider};
use crate::error::Result;
use crate::export::Table;
use crate::operations::{BulkUpdateReport, FieldStats};
use crate::pagination::Paginated;
use crate::query::{Condition, Order, Select};
use crate::schema::{Entity, Model};
use crate::session::TransactionScope;
use crate::validate::Validator;
use crate::value::{Record, Value};

/// Blocking [`crate::Operations`]
pub struct Operations<T, S = crate::SessionProvider> {
    inner: crate::Operations<T, S>,
    rt: Arc<Runtime>,
}

impl<T, S> std::fmt::Debug for Operations<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.inner, f)
    }
}

impl<T: Model> Operations<T> {
    pub fn new(provider: &SessionProvider) -> Self {
        Self::from_repository(Repository::new(provider))
    }
}

impl<T: Entity, S: TransactionScope> Operations<T, S> {
    pub fn from_repository(repository: Repository<T, S>) -> Self {
        let (inner, rt) = repository.into_async();
        Self {
            inner: crate::Operations::new(inner),
            rt,
        }
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.inner = self.inner.with_validator(validator);
        self
    }

    pub fn with_shared_validator(mut self, validator: Option<Arc<dyn Validator>>) -> Self {
        self.inner = self.inner.with_shared_validator(validator);
        self
    }

    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.inner = self.inner.cache_enabled(enabled);
        self
    }

    pub fn clear_cache(&self) {
        self.inner.clear_cache()
    }

    pub fn cache_len(&self) -> usize {
        self.inner.cache_len()
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

    pub fn get_one(&self, filter: Option<Condition>) -> Result<Option<T>> {
        self.rt.block_on(self.inner.get_one(filter))
    }

    pub fn find(&self, select: Select) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.find(select))
    }

    pub fn get_paginated(
        &self,
        page: u64,
        page_size: u64,
        filter: Option<Condition>,
        order_by: Option<&str>,
        order: Order,
    ) -> Result<Paginated<T>> {
        self.rt
            .block_on(self.inner.get_paginated(page, page_size, filter, order_by, order))
    }

    pub fn filter_by_conditions(&self, conditions: &[Record], limit: Option<u64>) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.filter_by_conditions(conditions, limit))
    }

    pub fn bulk_create(&self, items: &[Record]) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.bulk_create(items))
    }

    pub fn bulk_create_batched(&self, items: &[Record], batch_size: usize) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.bulk_create_batched(items, batch_size))
    }

    pub fn bulk_update(&self, items: &[Record], id_key: &str) -> Result<BulkUpdateReport> {
        self.rt.block_on(self.inner.bulk_update(items, id_key))
    }

    pub fn get_field_stats(&self, field: &str) -> Result<FieldStats> {
        self.rt.block_on(self.inner.get_field_stats(field))
    }

    pub fn export_table(&self, columns: Option<&[&str]>, filter: Option<Condition>) -> Result<Table> {
        self.rt.block_on(self.inner.export_table(columns, filter))
    }

    pub fn records(&self) -> Result<Vec<Record>> {
        self.rt.block_on(self.inner.records())
    }

    pub fn distinct_rows(&self, columns: &[&str]) -> Result<Vec<Vec<Value>>> {
        self.rt.block_on(self.inner.distinct_rows(columns))
    }

    pub fn execute_raw(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        self.rt.block_on(self.inner.execute_raw(sql, args))
    }

    pub fn fetch_raw(&self, sql: &str, args: Vec<Value>) -> Result<Vec<Record>> {
        self.rt.block_on(self.inner.fetch_raw(sql, args))
    }

    pub fn from_statement(&self, sql: &str, args: Vec<Value>) -> Result<Vec<T>> {
        self.rt.block_on(self.inner.from_statement(sql, args))
    }
}

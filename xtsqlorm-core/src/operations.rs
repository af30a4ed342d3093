//! Repository extensions: result cache, validation, pagination, batch writes,
//! aggregate stats, export and raw SQL
//!
//! The cache maps `id_{id}` to the last fetched row. It is unbounded and is
//! cleared in full whenever a write goes through the same `Operations` value.
//! Scope an `Operations` narrowly if the table is large.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::export::Table;
use crate::pagination::{Paginated, Pagination};
use crate::query::{self, Condition, Order, Select, Statement};
use crate::repository::{
    count_rows, insert_row, select_rows, update_row, CrudRepository, Repository,
};
use crate::schema::{Entity, Model};
use crate::session::{SessionProvider, TransactionScope};
use crate::validate::{ValidationMode, Validator};
use crate::value::{Record, Value};

/// Outcome of [`Operations::bulk_update`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUpdateReport {
    /// Rows found and updated
    pub updated: u64,
    /// Input positions skipped because they carried no integer id
    pub skipped: Vec<usize>,
    /// Ids that matched no row
    pub not_found: Vec<i64>,
}

/// Aggregates over one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    /// Non-null values
    pub count: u64,
    pub min: Value,
    pub max: Value,
    /// Mean of non-null values, `0.0` when there are none
    pub avg: f64,
}

/// A repository plus cache, validation and higher-level queries
pub struct Operations<T, S = SessionProvider> {
    repository: Repository<T, S>,
    validator: Option<Arc<dyn Validator>>,
    cache: Option<Mutex<HashMap<String, T>>>,
}

impl<T, S> std::fmt::Debug for Operations<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operations")
            .field("repository", &self.repository)
            .field("validator", &self.validator.is_some())
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

impl<T: Model, S: TransactionScope> Operations<T, S> {
    /// Operations for a model, caching enabled and no validator
    pub fn for_model(source: S) -> Self {
        Self::new(Repository::new(source))
    }
}

impl<T: Entity, S: TransactionScope> Operations<T, S> {
    pub fn new(repository: Repository<T, S>) -> Self {
        Self {
            repository,
            validator: None,
            cache: Some(Mutex::new(HashMap::new())),
        }
    }

    /// Validate every create/update payload with `validator`
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn with_shared_validator(mut self, validator: Option<Arc<dyn Validator>>) -> Self {
        self.validator = validator;
        self
    }

    /// Turn the result cache on or off
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn repository(&self) -> &Repository<T, S> {
        &self.repository
    }

    fn cache(&self) -> Option<MutexGuard<'_, HashMap<String, T>>> {
        self.cache
            .as_ref()
            .map(|c| c.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn clear_cache(&self) {
        if let Some(mut cache) = self.cache() {
            if !cache.is_empty() {
                debug!(table = %self.repository.shape().name(), entries = cache.len(), "cache cleared");
            }
            cache.clear();
        }
    }

    /// Entries currently cached (0 when caching is disabled)
    pub fn cache_len(&self) -> usize {
        self.cache().map_or(0, |c| c.len())
    }

    fn validate(&self, data: &Record, mode: ValidationMode) -> Result<()> {
        match &self.validator {
            Some(validator) => validator
                .validate(data, mode)
                .map_err(|e| Error::validation(data.clone(), e.to_string())),
            None => Ok(()),
        }
    }

    /// Cached lookup by primary key. Only found rows are cached.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<T>> {
        let key = format!("id_{id}");
        if let Some(hit) = self.cache().and_then(|c| c.get(&key).cloned()) {
            debug!(table = %self.repository.shape().name(), id, "cache hit");
            return Ok(Some(hit));
        }

        let row = self.repository.get_by_id(id).await?;
        if let (Some(row), Some(mut cache)) = (&row, self.cache()) {
            cache.insert(key, row.clone());
        }
        Ok(row)
    }

    pub async fn create(&self, data: &Record) -> Result<T> {
        self.validate(data, ValidationMode::Create)?;
        let row = self.repository.create(data).await?;
        self.clear_cache();
        Ok(row)
    }

    pub async fn update(&self, id: i64, data: &Record) -> Result<Option<T>> {
        self.validate(data, ValidationMode::Update)?;
        let row = self.repository.update(id, data).await?;
        self.clear_cache();
        Ok(row)
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let removed = self.repository.delete(id).await?;
        if removed {
            self.clear_cache();
        }
        Ok(removed)
    }

    pub async fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.repository.get_all(limit, offset).await
    }

    pub async fn soft_delete(&self, id: i64) -> Result<bool> {
        let changed = self.repository.soft_delete(id).await?;
        if changed {
            self.clear_cache();
        }
        Ok(changed)
    }

    pub async fn restore(&self, id: i64) -> Result<bool> {
        let changed = self.repository.restore(id).await?;
        if changed {
            self.clear_cache();
        }
        Ok(changed)
    }

    pub async fn get_active(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.repository.get_active(limit, offset).await
    }

    pub async fn get_deleted(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<T>> {
        self.repository.get_deleted(limit, offset).await
    }

    pub async fn permanent_delete_old_records(&self, days: u32) -> Result<u64> {
        let removed = self.repository.permanent_delete_old_records(days).await?;
        if removed > 0 {
            self.clear_cache();
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        self.repository.exists(id).await
    }

    /// First row matching `filter`
    pub async fn get_one(&self, filter: Option<Condition>) -> Result<Option<T>> {
        let rows = self
            .repository
            .find(Select::new().filter_opt(filter).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Rows for an arbitrary [`Select`]
    pub async fn find(&self, select: Select) -> Result<Vec<T>> {
        self.repository.find(select).await
    }

    /// One 1-based page plus the total row count under the same filter.
    ///
    /// Rows are ordered only when `order_by` is given.
    pub async fn get_paginated(
        &self,
        page: u64,
        page_size: u64,
        filter: Option<Condition>,
        order_by: Option<&str>,
        order: Order,
    ) -> Result<Paginated<T>> {
        let pagination = Pagination::new(page, page_size);
        let mut select = Select::new()
            .filter_opt(filter.clone())
            .limit(pagination.limit())
            .offset(pagination.offset());
        if let Some(column) = order_by {
            select = select.order_by(column, order);
        }

        let shape = self.repository.shared_shape();
        let (items, total) = self
            .repository
            .source()
            .transaction(move |s| {
                Box::pin(async move {
                    let total = count_rows(s, &shape, filter.as_ref()).await?;
                    let items = select_rows::<T>(s, &shape, &select).await?;
                    Ok::<_, Error>((items, total))
                })
            })
            .await?;

        Ok(Paginated {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
        })
    }

    /// Rows matching any of `conditions`; each record is an AND of equalities.
    /// An empty list matches every row.
    pub async fn filter_by_conditions(&self, conditions: &[Record], limit: Option<u64>) -> Result<Vec<T>> {
        let select = Select {
            filter: Condition::any_of(conditions),
            limit,
            ..Select::default()
        };
        self.repository.find(select).await
    }

    /// Validate every item, then insert them all in one transaction.
    pub async fn bulk_create(&self, items: &[Record]) -> Result<Vec<T>> {
        for item in items {
            self.validate(item, ValidationMode::Create)?;
        }
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let shape = self.repository.shared_shape();
        let items = items.to_vec();
        let rows = self
            .repository
            .source()
            .transaction(move |s| {
                Box::pin(async move {
                    let mut rows = Vec::with_capacity(items.len());
                    for item in &items {
                        rows.push(insert_row::<T>(s, &shape, item).await?);
                    }
                    Ok::<_, Error>(rows)
                })
            })
            .await?;

        info!(table = %self.repository.shape().name(), count = rows.len(), "bulk insert committed");
        self.clear_cache();
        Ok(rows)
    }

    /// Validate every item, then insert in chunks of `batch_size`, one
    /// transaction per chunk. Returns the stored rows in input order.
    ///
    /// A failing chunk is rolled back; earlier chunks stay committed.
    pub async fn bulk_create_batched(&self, items: &[Record], batch_size: usize) -> Result<Vec<T>> {
        for item in items {
            self.validate(item, ValidationMode::Create)?;
        }

        let mut rows = Vec::with_capacity(items.len());
        for chunk in items.chunks(batch_size.max(1)) {
            let shape = self.repository.shared_shape();
            let chunk = chunk.to_vec();
            let outcome = self
                .repository
                .source()
                .transaction(move |s| {
                    Box::pin(async move {
                        let mut batch = Vec::with_capacity(chunk.len());
                        for item in &chunk {
                            batch.push(insert_row::<T>(s, &shape, item).await?);
                        }
                        Ok::<_, Error>(batch)
                    })
                })
                .await;

            match outcome {
                Ok(batch) => {
                    debug!(table = %self.repository.shape().name(), rows = batch.len(), "batch committed");
                    rows.extend(batch);
                }
                Err(e) => {
                    // Earlier batches are already durable
                    if !rows.is_empty() {
                        self.clear_cache();
                    }
                    return Err(e);
                }
            }
        }

        if !rows.is_empty() {
            self.clear_cache();
        }
        Ok(rows)
    }

    /// Apply each item to the row named by its `id_key` value, in one transaction.
    ///
    /// Items are not validated. Items without an integer `id_key` are skipped
    /// and reported, as are ids that match no row.
    pub async fn bulk_update(&self, items: &[Record], id_key: &str) -> Result<BulkUpdateReport> {
        let shape = self.repository.shared_shape();
        let items = items.to_vec();
        let id_key = id_key.to_owned();

        let report = self
            .repository
            .source()
            .transaction(move |s| {
                Box::pin(async move {
                    let mut report = BulkUpdateReport::default();
                    for (index, item) in items.into_iter().enumerate() {
                        let Some(id) = item.get(&id_key).and_then(Value::as_i64) else {
                            report.skipped.push(index);
                            continue;
                        };
                        let mut data = item;
                        data.remove(&id_key);

                        match update_row::<T>(s, &shape, id, &data).await? {
                            Some(_) => report.updated += 1,
                            None => report.not_found.push(id),
                        }
                    }
                    Ok::<_, Error>(report)
                })
            })
            .await?;

        if !report.skipped.is_empty() || !report.not_found.is_empty() {
            info!(
                table = %self.repository.shape().name(),
                updated = report.updated,
                skipped = report.skipped.len(),
                not_found = report.not_found.len(),
                "bulk update left items unapplied"
            );
        }
        if report.updated > 0 {
            self.clear_cache();
        }
        Ok(report)
    }

    /// Count, min, max and average of one column in a single query
    pub async fn get_field_stats(&self, field: &str) -> Result<FieldStats> {
        let stmt = query::field_stats(self.repository.shape(), self.repository.dialect(), field)?;
        let row: Option<Record> = self
            .repository
            .source()
            .transaction(move |s| Box::pin(async move { s.fetch_optional::<Record>(&stmt).await }))
            .await?;

        let row = row.unwrap_or_default();
        let value = |name: &str| row.get(name).cloned().unwrap_or_default();
        Ok(FieldStats {
            count: value("count")
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or_default(),
            min: value("min"),
            max: value("max"),
            avg: value("avg").as_f64().unwrap_or(0.0),
        })
    }

    /// Export rows into a columnar [`Table`]; all columns when `columns` is `None`.
    pub async fn export_table(&self, columns: Option<&[&str]>, filter: Option<Condition>) -> Result<Table> {
        let names: Vec<String> = match columns {
            Some(columns) if !columns.is_empty() => columns.iter().map(|c| c.to_string()).collect(),
            _ => self.repository.shape().column_names().map(str::to_owned).collect(),
        };
        let select = Select::new().columns(names.clone()).filter_opt(filter);
        let records = self.select_records(select).await?;
        Ok(Table::from_records(names, &records))
    }

    /// Every row as a record
    pub async fn records(&self) -> Result<Vec<Record>> {
        self.select_records(Select::new()).await
    }

    /// Distinct value combinations of `columns`
    pub async fn distinct_rows(&self, columns: &[&str]) -> Result<Vec<Vec<Value>>> {
        let select = Select::new().columns(columns.iter().copied()).distinct();
        let records = self.select_records(select).await?;
        Ok(records
            .into_iter()
            .map(|r| {
                columns
                    .iter()
                    .map(|c| r.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect())
    }

    async fn select_records(&self, select: Select) -> Result<Vec<Record>> {
        let shape = self.repository.shared_shape();
        self.repository
            .source()
            .transaction(move |s| Box::pin(async move { select_rows::<Record>(s, &shape, &select).await }))
            .await
    }

    /// Run a hand-written statement; returns rows affected.
    ///
    /// Placeholders follow the backend (`?` or `$n`). Any affected row clears the cache.
    pub async fn execute_raw(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        let stmt = Statement::new(sql, args);
        let affected = self
            .repository
            .source()
            .transaction(move |s| Box::pin(async move { Ok::<_, Error>(s.execute(&stmt).await?.rows_affected()) }))
            .await?;
        if affected > 0 {
            self.clear_cache();
        }
        Ok(affected)
    }

    /// Run a hand-written query and return its rows as records
    pub async fn fetch_raw(&self, sql: &str, args: Vec<Value>) -> Result<Vec<Record>> {
        let stmt = Statement::new(sql, args);
        self.repository
            .source()
            .transaction(move |s| Box::pin(async move { s.fetch_all::<Record>(&stmt).await }))
            .await
    }

    /// Run a hand-written query and decode its rows as `T`
    pub async fn from_statement(&self, sql: &str, args: Vec<Value>) -> Result<Vec<T>> {
        let stmt = Statement::new(sql, args);
        self.repository
            .source()
            .transaction(move |s| Box::pin(async move { s.fetch_all::<T>(&stmt).await }))
            .await
    }
}

impl<T: Entity, S: TransactionScope> CrudRepository<T> for Operations<T, S> {
    fn get_by_id(&self, id: i64) -> BoxFuture<'_, Result<Option<T>>> {
        Box::pin(Operations::get_by_id(self, id))
    }

    fn create<'a>(&'a self, data: &'a Record) -> BoxFuture<'a, Result<T>> {
        Box::pin(Operations::create(self, data))
    }

    fn update<'a>(&'a self, id: i64, data: &'a Record) -> BoxFuture<'a, Result<Option<T>>> {
        Box::pin(Operations::update(self, id, data))
    }

    fn delete(&self, id: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Operations::delete(self, id))
    }

    fn get_all(&self, limit: Option<u64>, offset: Option<u64>) -> BoxFuture<'_, Result<Vec<T>>> {
        Box::pin(Operations::get_all(self, limit, offset))
    }

    fn count(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(Operations::count(self))
    }

    fn exists(&self, id: i64) -> BoxFuture<'_, Result<bool>> {
        Box::pin(Operations::exists(self, id))
    }
}

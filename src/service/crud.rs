//! Model handle: reads through the query stack, writes through the store.

use super::transform::{self, Write};
use crate::config::{Model, DELETED_AT};
use crate::error::{ModelError, Result};
use crate::migration::{self, MigrationReport};
use crate::query::{compile, Operator, Paginated, QueryDescriptor, QueryStack, Where};
use crate::state::AppState;
use crate::value::{Record, Value, INDEX_PLACEHOLDER};
use std::sync::Arc;

/// One model bound to the application state. Cheap to clone.
#[derive(Clone)]
pub struct ModelHandle {
    state: AppState,
    model: Arc<Model>,
}

impl ModelHandle {
    pub fn new(state: AppState, model: Arc<Model>) -> Self {
        ModelHandle { state, model }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn stack(&self) -> QueryStack<'_> {
        QueryStack::new(&self.state)
    }

    /// `query` narrowed to the row whose primary key is `id`.
    fn by_id(&self, id: &Value, query: &QueryDescriptor) -> QueryDescriptor {
        let mut q = query.clone();
        let mut wheres = vec![Where::leaf(&self.model.primary_key, Operator::Eq, id.clone())];
        if !q.wheres.is_empty() {
            wheres.push(Where::group(std::mem::take(&mut q.wheres)));
        }
        q.wheres = wheres;
        q
    }

    /// Fetch one row by primary key, resolving the eager-loads in `query`.
    pub async fn find(&self, id: impl Into<Value>, query: &QueryDescriptor) -> Result<Record> {
        let id = id.into();
        let mut q = self.by_id(&id, query).limit(1);
        q.offset = None;
        let mut rows = self.stack().run_on(self.model.clone(), &q).await?;
        if rows.is_empty() {
            return Err(ModelError::NotFound {
                model: self.model.name.clone(),
                id: id.to_string(),
            });
        }
        Ok(rows.swap_remove(0))
    }

    pub async fn get(&self, query: &QueryDescriptor) -> Result<Vec<Record>> {
        self.stack().run_on(self.model.clone(), query).await
    }

    pub async fn paginate(&self, query: &QueryDescriptor, page: u64, page_size: u64) -> Result<Paginated> {
        self.stack()
            .paginate_on(self.model.clone(), query, page, page_size)
            .await
    }

    /// Alias of `paginate`.
    pub async fn search(&self, query: &QueryDescriptor, page: u64, page_size: u64) -> Result<Paginated> {
        self.paginate(query, page, page_size).await
    }

    pub async fn count(&self, query: &QueryDescriptor) -> Result<u64> {
        self.stack().count_on(&self.model, query).await
    }

    /// Validate without writing.
    pub fn validate(&self, row: &Record) -> Result<()> {
        super::RequestValidator::validate(&self.model, row).map_err(ModelError::Validation)
    }

    /// Insert one row and return its primary key.
    pub async fn create(&self, row: Record) -> Result<Value> {
        let row = transform::prepare(&self.model, row, self.state.hash_cost, Write::Insert)?;
        Ok(self.state.store.insert_get_id(self.model.table(), &row).await?)
    }

    /// Update when the row carries the primary-key field, insert otherwise. Returns the key.
    pub async fn save(&self, mut row: Record) -> Result<Value> {
        match row.remove(&self.model.primary_key) {
            Some(id) => {
                self.update(id.clone(), row).await?;
                Ok(id)
            }
            None => self.create(row).await,
        }
    }

    pub async fn update(&self, id: impl Into<Value>, row: Record) -> Result<u64> {
        let q = self.by_id(&id.into(), &QueryDescriptor::new());
        self.update_where(&q, row).await
    }

    /// Update every row matching `query`; returns the number of rows changed.
    pub async fn update_where(&self, query: &QueryDescriptor, mut row: Record) -> Result<u64> {
        row.remove(&self.model.primary_key);
        let row = transform::prepare(&self.model, row, self.state.hash_cost, Write::Update)?;
        if row.is_empty() {
            return Ok(0);
        }
        let filter = compile::filter(&self.model, query)?;
        Ok(self.state.store.update(self.model.table(), &filter, &row).await?)
    }

    /// Soft delete when the model keeps `deleted_at`, hard delete otherwise.
    pub async fn delete(&self, id: impl Into<Value>) -> Result<u64> {
        let q = self.by_id(&id.into(), &QueryDescriptor::new());
        self.delete_where(&q).await
    }

    pub async fn delete_where(&self, query: &QueryDescriptor) -> Result<u64> {
        if !(self.model.soft_deletes() && self.model.has_column(DELETED_AT)) {
            return self.destroy_where(query).await;
        }
        let filter = compile::filter(&self.model, query)?;
        let mark: Record = [(DELETED_AT, transform::now())].into_iter().collect();
        Ok(self.state.store.update(self.model.table(), &filter, &mark).await?)
    }

    /// Remove the row from the store regardless of soft-delete state.
    pub async fn destroy(&self, id: impl Into<Value>) -> Result<u64> {
        let q = self.by_id(&id.into(), &QueryDescriptor::new());
        self.destroy_where(&q).await
    }

    pub async fn destroy_where(&self, query: &QueryDescriptor) -> Result<u64> {
        let mut q = query.clone();
        q.with_trashed = true;
        let filter = compile::filter(&self.model, &q)?;
        Ok(self.state.store.delete(self.model.table(), &filter).await?)
    }

    /// Save each row in order. `defaults` fill keys a row does not set; a default equal to
    /// `"$index"` becomes the zero-based position of the row. Returns the keys in input order.
    pub async fn each_save(&self, rows: Vec<Record>, defaults: Option<&Record>) -> Result<Vec<Value>> {
        let mut ids = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            if let Some(defaults) = defaults {
                for (k, v) in defaults {
                    if row.contains_key(k) {
                        continue;
                    }
                    let v = if v.as_str() == Some(INDEX_PLACEHOLDER) {
                        Value::from(index)
                    } else {
                        v.clone()
                    };
                    row.insert(k.clone(), v);
                }
            }
            let id = self.save(row).await.map_err(|e| match e {
                ModelError::Validation(v) => ModelError::Validation(v.at_row(index)),
                other => other,
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Raw bulk insert without validation or transforms. Every row must have one value per
    /// column; on any mismatch nothing is written.
    pub async fn insert(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<u64> {
        for c in columns {
            if !self.model.has_column(c) {
                return Err(ModelError::UnknownColumn {
                    model: self.model.name.clone(),
                    column: c.to_string(),
                });
            }
        }
        for (row, values) in rows.iter().enumerate() {
            if values.len() != columns.len() {
                return Err(ModelError::Shape {
                    row,
                    expected: columns.len(),
                    got: values.len(),
                });
            }
        }
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Ok(self
            .state
            .store
            .insert_batch(self.model.table(), &columns, &rows)
            .await?)
    }

    /// Create or bring the model's table up to date. See `migration::migrate`.
    pub async fn migrate(&self, force: bool) -> Result<MigrationReport> {
        migration::migrate(&self.state, &self.model, force).await
    }
}

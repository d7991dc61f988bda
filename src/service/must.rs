//! `must_*` variants: the same operations with errors turned into status-coded faults
//! for an HTTP layer to render.

use super::ModelHandle;
use crate::error::Fault;
use crate::migration::MigrationReport;
use crate::query::{Paginated, QueryDescriptor};
use crate::value::{Record, Value};

impl ModelHandle {
    pub async fn must_find(&self, id: impl Into<Value>, query: &QueryDescriptor) -> Result<Record, Fault> {
        Ok(self.find(id, query).await?)
    }

    pub async fn must_get(&self, query: &QueryDescriptor) -> Result<Vec<Record>, Fault> {
        Ok(self.get(query).await?)
    }

    pub async fn must_paginate(&self, query: &QueryDescriptor, page: u64, page_size: u64) -> Result<Paginated, Fault> {
        Ok(self.paginate(query, page, page_size).await?)
    }

    pub async fn must_search(&self, query: &QueryDescriptor, page: u64, page_size: u64) -> Result<Paginated, Fault> {
        Ok(self.search(query, page, page_size).await?)
    }

    pub async fn must_count(&self, query: &QueryDescriptor) -> Result<u64, Fault> {
        Ok(self.count(query).await?)
    }

    pub async fn must_create(&self, row: Record) -> Result<Value, Fault> {
        Ok(self.create(row).await?)
    }

    pub async fn must_save(&self, row: Record) -> Result<Value, Fault> {
        Ok(self.save(row).await?)
    }

    pub async fn must_update(&self, id: impl Into<Value>, row: Record) -> Result<u64, Fault> {
        Ok(self.update(id, row).await?)
    }

    pub async fn must_update_where(&self, query: &QueryDescriptor, row: Record) -> Result<u64, Fault> {
        Ok(self.update_where(query, row).await?)
    }

    pub async fn must_delete(&self, id: impl Into<Value>) -> Result<u64, Fault> {
        Ok(self.delete(id).await?)
    }

    pub async fn must_delete_where(&self, query: &QueryDescriptor) -> Result<u64, Fault> {
        Ok(self.delete_where(query).await?)
    }

    pub async fn must_destroy(&self, id: impl Into<Value>) -> Result<u64, Fault> {
        Ok(self.destroy(id).await?)
    }

    pub async fn must_destroy_where(&self, query: &QueryDescriptor) -> Result<u64, Fault> {
        Ok(self.destroy_where(query).await?)
    }

    pub async fn must_each_save(&self, rows: Vec<Record>, defaults: Option<&Record>) -> Result<Vec<Value>, Fault> {
        Ok(self.each_save(rows, defaults).await?)
    }

    pub async fn must_insert(&self, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<u64, Fault> {
        Ok(self.insert(columns, rows).await?)
    }

    pub async fn must_migrate(&self, force: bool) -> Result<MigrationReport, Fault> {
        Ok(self.migrate(force).await?)
    }
}

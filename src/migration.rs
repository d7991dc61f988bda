//! Bring a model's table in line with its declared columns: create it when missing,
//! otherwise add new columns and alter drifted ones. Columns are never dropped.

use crate::config::{Column, Model};
use crate::error::{ModelError, Result, StoreError};
use crate::state::AppState;
use crate::store::{ColumnDef, LiveColumn, Store, TableDef, TableDiff};
use serde::Serialize;
use std::collections::HashMap;

/// What a migration did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub table: String,
    pub created: bool,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    /// Live columns no longer declared; left in place.
    pub retained: Vec<String>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        !self.created && self.added.is_empty() && self.changed.is_empty()
    }
}

fn column_def(model: &Model, c: &Column) -> ColumnDef {
    let primary = c.name == model.primary_key;
    ColumnDef {
        name: c.name.clone(),
        kind: c.kind.clone(),
        nullable: c.nullable && !primary,
        default: c.default.clone(),
        primary,
        unique: c.unique,
        index: c.index,
    }
}

pub fn table_def(model: &Model) -> TableDef {
    TableDef {
        name: model.table_name().to_string(),
        comment: model.meta.table.comment.clone(),
        columns: model.ordered_columns().map(|c| column_def(model, c)).collect(),
    }
}

/// Declared-versus-live difference, plus the live columns that are no longer declared.
pub fn diff(store: &dyn Store, model: &Model, live: &[LiveColumn]) -> (TableDiff, Vec<String>) {
    let by_name: HashMap<&str, &LiveColumn> = live.iter().map(|l| (l.name.as_str(), l)).collect();
    let mut out = TableDiff::default();
    for c in model.ordered_columns() {
        let def = column_def(model, c);
        match by_name.get(c.name.as_str()) {
            None => out.add.push(def),
            Some(_) if def.primary => {}
            Some(l) => {
                let same_type = store.native_type(&c.kind).eq_ignore_ascii_case(&l.data_type);
                if !same_type || !l.same_shape(&c.kind) || l.nullable != def.nullable {
                    out.change.push(def);
                }
            }
        }
    }
    let retained = live
        .iter()
        .filter(|l| !model.has_column(&l.name))
        .map(|l| l.name.clone())
        .collect();
    (out, retained)
}

/// Migrate `model`. With `force` the table is dropped and recreated, losing its rows.
/// Store failures are fatal: see `ModelError::is_fatal`.
pub async fn migrate(state: &AppState, model: &Model, force: bool) -> Result<MigrationReport> {
    let table = model.table_name().to_string();
    let fail = |source: StoreError| ModelError::Migration {
        table: table.clone(),
        source,
    };
    let store = state.store.as_ref();
    let mut report = MigrationReport {
        table: table.clone(),
        ..Default::default()
    };

    if force {
        tracing::info!(model = %model.name, table = %table, "dropping table before migration");
        store.drop_table_if_exists(&table).await.map_err(fail)?;
    }

    if !store.has_table(&table).await.map_err(fail)? {
        store.create_table(&table_def(model)).await.map_err(fail)?;
        tracing::info!(model = %model.name, table = %table, "table created");
        report.created = true;
        return Ok(report);
    }

    let live = store.describe_table(&table).await.map_err(fail)?;
    let (delta, retained) = diff(store, model, &live);
    for name in &retained {
        tracing::warn!(table = %table, column = %name, "live column is no longer declared; retained");
    }
    report.retained = retained;
    if delta.is_empty() {
        return Ok(report);
    }
    store.alter_table(&table, &delta).await.map_err(fail)?;
    report.added = delta.add.iter().map(|c| c.name.clone()).collect();
    report.changed = delta.change.iter().map(|c| c.name.clone()).collect();
    tracing::info!(table = %table, added = ?report.added, changed = ?report.changed, "table altered");
    Ok(report)
}

/// Migrate every registered model, stopping at the first failure.
pub async fn migrate_all(state: &AppState, force: bool) -> Result<Vec<MigrationReport>> {
    let mut reports = Vec::new();
    for name in state.registry.names() {
        let model = state.model(&name)?;
        reports.push(migrate(state, &model, force).await?);
    }
    Ok(reports)
}

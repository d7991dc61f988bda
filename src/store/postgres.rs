//! PostgreSQL store over a sqlx pool. Every table lives in one configured schema.

use super::{Clause, LiveColumn, SelectQuery, Store, TableDef, TableDiff, TableSchema};
use crate::config::ColumnKind;
use crate::error::StoreError;
use crate::settings::Settings;
use crate::sql::{self, PgBindValue, QueryBuf, MAX_PARAMS};
use crate::value::{Record, Value};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    /// Open a pool from settings and make sure the target schema exists.
    pub async fn connect(settings: &Settings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.database_url)
            .await?;
        let ddl = format!("CREATE SCHEMA IF NOT EXISTS {}", sql::quoted(&settings.schema));
        sqlx::query(&ddl).execute(&pool).await?;
        tracing::info!(schema = %settings.schema, "connected to postgres");
        Ok(PgStore::new(pool, settings.schema.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<PgRow>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        Ok(query.fetch_all(&self.pool).await?)
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn execute_ddl(&self, statements: &[String]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for stmt in statements {
            tracing::debug!(sql = %stmt, "ddl");
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: &TableSchema, query: &SelectQuery) -> Result<Vec<Record>, StoreError> {
        let q = sql::select(&self.schema, table, query);
        let rows = self.fetch_all(&q).await?;
        Ok(rows.iter().map(|r| row_to_record(r, table)).collect())
    }

    async fn count(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError> {
        let q = sql::count(&self.schema, table, filter);
        let rows = self.fetch_all(&q).await?;
        let total: i64 = match rows.first() {
            Some(row) => row.try_get("total")?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn insert_get_id(&self, table: &TableSchema, row: &Record) -> Result<Value, StoreError> {
        let q = sql::insert(&self.schema, table, row);
        let rows = self.fetch_all(&q).await?;
        let id = match (rows.first(), table.primary_key.as_deref()) {
            (Some(r), Some(pk)) => cell_to_value(r, pk),
            _ => Value::Null,
        };
        Ok(id)
    }

    async fn insert_batch(
        &self,
        table: &TableSchema,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let per_chunk = (MAX_PARAMS / columns.len().max(1)).max(1);
        let mut tx = self.pool.begin().await?;
        let mut total = 0;
        for chunk in rows.chunks(per_chunk) {
            let q = sql::insert_many(&self.schema, table, columns, chunk);
            tracing::debug!(sql = %q.sql, rows = chunk.len(), "query (tx)");
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(PgBindValue::from(p));
            }
            total += query.execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;
        Ok(total)
    }

    async fn update(&self, table: &TableSchema, filter: &[Clause], values: &Record) -> Result<u64, StoreError> {
        if values.is_empty() {
            return Ok(0);
        }
        self.execute(&sql::update(&self.schema, table, filter, values)).await
    }

    async fn delete(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError> {
        self.execute(&sql::delete(&self.schema, table, filter)).await
    }

    async fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2)",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get::<bool, _>(0)?)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<LiveColumn>, StoreError> {
        let rows = sqlx::query(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, is_nullable::text AS is_nullable, \
             character_maximum_length::int4 AS length, numeric_precision::int4 AS precision, numeric_scale::int4 AS scale \
             FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(StoreError::MissingTable(table.to_string()));
        }
        let size = |r: &PgRow, column: &str| -> Result<Option<u32>, StoreError> {
            Ok(r.try_get::<Option<i32>, _>(column)?.and_then(|n| u32::try_from(n).ok()))
        };
        rows.iter()
            .map(|r| -> Result<LiveColumn, StoreError> {
                Ok(LiveColumn {
                    name: r.try_get("column_name")?,
                    data_type: r.try_get("data_type")?,
                    nullable: r.try_get::<String, _>("is_nullable")? == "YES",
                    length: size(r, "length")?,
                    precision: size(r, "precision")?,
                    scale: size(r, "scale")?,
                })
            })
            .collect()
    }

    async fn create_table(&self, def: &TableDef) -> Result<(), StoreError> {
        if self.has_table(&def.name).await? {
            return Err(StoreError::TableExists(def.name.clone()));
        }
        self.execute_ddl(&sql::create_table(&self.schema, def)).await
    }

    async fn alter_table(&self, table: &str, diff: &TableDiff) -> Result<(), StoreError> {
        self.execute_ddl(&sql::alter_table(&self.schema, table, diff)).await
    }

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), StoreError> {
        self.execute_ddl(&[sql::drop_table_if_exists(&self.schema, table)]).await
    }

    fn native_type(&self, kind: &ColumnKind) -> String {
        sql::ddl_type(kind).1.to_string()
    }
}

fn row_to_record(row: &PgRow, table: &TableSchema) -> Record {
    use sqlx::Column;
    let mut record = Record::new();
    for col in row.columns() {
        let name = col.name();
        let v = cell_to_value(row, name);
        let v = match (table.kind(name), v) {
            (Some(ColumnKind::Decimal { .. }), Value::String(s)) => match s.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (_, v) => v,
        };
        record.insert(name.to_string(), v);
    }
    record
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Int(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Int(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Int(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        return Value::Float(n as f64);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        return Value::Float(n);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(t)) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
        return Value::String(t.format("%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return j.into();
    }
    Value::Null
}

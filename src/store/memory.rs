//! In-process store: tables are vectors of records behind one `RwLock`.
//! Locks are never held across an await, so concurrent tasks see each statement as atomic.

use super::{Clause, Condition, Conjunction, LiveColumn, Operator, SelectQuery, Store, TableDef, TableDiff, TableSchema};
use crate::config::ColumnKind;
use crate::error::StoreError;
use crate::value::{Record, Value};
use async_trait::async_trait;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug)]
struct MemTable {
    columns: Vec<LiveColumn>,
    defaults: HashMap<String, Value>,
    primary_key: Option<String>,
    auto_increment: bool,
    next_id: i64,
    rows: Vec<Record>,
}

impl MemTable {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn check_columns<'a>(&self, table: &str, names: impl IntoIterator<Item = &'a String>) -> Result<(), StoreError> {
        for name in names {
            if !self.has_column(name) {
                return Err(StoreError::UnknownColumn {
                    table: table.to_string(),
                    column: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_filter(&self, table: &str, filter: &[Clause]) -> Result<(), StoreError> {
        for clause in filter {
            match &clause.cond {
                Condition::Compare { column, .. } => self.check_columns(table, [column])?,
                Condition::Group(inner) => self.check_filter(table, inner)?,
            }
        }
        Ok(())
    }

    /// Build a complete row from `values`, filling defaults and the generated key.
    /// Does not touch `rows`; `next_id` is returned for the caller to commit.
    fn build_row(&self, table: &str, values: &Record, next_id: i64) -> Result<(Record, i64), StoreError> {
        self.check_columns(table, values.keys())?;
        let mut next_id = next_id;
        let mut row = Record::new();
        for col in &self.columns {
            let value = match values.get(&col.name) {
                Some(v) => v.clone(),
                None => self.defaults.get(&col.name).cloned().unwrap_or(Value::Null),
            };
            row.insert(col.name.clone(), value);
        }
        if let Some(pk) = &self.primary_key {
            let current = row.get(pk).cloned().unwrap_or(Value::Null);
            if current.is_null() && self.auto_increment {
                row.insert(pk.clone(), Value::Int(next_id));
                next_id += 1;
            } else if let Some(n) = current.as_i64() {
                next_id = next_id.max(n + 1);
            }
        }
        for col in &self.columns {
            if !col.nullable && row.get(&col.name).map(Value::is_null).unwrap_or(true) {
                return Err(StoreError::Constraint(format!(
                    "{}.{} must not be null",
                    table, col.name
                )));
            }
        }
        Ok((row, next_id))
    }

    fn check_primary_keys<'a>(&self, table: &str, incoming: impl IntoIterator<Item = &'a Record>) -> Result<(), StoreError> {
        let Some(pk) = &self.primary_key else {
            return Ok(());
        };
        let mut seen: HashSet<String> = self
            .rows
            .iter()
            .filter_map(|r| r.get(pk).and_then(Value::key))
            .collect();
        for row in incoming {
            if let Some(key) = row.get(pk).and_then(Value::key) {
                if !seen.insert(key.clone()) {
                    return Err(StoreError::Constraint(format!(
                        "duplicate {}.{} = {}",
                        table, pk, key
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Store that keeps every table in memory. Useful for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, MemTable>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Unsupported("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, MemTable>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Unsupported("memory store lock poisoned".into()))
    }
}

fn missing(table: &str) -> StoreError {
    StoreError::MissingTable(table.to_string())
}

/// Fold clauses left to right. `None` when the list holds no effective condition.
fn eval_clauses(row: &Record, clauses: &[Clause]) -> Option<bool> {
    let mut acc: Option<bool> = None;
    for clause in clauses {
        let Some(part) = eval_condition(row, &clause.cond) else {
            continue;
        };
        acc = Some(match (acc, clause.conj) {
            (None, _) => part,
            (Some(prev), Conjunction::And) => prev && part,
            (Some(prev), Conjunction::Or) => prev || part,
        });
    }
    acc
}

fn eval_condition(row: &Record, cond: &Condition) -> Option<bool> {
    match cond {
        Condition::Group(inner) => eval_clauses(row, inner),
        Condition::Compare { column, op, value } => {
            let cell = row.get(column).unwrap_or(&Value::Null);
            Some(compare(cell, *op, value))
        }
    }
}

fn compare(cell: &Value, op: Operator, value: &Value) -> bool {
    match op {
        Operator::Null => return cell.is_null(),
        Operator::NotNull => return !cell.is_null(),
        Operator::Eq if value.is_null() => return cell.is_null(),
        Operator::Ne if value.is_null() => return !cell.is_null(),
        _ => {}
    }
    if cell.is_null() {
        return false;
    }
    let operand = as_text_operand(cell, value);
    let value: &Value = &operand;
    match op {
        Operator::Eq => cell.loose_eq(value),
        Operator::Ne => !cell.loose_eq(value),
        Operator::Gt => cell.compare(value) == Some(Ordering::Greater),
        Operator::Ge => matches!(cell.compare(value), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => cell.compare(value) == Some(Ordering::Less),
        Operator::Le => matches!(cell.compare(value), Some(Ordering::Less | Ordering::Equal)),
        Operator::Like => match value.as_str() {
            Some(pattern) => like(&cell.to_string(), pattern),
            None => false,
        },
        Operator::In => match value {
            Value::List(items) => items.iter().any(|v| cell.loose_eq(v)),
            other => cell.loose_eq(other),
        },
        Operator::Null => false,
        Operator::NotNull => true,
    }
}

/// A scalar compared with a string cell is compared as its text, matching the `::text`
/// cast the SQL builder puts on textual columns.
fn as_text_operand<'v>(cell: &Value, value: &'v Value) -> Cow<'v, Value> {
    if !matches!(cell, Value::String(_)) {
        return Cow::Borrowed(value);
    }
    match value {
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Cow::Owned(Value::String(value.to_string())),
        Value::List(items) if items.iter().any(|v| matches!(v, Value::Int(_) | Value::Float(_) | Value::Bool(_))) => {
            Cow::Owned(Value::List(
                items
                    .iter()
                    .map(|v| as_text_operand(cell, v).into_owned())
                    .collect(),
            ))
        }
        _ => Cow::Borrowed(value),
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character. Case-sensitive.
fn like(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

fn matches(row: &Record, filter: &[Clause]) -> bool {
    eval_clauses(row, filter).unwrap_or(true)
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &TableSchema, query: &SelectQuery) -> Result<Vec<Record>, StoreError> {
        let tables = self.read()?;
        let t = tables.get(&table.name).ok_or_else(|| missing(&table.name))?;
        t.check_filter(&table.name, &query.filter)?;
        t.check_columns(&table.name, &query.columns)?;
        t.check_columns(&table.name, query.orders.iter().map(|(c, _)| c))?;

        let mut rows: Vec<&Record> = t.rows.iter().filter(|r| matches(r, &query.filter)).collect();
        if !query.orders.is_empty() {
            rows.sort_by(|a, b| {
                for (col, dir) in &query.orders {
                    let av = a.get(col).unwrap_or(&Value::Null);
                    let bv = b.get(col).unwrap_or(&Value::Null);
                    let ord = av.compare(bv).unwrap_or(Ordering::Equal);
                    let ord = match dir {
                        super::Direction::Asc => ord,
                        super::Direction::Desc => ord.reverse(),
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        let out = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| {
                if query.columns.is_empty() {
                    r.clone()
                } else {
                    query
                        .columns
                        .iter()
                        .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                }
            })
            .collect();
        Ok(out)
    }

    async fn count(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError> {
        let tables = self.read()?;
        let t = tables.get(&table.name).ok_or_else(|| missing(&table.name))?;
        t.check_filter(&table.name, filter)?;
        Ok(t.rows.iter().filter(|r| matches(r, filter)).count() as u64)
    }

    async fn insert_get_id(&self, table: &TableSchema, row: &Record) -> Result<Value, StoreError> {
        let mut tables = self.write()?;
        let t = tables.get_mut(&table.name).ok_or_else(|| missing(&table.name))?;
        let (row, next_id) = t.build_row(&table.name, row, t.next_id)?;
        t.check_primary_keys(&table.name, [&row])?;
        let id = t
            .primary_key
            .as_ref()
            .and_then(|pk| row.get(pk).cloned())
            .unwrap_or(Value::Null);
        t.next_id = next_id;
        t.rows.push(row);
        Ok(id)
    }

    async fn insert_batch(
        &self,
        table: &TableSchema,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let t = tables.get_mut(&table.name).ok_or_else(|| missing(&table.name))?;
        let mut next_id = t.next_id;
        let mut built = Vec::with_capacity(rows.len());
        for values in rows {
            if values.len() != columns.len() {
                return Err(StoreError::Constraint(format!(
                    "{}: row has {} values for {} columns",
                    table.name,
                    values.len(),
                    columns.len()
                )));
            }
            let record: Record = columns.iter().cloned().zip(values.iter().cloned()).collect();
            let (row, n) = t.build_row(&table.name, &record, next_id)?;
            next_id = n;
            built.push(row);
        }
        t.check_primary_keys(&table.name, &built)?;
        let count = built.len() as u64;
        t.next_id = next_id;
        t.rows.extend(built);
        Ok(count)
    }

    async fn update(&self, table: &TableSchema, filter: &[Clause], values: &Record) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let t = tables.get_mut(&table.name).ok_or_else(|| missing(&table.name))?;
        t.check_filter(&table.name, filter)?;
        t.check_columns(&table.name, values.keys())?;
        let mut count = 0;
        for row in t.rows.iter_mut().filter(|r| matches(r, filter)) {
            for (k, v) in values {
                row.insert(k.clone(), v.clone());
            }
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError> {
        let mut tables = self.write()?;
        let t = tables.get_mut(&table.name).ok_or_else(|| missing(&table.name))?;
        t.check_filter(&table.name, filter)?;
        let before = t.rows.len();
        t.rows.retain(|r| !matches(r, filter));
        Ok((before - t.rows.len()) as u64)
    }

    async fn has_table(&self, table: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(table))
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<LiveColumn>, StoreError> {
        let tables = self.read()?;
        let t = tables.get(table).ok_or_else(|| missing(table))?;
        Ok(t.columns.clone())
    }

    async fn create_table(&self, def: &TableDef) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.contains_key(&def.name) {
            return Err(StoreError::TableExists(def.name.clone()));
        }
        let primary = def.columns.iter().find(|c| c.primary);
        let table = MemTable {
            columns: def
                .columns
                .iter()
                .map(|c| LiveColumn::declared(c, self.native_type(&c.kind)))
                .collect(),
            defaults: def
                .columns
                .iter()
                .filter_map(|c| c.default.clone().map(|d| (c.name.clone(), d)))
                .collect(),
            primary_key: primary.map(|c| c.name.clone()),
            auto_increment: primary.map(|c| c.kind == ColumnKind::Id).unwrap_or(false),
            next_id: 1,
            rows: Vec::new(),
        };
        tables.insert(def.name.clone(), table);
        Ok(())
    }

    async fn alter_table(&self, table: &str, diff: &TableDiff) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let t = tables.get_mut(table).ok_or_else(|| missing(table))?;
        for c in &diff.change {
            let nullable = c.nullable;
            if !nullable && t.rows.iter().any(|r| r.get(&c.name).map(Value::is_null).unwrap_or(true)) {
                return Err(StoreError::Constraint(format!(
                    "{}.{} has null values and cannot become NOT NULL",
                    table, c.name
                )));
            }
            if let Some(limit) = c.kind.max_length() {
                let too_long = |v: &Value| v.as_str().map_or(false, |s| s.chars().count() > limit as usize);
                if t.rows.iter().any(|r| r.get(&c.name).map_or(false, too_long)) {
                    return Err(StoreError::Constraint(format!(
                        "{}.{} has values longer than {}",
                        table, c.name, limit
                    )));
                }
            }
        }
        for c in &diff.add {
            if !c.nullable && c.default.is_none() && !t.rows.is_empty() && !t.has_column(&c.name) {
                return Err(StoreError::Constraint(format!(
                    "{}.{} is NOT NULL without a default",
                    table, c.name
                )));
            }
        }
        for c in &diff.add {
            if t.has_column(&c.name) {
                continue;
            }
            let fill = c.default.clone().unwrap_or(Value::Null);
            for row in &mut t.rows {
                row.insert(c.name.clone(), fill.clone());
            }
            if let Some(d) = &c.default {
                t.defaults.insert(c.name.clone(), d.clone());
            }
            t.columns.push(LiveColumn::declared(c, c.kind.name().to_string()));
        }
        for c in &diff.change {
            if let Some(live) = t.columns.iter_mut().find(|l| l.name == c.name) {
                *live = LiveColumn::declared(c, c.kind.name().to_string());
            }
        }
        Ok(())
    }

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), StoreError> {
        self.write()?.remove(table);
        Ok(())
    }

    fn native_type(&self, kind: &ColumnKind) -> String {
        kind.name().to_string()
    }
}

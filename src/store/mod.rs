//! Store collaborator: the table-scoped query and schema operations the engine issues.
//! `PgStore` speaks PostgreSQL through sqlx; `MemoryStore` keeps tables in process.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::ColumnKind;
use crate::error::StoreError;
use crate::value::{Record, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison operator of a filter leaf.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    #[default]
    #[serde(alias = "=")]
    Eq,
    #[serde(alias = "!=", alias = "<>")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    Like,
    In,
    Null,
    #[serde(alias = "not_null")]
    NotNull,
}

/// How a filter node joins the nodes before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conjunction {
    #[default]
    #[serde(rename = "where", alias = "and")]
    And,
    #[serde(rename = "orwhere", alias = "or")]
    Or,
}

impl Operator {
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::Null => "IS NULL",
            Operator::NotNull => "IS NOT NULL",
        }
    }
}

impl Conjunction {
    pub fn sql(self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Compiled filter node. Columns are already checked against the model.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare { column: String, op: Operator, value: Value },
    Group(Vec<Clause>),
}

/// A condition and the conjunction joining it to the clauses before it.
/// A clause list folds left to right: `a AND b OR c` means `(a AND b) OR c`.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub conj: Conjunction,
    pub cond: Condition,
}

impl Clause {
    pub fn and(cond: Condition) -> Self {
        Clause { conj: Conjunction::And, cond }
    }

    pub fn compare(column: &str, op: Operator, value: impl Into<Value>) -> Self {
        Clause::and(Condition::Compare {
            column: column.to_string(),
            op,
            value: value.into(),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectQuery {
    /// Empty selects every column.
    pub columns: Vec<String>,
    pub filter: Vec<Clause>,
    pub orders: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// What a store needs to know about a table to address and type it.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    pub name: String,
    pub primary_key: Option<String>,
    pub auto_increment: bool,
    /// Declared columns in order; empty for untyped tables.
    pub columns: Vec<String>,
    pub kinds: HashMap<String, ColumnKind>,
}

impl TableSchema {
    /// A table known only by name, such as a pivot table.
    pub fn untyped(name: &str) -> Self {
        TableSchema {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn kind(&self, column: &str) -> Option<&ColumnKind> {
        self.kinds.get(column)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Option<Value>,
    pub primary: bool,
    pub unique: bool,
    pub index: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnDef>,
}

/// Column as it currently exists in the store. `data_type` uses the store's own vocabulary.
/// The size fields are `None` when the store does not report them for the type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

impl LiveColumn {
    /// Live view of a column created exactly as `def` declares it.
    pub fn declared(def: &ColumnDef, data_type: String) -> Self {
        let shape = def.kind.numeric_shape();
        LiveColumn {
            name: def.name.clone(),
            data_type,
            nullable: def.nullable,
            length: def.kind.max_length(),
            precision: shape.map(|(p, _)| p),
            scale: shape.map(|(_, s)| s),
        }
    }

    /// Whether the reported size agrees with `kind`. Sizes the store does not report match.
    pub fn same_shape(&self, kind: &ColumnKind) -> bool {
        let agrees = |live: Option<u32>, declared: u32| live.map_or(true, |n| n == declared);
        match (kind.max_length(), kind.numeric_shape()) {
            (Some(length), _) => agrees(self.length, length),
            (_, Some((precision, scale))) => agrees(self.precision, precision) && agrees(self.scale, scale),
            _ => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableDiff {
    pub add: Vec<ColumnDef>,
    pub change: Vec<ColumnDef>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.change.is_empty()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &TableSchema, query: &SelectQuery) -> Result<Vec<Record>, StoreError>;

    async fn count(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError>;

    /// Insert one row and return its primary key (generated when the row does not carry one).
    async fn insert_get_id(&self, table: &TableSchema, row: &Record) -> Result<Value, StoreError>;

    /// Insert many rows at once; either every row is written or none is.
    async fn insert_batch(
        &self,
        table: &TableSchema,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<u64, StoreError>;

    async fn update(&self, table: &TableSchema, filter: &[Clause], values: &Record) -> Result<u64, StoreError>;

    async fn delete(&self, table: &TableSchema, filter: &[Clause]) -> Result<u64, StoreError>;

    async fn has_table(&self, table: &str) -> Result<bool, StoreError>;

    async fn describe_table(&self, table: &str) -> Result<Vec<LiveColumn>, StoreError>;

    async fn create_table(&self, def: &TableDef) -> Result<(), StoreError>;

    async fn alter_table(&self, table: &str, diff: &TableDiff) -> Result<(), StoreError>;

    async fn drop_table_if_exists(&self, table: &str) -> Result<(), StoreError>;

    /// Native type name for `kind`, comparable with `LiveColumn::data_type`.
    fn native_type(&self, kind: &ColumnKind) -> String;
}

//! Resolved model: declared metadata flattened into the lookup structure every operation consults.

use crate::config::{validate, ColumnConfig, Crypt, MetaData, RelationConfig, ValidationRule};
use crate::error::ModelError;
use crate::store::TableSchema;
use crate::value::Value;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const DELETED_AT: &str = "deleted_at";
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Declared column type, parsed from the `type` string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Id,
    String { length: u32 },
    Char { length: u32 },
    Text,
    SmallInteger,
    Integer,
    BigInteger,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    Boolean,
    Json,
    Date,
    DateTime,
    Timestamp,
    Time,
    Uuid,
    Enum,
    Password,
}

impl ColumnKind {
    pub fn parse(col: &ColumnConfig) -> Option<Self> {
        let length = col.length.unwrap_or(255);
        Some(match col.type_.to_lowercase().as_str() {
            "id" => ColumnKind::Id,
            "string" | "varchar" => ColumnKind::String { length },
            "char" => ColumnKind::Char { length: col.length.unwrap_or(1) },
            "text" | "mediumtext" | "longtext" => ColumnKind::Text,
            "tinyinteger" | "smallinteger" => ColumnKind::SmallInteger,
            "integer" | "int" => ColumnKind::Integer,
            "biginteger" | "bigint" => ColumnKind::BigInteger,
            "float" => ColumnKind::Float,
            "double" => ColumnKind::Double,
            "decimal" => ColumnKind::Decimal {
                precision: col.precision.unwrap_or(10),
                scale: col.scale.unwrap_or(2),
            },
            "boolean" | "bool" => ColumnKind::Boolean,
            "json" | "jsonb" => ColumnKind::Json,
            "date" => ColumnKind::Date,
            "datetime" => ColumnKind::DateTime,
            "timestamp" => ColumnKind::Timestamp,
            "time" => ColumnKind::Time,
            "uuid" => ColumnKind::Uuid,
            "enum" => ColumnKind::Enum,
            "password" => ColumnKind::Password,
            _ => return None,
        })
    }

    /// Canonical lower-case name, also used by the in-memory store as its native type.
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Id => "id",
            ColumnKind::String { .. } => "string",
            ColumnKind::Char { .. } => "char",
            ColumnKind::Text => "text",
            ColumnKind::SmallInteger => "smallinteger",
            ColumnKind::Integer => "integer",
            ColumnKind::BigInteger => "biginteger",
            ColumnKind::Float => "float",
            ColumnKind::Double => "double",
            ColumnKind::Decimal { .. } => "decimal",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Json => "json",
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Time => "time",
            ColumnKind::Uuid => "uuid",
            ColumnKind::Enum => "enum",
            ColumnKind::Password => "password",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnKind::Id | ColumnKind::SmallInteger | ColumnKind::Integer | ColumnKind::BigInteger
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(self, ColumnKind::Float | ColumnKind::Double | ColumnKind::Decimal { .. })
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnKind::String { .. }
                | ColumnKind::Char { .. }
                | ColumnKind::Text
                | ColumnKind::Enum
                | ColumnKind::Password
                | ColumnKind::Uuid
                | ColumnKind::Date
                | ColumnKind::DateTime
                | ColumnKind::Timestamp
                | ColumnKind::Time
        )
    }

    pub fn max_length(&self) -> Option<u32> {
        match self {
            ColumnKind::String { length } | ColumnKind::Char { length } => Some(*length),
            _ => None,
        }
    }

    /// Declared `(precision, scale)` of a decimal column.
    pub fn numeric_shape(&self) -> Option<(u32, u32)> {
        match self {
            ColumnKind::Decimal { precision, scale } => Some((*precision, *scale)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Option<Value>,
    pub unique: bool,
    pub index: bool,
    pub crypt: Option<Crypt>,
    pub options: Vec<String>,
    pub rule: Option<ValidationRule>,
    pub(crate) pattern: Option<Regex>,
    pub comment: Option<String>,
    /// Added by the registry (timestamps, soft delete, default primary key) rather than declared.
    pub implicit: bool,
}

impl Column {
    fn from_config(c: &ColumnConfig, implicit: bool) -> Result<Self, ModelError> {
        let kind = ColumnKind::parse(c).ok_or_else(|| {
            ModelError::Parse(format!("column {} has unknown type '{}'", c.name, c.type_))
        })?;
        let pattern = c
            .validation
            .as_ref()
            .and_then(|r| r.pattern.as_deref())
            .map(Regex::new)
            .transpose()
            .map_err(|e| ModelError::Parse(format!("column {} pattern: {}", c.name, e)))?;
        Ok(Column {
            name: c.name.clone(),
            kind,
            nullable: c.nullable,
            default: c.default.clone(),
            unique: c.unique,
            index: c.index,
            crypt: c.crypt.clone(),
            options: c.option.clone(),
            rule: c.validation.clone(),
            pattern,
            comment: c.comment.clone(),
            implicit,
        })
    }

    /// A column whose value is bcrypt-hashed before it is written.
    pub fn is_password(&self) -> bool {
        self.crypt == Some(Crypt::Password) || self.kind == ColumnKind::Password
    }

    pub fn is_required(&self) -> bool {
        self.rule.as_ref().and_then(|r| r.required) == Some(true)
    }
}

/// A loaded model: declared metadata plus the registry derived from it.
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    pub source: String,
    pub meta: MetaData,
    pub columns: HashMap<String, Column>,
    /// Column names in declaration order, implicit columns last.
    pub column_names: Vec<String>,
    pub primary_key: String,
    table: TableSchema,
}

impl Model {
    /// Derive the registry for `meta`. Relations are kept as declared and checked when resolved.
    pub fn resolve(name: &str, source: &str, meta: MetaData) -> Result<Self, ModelError> {
        validate(&meta)?;

        let mut columns = HashMap::new();
        let mut column_names = Vec::new();
        let mut primary_key: Option<String> = None;
        for c in &meta.columns {
            let col = Column::from_config(c, false)?;
            if primary_key.is_none() && col.kind == ColumnKind::Id {
                primary_key = Some(col.name.clone());
            }
            column_names.push(col.name.clone());
            columns.insert(col.name.clone(), col);
        }

        let primary_key = primary_key.unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string());
        let mut implicit = Vec::new();
        if !columns.contains_key(&primary_key) {
            implicit.push(ColumnConfig::implicit(&primary_key, "ID", false));
        }
        if meta.option.timestamps {
            implicit.push(ColumnConfig::implicit(CREATED_AT, "timestamp", true));
            implicit.push(ColumnConfig::implicit(UPDATED_AT, "timestamp", true));
        }
        if meta.option.soft_deletes {
            implicit.push(ColumnConfig::implicit(DELETED_AT, "timestamp", true));
        }
        for c in implicit {
            if columns.contains_key(&c.name) {
                continue;
            }
            let col = Column::from_config(&c, true)?;
            column_names.push(col.name.clone());
            columns.insert(col.name.clone(), col);
        }

        let table = TableSchema {
            name: meta.table.name.clone(),
            primary_key: Some(primary_key.clone()),
            auto_increment: columns
                .get(&primary_key)
                .map(|c| c.kind == ColumnKind::Id)
                .unwrap_or(false),
            columns: column_names.clone(),
            kinds: columns.values().map(|c| (c.name.clone(), c.kind.clone())).collect(),
        };

        Ok(Model {
            name: name.to_string(),
            source: source.to_string(),
            meta,
            columns,
            column_names,
            primary_key,
            table,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.meta.table.name
    }

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Columns in declaration order.
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> {
        self.column_names.iter().filter_map(|n| self.columns.get(n))
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationConfig> {
        &self.meta.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationConfig> {
        self.meta.relations.get(name)
    }

    pub fn soft_deletes(&self) -> bool {
        self.meta.option.soft_deletes
    }

    pub fn timestamps(&self) -> bool {
        self.meta.option.timestamps
    }
}

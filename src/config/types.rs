//! Raw model metadata as declared in a model source document.

use crate::query::QueryDescriptor;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Crypt {
    Password,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub scale: Option<u32>,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub crypt: Option<Crypt>,
    /// Allowed values for `enum` columns.
    #[serde(default)]
    pub option: Vec<String>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

impl ColumnConfig {
    pub(crate) fn implicit(name: &str, type_: &str, nullable: bool) -> Self {
        ColumnConfig {
            name: name.to_string(),
            type_: type_.to_string(),
            label: None,
            comment: None,
            length: None,
            precision: None,
            scale: None,
            nullable,
            default: None,
            unique: false,
            index: false,
            crypt: None,
            option: Vec::new(),
            validation: None,
        }
    }
}

/// Cardinality of a declared relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    #[serde(alias = "hasOne")]
    OneToOne,
    #[serde(alias = "hasMany")]
    OneToMany,
    #[serde(alias = "belongsToMany", alias = "hasManyThrough")]
    ManyToMany,
}

/// Join table for a many-to-many relation. `local_key` references the parent's
/// local key, `foreign_key` references the related model's foreign key.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PivotConfig {
    pub table: String,
    #[serde(default)]
    pub local_key: String,
    #[serde(default)]
    pub foreign_key: String,
    /// Pivot columns copied onto each related row. Empty means every non-key pivot column.
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub model: String,
    /// Column on the declaring model.
    pub local_key: String,
    /// Column on the related model.
    pub foreign_key: String,
    #[serde(default)]
    pub pivot: Option<PivotConfig>,
    /// Sub-query applied when an eager-load names this relation without its own query.
    #[serde(default)]
    pub query: Option<QueryDescriptor>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelOption {
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub soft_deletes: bool,
}

/// Everything a model source declares.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetaData {
    #[serde(default)]
    pub name: String,
    pub table: TableConfig,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationConfig>,
    #[serde(default)]
    pub option: ModelOption,
}

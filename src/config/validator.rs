//! Structural checks on declared metadata, run before a model is resolved.

use crate::config::MetaData;
use crate::error::ModelError;
use std::collections::HashSet;

pub fn validate(meta: &MetaData) -> Result<(), ModelError> {
    if meta.table.name.trim().is_empty() {
        return Err(ModelError::Parse("table.name is required".into()));
    }

    let mut names = HashSet::new();
    for c in &meta.columns {
        if c.name.trim().is_empty() {
            return Err(ModelError::Parse(format!(
                "table {}: column without a name",
                meta.table.name
            )));
        }
        if !names.insert(c.name.as_str()) {
            return Err(ModelError::Parse(format!(
                "table {}: duplicate column {}",
                meta.table.name, c.name
            )));
        }
    }

    Ok(())
}

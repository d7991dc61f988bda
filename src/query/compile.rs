//! Compile a descriptor against a model into store clauses. Every referenced column must exist.

use super::descriptor::{QueryDescriptor, Where, WhereNode};
use crate::config::{Model, DELETED_AT};
use crate::error::{ModelError, Result};
use crate::store::{Clause, Condition, Operator, SelectQuery};

fn check_column(model: &Model, column: &str) -> Result<()> {
    if model.has_column(column) {
        Ok(())
    } else {
        Err(ModelError::UnknownColumn {
            model: model.name.clone(),
            column: column.to_string(),
        })
    }
}

fn compile_nodes(model: &Model, wheres: &[Where]) -> Result<Vec<Clause>> {
    wheres
        .iter()
        .map(|w| {
            let cond = match &w.node {
                WhereNode::Leaf { column, op, value } => {
                    check_column(model, column)?;
                    Condition::Compare {
                        column: column.clone(),
                        op: *op,
                        value: value.clone(),
                    }
                }
                WhereNode::Group { wheres } => Condition::Group(compile_nodes(model, wheres)?),
            };
            Ok(Clause { conj: w.method, cond })
        })
        .collect()
}

/// Filter clauses for `query`, with the soft-delete guard unless trashed rows are requested.
pub fn filter(model: &Model, query: &QueryDescriptor) -> Result<Vec<Clause>> {
    let mut clauses = compile_nodes(model, &query.wheres)?;
    if model.soft_deletes() && !query.with_trashed && model.has_column(DELETED_AT) {
        let guard = Clause::compare(DELETED_AT, Operator::Null, crate::value::Value::Null);
        clauses = if clauses.is_empty() {
            vec![guard]
        } else {
            vec![Clause::and(Condition::Group(clauses)), guard]
        };
    }
    Ok(clauses)
}

/// Full select for `query`. `keys` are appended to an explicit select list when missing,
/// so relation stitching can read them.
pub fn select(model: &Model, query: &QueryDescriptor, keys: &[&str]) -> Result<SelectQuery> {
    let mut columns = Vec::with_capacity(query.select.len());
    for c in &query.select {
        check_column(model, c)?;
        columns.push(c.clone());
    }
    if !columns.is_empty() {
        for k in keys {
            if !columns.iter().any(|c| c == k) {
                columns.push(k.to_string());
            }
        }
    }
    let mut orders = Vec::with_capacity(query.orders.len());
    for o in &query.orders {
        check_column(model, &o.column)?;
        orders.push((o.column.clone(), o.direction));
    }
    Ok(SelectQuery {
        columns,
        filter: filter(model, query)?,
        orders,
        limit: query.limit,
        offset: query.offset,
    })
}

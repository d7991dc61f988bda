//! Query resolution: run the base query, then resolve each eager-load and stitch the
//! related rows onto their parents by key. Nested loads recurse through the same path.

use super::compile;
use super::descriptor::{QueryDescriptor, Where, With};
use super::page::{Paginated, DEFAULT_PAGE_SIZE};
use crate::config::{Model, RelationConfig, RelationKind};
use crate::error::{ModelError, Result};
use crate::state::AppState;
use crate::store::{Clause, Operator, SelectQuery, TableSchema};
use crate::value::{Record, Value};
use async_recursion::async_recursion;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Relations visited on the current resolution path, as (model, relation) pairs.
type Chain = Vec<(String, String)>;

/// Resolves descriptors against the models and store held by an `AppState`.
/// Holds nothing between calls; concurrent stacks over one state are independent.
#[derive(Clone, Copy)]
pub struct QueryStack<'a> {
    state: &'a AppState,
}

impl<'a> QueryStack<'a> {
    pub fn new(state: &'a AppState) -> Self {
        QueryStack { state }
    }

    fn model_for(&self, query: &QueryDescriptor) -> Result<Arc<Model>> {
        let name = query
            .model
            .as_deref()
            .ok_or_else(|| ModelError::Parse("query descriptor names no model".into()))?;
        self.state.model(name)
    }

    /// Run `query` against the model it names.
    pub async fn run(&self, query: &QueryDescriptor) -> Result<Vec<Record>> {
        let model = self.model_for(query)?;
        self.run_on(model, query).await
    }

    pub async fn run_on(&self, model: Arc<Model>, query: &QueryDescriptor) -> Result<Vec<Record>> {
        self.resolve(model, query, Vec::new()).await
    }

    pub async fn count(&self, query: &QueryDescriptor) -> Result<u64> {
        let model = self.model_for(query)?;
        self.count_on(&model, query).await
    }

    pub async fn count_on(&self, model: &Model, query: &QueryDescriptor) -> Result<u64> {
        let filter = compile::filter(model, query)?;
        Ok(self.state.store.count(model.table(), &filter).await?)
    }

    pub async fn paginate(&self, query: &QueryDescriptor, page: u64, page_size: u64) -> Result<Paginated> {
        let model = self.model_for(query)?;
        self.paginate_on(model, query, page, page_size).await
    }

    /// Page numbers start at 1; a page size of 0 uses the default.
    pub async fn paginate_on(
        &self,
        model: Arc<Model>,
        query: &QueryDescriptor,
        page: u64,
        page_size: u64,
    ) -> Result<Paginated> {
        let page = page.max(1);
        let size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        let total = self.count_on(&model, query).await?;
        // A window starting past the last row (or past u64::MAX) is empty.
        let data = match (page - 1).checked_mul(size) {
            Some(offset) if offset < total => {
                let mut window = query.clone();
                window.limit = Some(size);
                window.offset = Some(offset);
                self.run_on(model, &window).await?
            }
            _ => Vec::new(),
        };
        Ok(Paginated::new(total, page, size, data))
    }

    #[async_recursion]
    async fn resolve(&self, model: Arc<Model>, query: &QueryDescriptor, chain: Chain) -> Result<Vec<Record>> {
        let keys: Vec<&str> = query
            .withs
            .iter()
            .filter_map(|(name, with)| model.relation(relation_name(name, with)))
            .map(|r| r.local_key.as_str())
            .collect();
        let select = compile::select(&model, query, &keys)?;
        let mut rows = self.state.store.select(model.table(), &select).await?;
        for (name, with) in &query.withs {
            self.attach(&model, &mut rows, name, with, &chain).await?;
        }
        Ok(rows)
    }

    async fn attach(
        &self,
        model: &Model,
        rows: &mut [Record],
        name: &str,
        with: &With,
        chain: &Chain,
    ) -> Result<()> {
        if model.has_column(name) {
            return Err(ModelError::Schema(format!(
                "eager-load {} collides with column {}.{}",
                name, model.name, name
            )));
        }
        let rel_name = relation_name(name, with);
        let Some(rel) = model.relation(rel_name) else {
            tracing::debug!(model = %model.name, relation = %rel_name, "eager-load names no declared relation; ignored");
            return Ok(());
        };

        let link = (model.name.clone(), rel_name.to_string());
        if chain.contains(&link) {
            let mut path: Vec<String> = chain.iter().map(|(m, r)| format!("{}.{}", m, r)).collect();
            path.push(format!("{}.{}", link.0, link.1));
            return Err(ModelError::RelationCycle { chain: path });
        }
        let mut chain = chain.clone();
        chain.push(link);

        let related = self.state.registry.get(&rel.model).ok_or_else(|| {
            ModelError::Schema(format!(
                "relation {}.{} references unknown model {}",
                model.name, rel_name, rel.model
            ))
        })?;
        require_column(model, &rel.local_key, rel_name)?;
        require_column(&related, &rel.foreign_key, rel_name)?;

        let base = with
            .query
            .clone()
            .or_else(|| rel.query.clone())
            .unwrap_or_default();
        let parent_keys = distinct(rows.iter().filter_map(|r| r.get(&rel.local_key)));

        match rel.kind {
            RelationKind::OneToOne | RelationKind::OneToMany => {
                let children = if parent_keys.is_empty() {
                    Vec::new()
                } else {
                    let q = derived(&related, base, &rel.foreign_key, parent_keys);
                    self.resolve(related.clone(), &q, chain).await?
                };
                let mut by_key: HashMap<String, Vec<Record>> = HashMap::new();
                for child in children {
                    if let Some(k) = child.get(&rel.foreign_key).and_then(Value::key) {
                        by_key.entry(k).or_default().push(child);
                    }
                }
                for row in rows.iter_mut() {
                    let matches = row
                        .get(&rel.local_key)
                        .and_then(Value::key)
                        .and_then(|k| by_key.get(&k));
                    if rel.kind == RelationKind::OneToOne {
                        if let Some(first) = matches.and_then(|m| m.first()) {
                            row.insert(name, Value::Map(first.clone()));
                        }
                    } else {
                        let list = matches
                            .map(|m| m.iter().cloned().map(Value::Map).collect())
                            .unwrap_or_default();
                        row.insert(name, Value::List(list));
                    }
                }
            }
            RelationKind::ManyToMany => {
                let (pivot_table, pivot_local, pivot_foreign, inline) = pivot_of(model, rel_name, rel)?;
                let links = if parent_keys.is_empty() {
                    Vec::new()
                } else {
                    let select = SelectQuery {
                        filter: vec![Clause::compare(pivot_local, Operator::In, parent_keys)],
                        ..Default::default()
                    };
                    self.state.store.select(&TableSchema::untyped(pivot_table), &select).await?
                };
                let related_keys = distinct(links.iter().filter_map(|l| l.get(pivot_foreign)));
                let children = if related_keys.is_empty() {
                    Vec::new()
                } else {
                    let q = derived(&related, base, &rel.foreign_key, related_keys);
                    self.resolve(related.clone(), &q, chain).await?
                };
                let mut by_key: HashMap<String, Vec<Record>> = HashMap::new();
                for child in children {
                    if let Some(k) = child.get(&rel.foreign_key).and_then(Value::key) {
                        by_key.entry(k).or_default().push(child);
                    }
                }
                for row in rows.iter_mut() {
                    let Some(parent) = row.get(&rel.local_key).and_then(Value::key) else {
                        row.insert(name, Value::List(Vec::new()));
                        continue;
                    };
                    let mut list = Vec::new();
                    for link in links
                        .iter()
                        .filter(|l| l.get(pivot_local).and_then(Value::key).as_deref() == Some(parent.as_str()))
                    {
                        let Some(children) = link.get(pivot_foreign).and_then(Value::key).and_then(|k| by_key.get(&k)) else {
                            continue;
                        };
                        for child in children {
                            let mut child = child.clone();
                            inline_pivot_columns(&mut child, link, pivot_local, pivot_foreign, inline);
                            list.push(Value::Map(child));
                        }
                    }
                    row.insert(name, Value::List(list));
                }
            }
        }
        Ok(())
    }
}

fn relation_name<'w>(name: &'w str, with: &'w With) -> &'w str {
    with.relation.as_deref().unwrap_or(name)
}

fn require_column(model: &Model, column: &str, relation: &str) -> Result<()> {
    if model.has_column(column) {
        Ok(())
    } else {
        Err(ModelError::Schema(format!(
            "relation {} needs column {}.{}",
            relation, model.name, column
        )))
    }
}

/// Stitch key values, first occurrence order, without duplicates or nulls.
fn distinct<'v>(values: impl Iterator<Item = &'v Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .filter(|v| v.key().map(|k| seen.insert(k)).unwrap_or(false))
        .cloned()
        .collect()
}

/// Child descriptor: `foreign IN keys`, ANDed with whatever filter the caller supplied.
fn derived(related: &Model, base: QueryDescriptor, foreign_key: &str, keys: Vec<Value>) -> QueryDescriptor {
    let mut q = base;
    q.model = Some(related.name.clone());
    let mut wheres = vec![Where::leaf(foreign_key, Operator::In, keys)];
    if !q.wheres.is_empty() {
        wheres.push(Where::group(std::mem::take(&mut q.wheres)));
    }
    q.wheres = wheres;
    if !q.select.is_empty() && !q.select.iter().any(|c| c == foreign_key) {
        q.select.push(foreign_key.to_string());
    }
    q
}

fn pivot_of<'r>(model: &Model, rel_name: &str, rel: &'r RelationConfig) -> Result<(&'r str, &'r str, &'r str, &'r [String])> {
    let missing = |what: &str| {
        ModelError::Schema(format!(
            "many-to-many relation {}.{} has no {}",
            model.name, rel_name, what
        ))
    };
    let pivot = rel.pivot.as_ref().ok_or_else(|| missing("pivot"))?;
    if pivot.table.is_empty() {
        return Err(missing("pivot table"));
    }
    if pivot.local_key.is_empty() || pivot.foreign_key.is_empty() {
        return Err(missing("pivot keys"));
    }
    Ok((
        pivot.table.as_str(),
        pivot.local_key.as_str(),
        pivot.foreign_key.as_str(),
        pivot.columns.as_slice(),
    ))
}

/// Copy pivot columns onto a related row. With no declared list, every pivot column
/// other than the two keys is copied unless the row already has it.
fn inline_pivot_columns(child: &mut Record, link: &Record, local: &str, foreign: &str, declared: &[String]) {
    if declared.is_empty() {
        for (k, v) in link {
            if k != local && k != foreign && !child.contains_key(k) {
                child.insert(k.clone(), v.clone());
            }
        }
    } else {
        for k in declared {
            child.insert(k.clone(), link.get(k).cloned().unwrap_or(Value::Null));
        }
    }
}

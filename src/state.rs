//! Application context: the model registry and the store every model operation goes through.

use crate::config::{load_model, Model};
use crate::error::{ModelError, Result};
use crate::query::QueryStack;
use crate::service::ModelHandle;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Loaded models by name. Entries are immutable snapshots; reload swaps in a new one.
#[derive(Debug, Default)]
pub struct Registry {
    models: RwLock<HashMap<String, Arc<Model>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Publish `model`, replacing any entry with the same name.
    pub fn register(&self, model: Model) -> Arc<Model> {
        let model = Arc::new(model);
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.insert(model.name.clone(), model.clone());
        model
    }

    /// Load from `source` (`file://path` or inline text) and register under `name`.
    pub async fn load(&self, source: &str, name: &str) -> Result<Arc<Model>> {
        let model = load_model(source, name).await?;
        tracing::info!(model = %name, table = %model.table_name(), columns = model.column_names.len(), "model loaded");
        Ok(self.register(model))
    }

    /// Re-read a model from the source it was loaded from. The old entry stays visible
    /// until the new one is fully built; on failure it is kept.
    pub async fn reload(&self, name: &str) -> Result<Arc<Model>> {
        let current = self.get(name).ok_or_else(|| ModelError::ModelNotLoaded(name.to_string()))?;
        let model = load_model(&current.source, name).await?;
        tracing::info!(model = %name, "model reloaded");
        Ok(self.register(model))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Model>> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        models.get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Model>> {
        let mut models = self.models.write().unwrap_or_else(|e| e.into_inner());
        models.remove(name)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> Vec<String> {
        let models = self.models.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = models.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    /// bcrypt cost for password columns.
    pub hash_cost: u32,
}

impl AppState {
    pub fn new(store: impl Store + 'static) -> Self {
        AppState {
            store: Arc::new(store),
            registry: Arc::new(Registry::new()),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.registry
            .get(name)
            .ok_or_else(|| ModelError::ModelNotLoaded(name.to_string()))
    }

    /// Handle for operating on one model.
    pub fn select(&self, name: &str) -> Result<ModelHandle> {
        Ok(ModelHandle::new(self.clone(), self.model(name)?))
    }

    pub fn query(&self) -> QueryStack<'_> {
        QueryStack::new(self)
    }
}

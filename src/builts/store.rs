use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ast::{BuiltKind, CompiledExpression};
use crate::instance::Dataset;
use crate::registry_context::RegistryContext;
use crate::{EngineError, EngineResult};

/// JSON definition of a built block, as exported and re-imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cmd: String,
}

/// Common surface of attributes and groups.
pub trait Built: Send + Sync + Sized {
    const KIND: BuiltKind;

    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn expression(&self) -> &CompiledExpression;
    fn test_size(&self) -> usize;

    /// Rebuilds and registers a block from its definition.
    fn recreate(
        definition: &BuiltDefinition,
        dataset: &Dataset,
        ctx: &RegistryContext,
    ) -> EngineResult<Arc<Self>>;

    fn definition(&self) -> BuiltDefinition {
        BuiltDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            cmd: self.expression().cmd.clone(),
        }
    }
}

#[derive(Debug)]
pub struct BuiltStore<T> {
    items: DashMap<String, Arc<T>>,
}

impl<T> Default for BuiltStore<T> {
    fn default() -> Self {
        Self {
            items: DashMap::new(),
        }
    }
}

impl<T: Built> BuiltStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `item` under its name, returning the block it replaced.
    pub fn save(&self, item: Arc<T>) -> Option<Arc<T>> {
        let name = item.name().to_string();
        let previous = self.items.insert(name.clone(), item);
        if previous.is_some() {
            tracing::warn!("{}:{} overwritten", T::KIND, name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> EngineResult<Arc<T>> {
        self.lookup(name).ok_or_else(|| {
            EngineError::configuration(format!("{}:{} is not registered", T::KIND, name))
        })
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<T>> {
        self.items.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.items.remove(name).map(|(_, item)| item)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.items.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A registered block with a structurally equal expression, computed on
    /// at least `min_test_size` instances.
    pub fn find_equivalent(
        &self,
        expression: &CompiledExpression,
        min_test_size: usize,
    ) -> Option<Arc<T>> {
        self.items
            .iter()
            .find(|entry| {
                let item = entry.value();
                item.test_size() >= min_test_size && item.expression().equivalent(expression)
            })
            .map(|entry| entry.value().clone())
    }

    /// Whether `name` must be recomputed when `switch` (`model` or `rewrite`)
    /// changes. Unknown names and switches read false.
    pub fn should_recompute(&self, name: &str, switch: &str) -> bool {
        self.lookup(name)
            .map(|item| item.expression().deps.depends_on(switch))
            .unwrap_or(false)
    }

    pub fn definitions(&self) -> Vec<BuiltDefinition> {
        let mut definitions: Vec<BuiltDefinition> =
            self.items.iter().map(|e| e.value().definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn export_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(&self.definitions())?)
    }

    /// Recreates every definition in `json`, in order, through `create`.
    pub fn import_json(
        &self,
        json: &str,
        dataset: &Dataset,
        ctx: &RegistryContext,
    ) -> EngineResult<Vec<Arc<T>>> {
        let definitions: Vec<BuiltDefinition> = serde_json::from_str(json)?;
        tracing::info!("importing {} {} definitions", definitions.len(), T::KIND);
        definitions
            .iter()
            .map(|definition| T::recreate(definition, dataset, ctx))
            .collect()
    }
}

//! The registries every evaluation reads: functions, built blocks, ambient
//! model and rewrite selection, frequency tables and compiled patterns.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use lazy_static::lazy_static;

use crate::builts::{Attribute, BuiltStore, Group};
use crate::config::EngineConfig;
use crate::error::ValueError;
use crate::function_registry::{FunctionRegistry, TokenPattern};
use crate::instance::{Dataset, UNREWRITTEN_RID};

lazy_static! {
    static ref GLOBAL: RegistryContext = RegistryContext::default();
}

#[derive(Debug)]
pub struct RegistryContext {
    pub config: EngineConfig,
    pub functions: FunctionRegistry,
    pub attributes: BuiltStore<Attribute>,
    pub groups: BuiltStore<Group>,
    default_model: RwLock<Option<String>>,
    selected_rewrite: RwLock<String>,
    frequencies: DashMap<String, Arc<HashMap<String, u64>>>,
    patterns: DashMap<String, Arc<TokenPattern>>,
}

impl Default for RegistryContext {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RegistryContext {
    pub fn new(config: EngineConfig) -> Self {
        let functions = FunctionRegistry::with_builtins(&config.entry_names);
        let selected_rewrite = config
            .selected_rewrite
            .clone()
            .unwrap_or_else(|| UNREWRITTEN_RID.to_string());
        Self {
            default_model: RwLock::new(config.default_model.clone()),
            selected_rewrite: RwLock::new(selected_rewrite),
            functions,
            attributes: BuiltStore::new(),
            groups: BuiltStore::new(),
            frequencies: DashMap::new(),
            patterns: DashMap::new(),
            config,
        }
    }

    /// Process-wide context for outer entry points.
    pub fn global() -> &'static RegistryContext {
        &GLOBAL
    }

    pub fn default_model(&self) -> Option<String> {
        self.default_model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_default_model(&self, model: Option<String>) {
        tracing::debug!("default model: {:?}", model);
        *self
            .default_model
            .write()
            .unwrap_or_else(PoisonError::into_inner) = model;
    }

    pub fn selected_rewrite(&self) -> String {
        self.selected_rewrite
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_selected_rewrite<S: Into<String>>(&self, rid: S) {
        let rid = rid.into();
        tracing::debug!("selected rewrite: {}", rid);
        *self
            .selected_rewrite
            .write()
            .unwrap_or_else(PoisonError::into_inner) = rid;
    }

    pub fn frequencies(&self, target_type: &str) -> Option<Arc<HashMap<String, u64>>> {
        self.frequencies
            .get(target_type)
            .map(|entry| entry.value().clone())
    }

    pub fn set_frequencies(&self, target_type: &str, table: HashMap<String, u64>) {
        self.frequencies
            .insert(target_type.to_string(), Arc::new(table));
    }

    /// Installs the training frequency tables shipped with a dataset.
    pub fn load_frequencies(&self, dataset: &Dataset) {
        for (target_type, table) in dataset.frequencies() {
            self.set_frequencies(
                target_type,
                table.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            );
        }
    }

    /// Compiled pattern for `text`, compiled once per distinct text.
    pub fn pattern(&self, text: &str) -> Result<Arc<TokenPattern>, ValueError> {
        if let Some(cached) = self.patterns.get(text) {
            return Ok(cached.value().clone());
        }
        let compiled = Arc::new(TokenPattern::compile(text)?);
        tracing::debug!("compiled pattern [ {} ]", text);
        Ok(self
            .patterns
            .entry(text.to_string())
            .or_insert(compiled)
            .value()
            .clone())
    }

    pub fn cached_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Names of the attributes and groups that must be recomputed when the
    /// given switch (`model` or `rewrite`) changes.
    pub fn objects_to_recompute(&self, switch: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .attributes
            .names()
            .into_iter()
            .filter(|name| self.attributes.should_recompute(name, switch))
            .map(|name| format!("attr:{}", name))
            .collect();
        names.extend(
            self.groups
                .names()
                .into_iter()
                .filter(|name| self.groups.should_recompute(name, switch))
                .map(|name| format!("group:{}", name)),
        );
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switches() {
        let ctx = RegistryContext::default();
        assert_eq!(ctx.default_model(), None);
        assert_eq!(ctx.selected_rewrite(), UNREWRITTEN_RID);
        ctx.set_default_model(Some("bert".to_string()));
        ctx.set_selected_rewrite("add_not");
        assert_eq!(ctx.default_model().as_deref(), Some("bert"));
        assert_eq!(ctx.selected_rewrite(), "add_not");
    }

    #[test]
    fn test_pattern_cache() {
        let ctx = RegistryContext::default();
        let first = ctx.pattern("what NOUN").unwrap();
        let second = ctx.pattern("what NOUN").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.cached_patterns(), 1);
        assert!(ctx.pattern("(").is_err());
        assert_eq!(ctx.cached_patterns(), 1);
    }

    #[test]
    fn test_config_seeds_switches() {
        let config = EngineConfig {
            default_model: Some("bidaf".to_string()),
            selected_rewrite: Some("swap".to_string()),
            ..EngineConfig::default()
        };
        let ctx = RegistryContext::new(config);
        assert_eq!(ctx.default_model().as_deref(), Some("bidaf"));
        assert_eq!(ctx.selected_rewrite(), "swap");
    }
}

//! Registry of the primitive functions callable from expressions.
//!
//! Each function declares its signature when registered. From that signature
//! and the configured entry names the registry derives, once, how every
//! parameter gets its value at call time (see [`ParamBinding`]). Aliases are
//! first-class entries that point at a base function and pin one keyword.

mod binding;
pub mod builtins;
mod pattern;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ValueError;
use crate::eval::Value;
use crate::registry_context::RegistryContext;

pub use binding::{bind_arguments, BoundArgs};
pub use pattern::{PatternAtom, TokenPattern};

/// Native implementation of a primitive function.
pub type NativeFn = fn(&BoundArgs, &CallEnv) -> Result<Value, ValueError>;

/// Ambient state a primitive function may read.
pub struct CallEnv<'a> {
    pub registry: &'a RegistryContext,
}

impl<'a> CallEnv<'a> {
    pub fn new(registry: &'a RegistryContext) -> Self {
        Self { registry }
    }

    /// Resolves the `ANCHOR` sentinel to the default model.
    pub fn resolve_model(&self, model: &str) -> Option<String> {
        if model == crate::ast::ANCHOR {
            self.registry.default_model()
        } else {
            Some(model.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<Value>,
    /// Entry used when the caller leaves the parameter out
    pub fallback_entry: Option<String>,
}

impl ParamSpec {
    pub fn required(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
            fallback_entry: None,
        }
    }

    pub fn optional<V: Into<Value>>(name: &str, default: V) -> Self {
        Self {
            name: name.to_string(),
            default: Some(default.into()),
            fallback_entry: None,
        }
    }

    pub fn fallback(name: &str, entry: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
            fallback_entry: Some(entry.to_string()),
        }
    }
}

/// How a parameter is filled when the function is called.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamBinding {
    /// Named like an entry: filled from the live instance, never positionally.
    Entry(String),
    /// Filled positionally or by keyword, else from the entry.
    Fallback(String),
    /// Must be supplied or defaulted.
    Literal,
}

pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub func: NativeFn,
}

impl FunctionDef {
    pub fn new(name: &str, params: Vec<ParamSpec>, func: NativeFn) -> Self {
        Self {
            name: name.to_string(),
            params,
            func,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    /// Base function name for aliases
    pub base: Option<String>,
    params: Vec<ParamSpec>,
    fixed: Vec<(String, Value)>,
    bindings: HashMap<String, ParamBinding>,
    func: NativeFn,
}

impl FunctionDescriptor {
    fn new(
        name: String,
        params: Vec<ParamSpec>,
        func: NativeFn,
        entries: &HashSet<String>,
    ) -> Self {
        let bindings = params
            .iter()
            .map(|p| {
                let binding = if entries.contains(&p.name) {
                    ParamBinding::Entry(p.name.clone())
                } else if let Some(entry) = &p.fallback_entry {
                    ParamBinding::Fallback(entry.clone())
                } else {
                    ParamBinding::Literal
                };
                (p.name.clone(), binding)
            })
            .collect();
        Self {
            name,
            base: None,
            params,
            fixed: Vec::new(),
            bindings,
            func,
        }
    }

    /// Parameters a caller can supply; alias-pinned ones are hidden.
    pub fn visible_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params
            .iter()
            .filter(|p| !self.fixed.iter().any(|(name, _)| *name == p.name))
    }

    pub fn binding(&self, param: &str) -> Option<&ParamBinding> {
        self.bindings.get(param)
    }

    pub fn fixed(&self) -> &[(String, Value)] {
        &self.fixed
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn call(&self, args: &BoundArgs, env: &CallEnv) -> Result<Value, ValueError> {
        (self.func)(args, env)
    }

    /// Signature as shown to callers: entry-bound parameters are left out,
    /// optional ones render as `name=default`.
    pub fn signature(&self) -> Vec<String> {
        self.visible_params()
            .filter(|p| !matches!(self.binding(&p.name), Some(ParamBinding::Entry(_))))
            .map(|p| match &p.default {
                None => p.name.clone(),
                Some(Value::Str(s)) => format!("{}=\"{}\"", p.name, s),
                Some(default) => format!("{}={}", p.name, default),
            })
            .collect()
    }
}

/// Name to descriptor lookup, shared across threads.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: DashMap<String, Arc<FunctionDescriptor>>,
    entry_names: HashSet<String>,
}

impl FunctionRegistry {
    /// Empty registry. `entry_names` are the instance entries parameters
    /// auto-bind to; `prediction` and `groundtruth` are always included.
    pub fn new(entry_names: &[String]) -> Self {
        let mut names: HashSet<String> = entry_names.iter().cloned().collect();
        names.insert("prediction".to_string());
        names.insert("groundtruth".to_string());
        Self {
            functions: DashMap::new(),
            entry_names: names,
        }
    }

    /// Registry populated with the built-in catalogue.
    pub fn with_builtins(entry_names: &[String]) -> Self {
        let registry = Self::new(entry_names);
        builtins::register_all(&registry);
        registry
    }

    pub fn is_entry(&self, name: &str) -> bool {
        self.entry_names.contains(name)
    }

    /// Registers `def` under `name`, or under its own name when `None`.
    pub fn register(&self, name: Option<&str>, def: FunctionDef) {
        let name = name.unwrap_or(&def.name).to_string();
        tracing::debug!("register function: {}", name);
        let descriptor =
            FunctionDescriptor::new(name.clone(), def.params, def.func, &self.entry_names);
        self.functions.insert(name, Arc::new(descriptor));
    }

    pub fn get(&self, name: &str) -> Result<Arc<FunctionDescriptor>, ValueError> {
        self.functions
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ValueError::UnknownFunction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registers `new_name` as `base` with keyword `fixed.0` pinned to `fixed.1`.
    pub fn alias(
        &self,
        base: &str,
        new_name: &str,
        fixed: (&str, Value),
    ) -> Result<(), ValueError> {
        let base_descriptor = self.get(base)?;
        let (param, value) = fixed;
        if base_descriptor.param(param).is_none() {
            return Err(ValueError::invalid(
                base,
                format!("cannot alias unknown parameter [ {} ]", param),
            ));
        }
        let mut descriptor = (*base_descriptor).clone();
        descriptor.name = new_name.to_string();
        descriptor.base = Some(base_descriptor.base.clone().unwrap_or_else(|| base.to_string()));
        descriptor.fixed.retain(|(name, _)| name != param);
        descriptor.fixed.push((param.to_string(), value));
        tracing::debug!("register alias: {} -> {} ({})", new_name, base, param);
        self.functions
            .insert(new_name.to_string(), Arc::new(descriptor));
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Introspection catalogue: function name to its caller-facing signature.
    pub fn signatures(&self) -> BTreeMap<String, Vec<String>> {
        self.functions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().signature()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
        Ok(args.get("metric").clone())
    }

    fn registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new(&["predictions".to_string()]);
        registry.register(
            None,
            FunctionDef::new(
                "score",
                vec![
                    ParamSpec::optional("model", "ANCHOR"),
                    ParamSpec::required("predictions"),
                    ParamSpec::required("metric"),
                ],
                echo,
            ),
        );
        registry
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            registry().get("missing").unwrap_err(),
            ValueError::UnknownFunction("missing".to_string())
        );
    }

    #[test]
    fn test_static_bindings() {
        let registry = registry();
        let score = registry.get("score").unwrap();
        assert_eq!(
            score.binding("predictions"),
            Some(&ParamBinding::Entry("predictions".to_string()))
        );
        assert_eq!(score.binding("metric"), Some(&ParamBinding::Literal));
    }

    #[test]
    fn test_alias_hides_fixed_param() {
        let registry = registry();
        registry
            .alias("score", "f1", ("metric", Value::from("f1")))
            .unwrap();
        let f1 = registry.get("f1").unwrap();
        assert_eq!(f1.base.as_deref(), Some("score"));
        assert_eq!(f1.signature(), vec!["model=\"ANCHOR\"".to_string()]);
        assert_eq!(
            registry.signatures()["score"],
            vec!["model=\"ANCHOR\"".to_string(), "metric".to_string()]
        );
    }

    #[test]
    fn test_alias_errors() {
        let registry = registry();
        assert!(matches!(
            registry.alias("nope", "x", ("metric", Value::Null)),
            Err(ValueError::UnknownFunction(_))
        ));
        assert!(matches!(
            registry.alias("score", "x", ("unknown", Value::Null)),
            Err(ValueError::InvalidArgument { .. })
        ));
    }
}

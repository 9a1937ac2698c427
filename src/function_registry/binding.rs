use std::collections::HashMap;

use crate::error::ValueError;
use crate::eval::Value;

use super::{FunctionDescriptor, ParamBinding};

static NULL: Value = Value::Null;

/// Argument values after binding, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    function: String,
    values: HashMap<String, Value>,
}

impl BoundArgs {
    pub fn new<S: Into<String>>(function: S) -> Self {
        Self {
            function: function.into(),
            values: HashMap::new(),
        }
    }

    pub fn with<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Bound value; parameters bound to nothing read as null.
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    pub fn str(&self, name: &str) -> Result<&str, ValueError> {
        self.get(name).as_str().ok_or_else(|| {
            ValueError::invalid(&self.function, format!("[ {} ] must be a string", name))
        })
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).as_str()
    }

    pub fn number(&self, name: &str) -> Result<f64, ValueError> {
        self.get(name).as_number().ok_or_else(|| {
            ValueError::invalid(&self.function, format!("[ {} ] must be a number", name))
        })
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).truthy()
    }

    pub fn invalid<M: Into<String>>(&self, message: M) -> ValueError {
        ValueError::invalid(&self.function, message)
    }
}

/// Binds evaluated call arguments to the parameters of `descriptor`.
///
/// Order of precedence: alias-pinned keywords, then entry-named parameters
/// the instance provides, then positional arguments over the remaining
/// non-entry parameters, then keywords, then fallback entries, then
/// defaults. Returns whether any value came from the instance.
pub fn bind_arguments(
    descriptor: &FunctionDescriptor,
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
    entry: &dyn Fn(&str) -> Option<Value>,
) -> Result<(BoundArgs, bool), ValueError> {
    let function = descriptor.name.as_str();
    let mut bound = BoundArgs::new(function);
    let mut auto_bound = false;

    for (name, value) in descriptor.fixed() {
        bound.values.insert(name.clone(), value.clone());
    }

    for param in descriptor.visible_params() {
        if let Some(ParamBinding::Entry(name)) = descriptor.binding(&param.name) {
            if let Some(value) = entry(name) {
                bound.values.insert(param.name.clone(), value);
                auto_bound = true;
            }
        }
    }

    let mut slots = descriptor
        .visible_params()
        .filter(|p| !matches!(descriptor.binding(&p.name), Some(ParamBinding::Entry(_))));
    let mut positional_names = Vec::new();
    for value in positional {
        let param = slots.next().ok_or_else(|| {
            ValueError::invalid(function, "too many positional arguments")
        })?;
        positional_names.push(param.name.clone());
        bound.values.insert(param.name.clone(), value);
    }

    for (name, value) in named {
        if descriptor.visible_params().all(|p| p.name != name) {
            return Err(ValueError::invalid(
                function,
                format!("unexpected keyword [ {} ]", name),
            ));
        }
        if positional_names.contains(&name) {
            return Err(ValueError::invalid(
                function,
                format!("multiple values for [ {} ]", name),
            ));
        }
        bound.values.entry(name).or_insert(value);
    }

    for param in descriptor.visible_params() {
        if bound.values.contains_key(&param.name) {
            continue;
        }
        if let Some(ParamBinding::Fallback(name)) = descriptor.binding(&param.name) {
            if let Some(value) = entry(name) {
                bound.values.insert(param.name.clone(), value);
                auto_bound = true;
                continue;
            }
        }
        match &param.default {
            Some(default) => {
                bound.values.insert(param.name.clone(), default.clone());
            }
            None => {
                return Err(ValueError::MissingArgument {
                    function: function.to_string(),
                    param: param.name.clone(),
                })
            }
        }
    }

    Ok((bound, auto_bound))
}

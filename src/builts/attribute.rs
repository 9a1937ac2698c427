use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ast::{BuiltKind, CompiledExpression};
use crate::config::EngineConfig;
use crate::eval::{test_instances, Value};
use crate::instance::{Dataset, InstanceKey};
use crate::registry_context::RegistryContext;
use crate::{EngineError, EngineResult};

use super::stats::{digitize, format_edge, percentile, quartile_range, sorted_numbers, value_counts};
use super::store::{Built, BuiltDefinition};
use super::CreateOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dtype {
    Continuous,
    Categorical,
}

/// `[value, n]` pairs split by the default model's correctness.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValueCounts {
    pub correct: Vec<(Value, usize)>,
    pub incorrect: Vec<(Value, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeRecord {
    pub name: String,
    pub description: String,
    pub cmd: String,
    pub domain: Vec<Value>,
    pub dtype: Dtype,
    pub counts: ValueCounts,
}

/// One value per instance, computed from a DSL expression.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub description: String,
    pub expression: Arc<CompiledExpression>,
    /// Never holds null values.
    pub instance_dict: Arc<BTreeMap<InstanceKey, Value>>,
    pub dtype: Dtype,
    pub test_size: usize,
}

impl Attribute {
    /// Compiles `cmd`, evaluates it on a sample of `dataset` (or reuses an
    /// equivalent registered attribute) and registers the result when
    /// `options.save` is set.
    pub fn create(
        name: &str,
        description: &str,
        cmd: &str,
        dataset: &Dataset,
        ctx: &RegistryContext,
        options: CreateOptions,
    ) -> EngineResult<Arc<Attribute>> {
        if cmd.trim().is_empty() {
            return Err(EngineError::configuration(format!(
                "attr:{} needs a non-empty cmd",
                name
            )));
        }
        let expression = CompiledExpression::compile(cmd, ctx)?;
        let test_size = options.resolved_test_size(dataset, ctx.config.default_test_size);

        let reused = if options.allows_reuse() {
            ctx.attributes.find_equivalent(&expression, test_size)
        } else {
            None
        };
        let attribute = match reused {
            Some(existing) => {
                tracing::info!(
                    "attr:{} reuses the values of attr:{} [ {} ]",
                    name,
                    existing.name,
                    cmd
                );
                Attribute {
                    name: name.to_string(),
                    description: description.to_string(),
                    expression: Arc::new(expression),
                    instance_dict: existing.instance_dict.clone(),
                    dtype: existing.dtype,
                    test_size: existing.test_size,
                }
            }
            None => {
                let sample = options.sample(dataset, test_size, ctx.config.sample_seed);
                let outcome = test_instances(
                    &expression.root,
                    sample,
                    BuiltKind::Attr,
                    ctx,
                    ctx.config.batch_error_policy,
                );
                let instance_dict = outcome.values;
                tracing::info!(
                    "attr:{} created [ {} ] on {} instances",
                    name,
                    cmd,
                    instance_dict.len()
                );
                Attribute {
                    name: name.to_string(),
                    description: description.to_string(),
                    dtype: infer_dtype(instance_dict.values()),
                    expression: Arc::new(expression),
                    instance_dict: Arc::new(instance_dict),
                    test_size,
                }
            }
        };
        let attribute = Arc::new(attribute);
        if options.save {
            ctx.attributes.save(attribute.clone());
        }
        Ok(attribute)
    }

    pub fn get(&self, key: &InstanceKey) -> Option<&Value> {
        self.instance_dict.get(key)
    }

    /// Entries whose qid is in `filter` (all when `None`), lists excluded.
    fn scalar_items<'a>(
        &'a self,
        filter: Option<&'a BTreeSet<String>>,
    ) -> impl Iterator<Item = (&'a InstanceKey, &'a Value)> + 'a {
        self.instance_dict.iter().filter(move |(key, value)| {
            !value.is_null()
                && value.as_list().is_none()
                && filter.map_or(true, |qids| qids.contains(&key.qid))
        })
    }

    /// `[min, max]` when continuous, the sorted distinct values otherwise.
    pub fn domain(&self, filter: Option<&BTreeSet<String>>) -> Vec<Value> {
        match self.dtype {
            Dtype::Continuous => {
                let numbers =
                    sorted_numbers(self.scalar_items(filter).filter_map(|(_, v)| v.as_number()));
                match (numbers.first(), numbers.last()) {
                    (Some(min), Some(max)) => vec![Value::Number(*min), Value::Number(*max)],
                    _ => Vec::new(),
                }
            }
            Dtype::Categorical => {
                let mut values: Vec<Value> =
                    self.scalar_items(filter).map(|(_, v)| v.clone()).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup_by(|a, b| a.total_cmp(b).is_eq());
                values
            }
        }
    }

    /// Whether `value` is unusual among the filtered values: outside the
    /// IQR fence when continuous, rarer than `rare_category_ratio` otherwise.
    pub fn is_outlier(
        &self,
        value: &Value,
        filter: Option<&BTreeSet<String>>,
        config: &EngineConfig,
    ) -> bool {
        if value.is_null() || self.instance_dict.is_empty() {
            return false;
        }
        match self.dtype {
            Dtype::Continuous => {
                let Some(x) = value.as_number() else {
                    return false;
                };
                let numbers =
                    sorted_numbers(self.scalar_items(filter).filter_map(|(_, v)| v.as_number()));
                if numbers.is_empty() {
                    return false;
                }
                let (low, high) = quartile_range(&numbers, config.outlier_iqr_factor);
                x < low || x > high
            }
            Dtype::Categorical => {
                let values: Vec<&Value> = self.scalar_items(filter).map(|(_, v)| v).collect();
                let total = values.len() as f64;
                let count = values
                    .iter()
                    .filter(|v| v.total_cmp(value).is_eq())
                    .count();
                count > 0 && (count as f64) < total * config.rare_category_ratio
            }
        }
    }

    /// Keys whose value is an outlier among the filtered values.
    pub fn outliers(
        &self,
        filter: Option<&BTreeSet<String>>,
        config: &EngineConfig,
    ) -> Vec<InstanceKey> {
        self.scalar_items(filter)
            .filter(|(_, value)| self.is_outlier(value, filter, config))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Bins every value into a label: quantile ranges `[low,high)` when
    /// continuous, the most frequent categories (others as `other`) otherwise.
    pub fn discretize(&self, config: &EngineConfig) -> BTreeMap<InstanceKey, String> {
        match self.dtype {
            Dtype::Continuous => self.discretize_continuous(config.bin_count),
            Dtype::Categorical => self.discretize_categorical(config.top_categories),
        }
    }

    fn discretize_continuous(&self, bin_count: usize) -> BTreeMap<InstanceKey, String> {
        let items: Vec<(&InstanceKey, f64)> = self
            .scalar_items(None)
            .filter_map(|(key, value)| value.as_number().map(|n| (key, n)))
            .collect();
        let numbers = sorted_numbers(items.iter().map(|(_, n)| *n));
        let Some(max) = numbers.last().copied() else {
            return BTreeMap::new();
        };
        let step = ((100.0 / bin_count.max(1) as f64).round() as usize).max(1);
        let mut edges: Vec<f64> = (0..=100)
            .step_by(step)
            .map(|p| percentile(&numbers, p as f64))
            .collect();
        if max > bin_count as f64 {
            edges.iter_mut().for_each(|edge| *edge = edge.floor());
        }
        items
            .into_iter()
            .map(|(key, value)| {
                let bin = digitize(value, &edges);
                let left = bin.saturating_sub(1);
                let right = if bin >= edges.len() { bin - 1 } else { bin };
                let label = format!("[{},{})", format_edge(edges[left]), format_edge(edges[right]));
                (key.clone(), label)
            })
            .collect()
    }

    fn discretize_categorical(&self, top: usize) -> BTreeMap<InstanceKey, String> {
        let kept: Vec<Value> = value_counts(self.instance_dict.values())
            .into_iter()
            .take(top)
            .map(|(value, _)| value)
            .collect();
        self.instance_dict
            .iter()
            .map(|(key, value)| {
                let label = if kept.iter().any(|k| k.total_cmp(value).is_eq()) {
                    value.to_string()
                } else {
                    "other".to_string()
                };
                (key.clone(), label)
            })
            .collect()
    }

    /// Summary for display: domain plus value counts split by whether the
    /// default model got the instance right.
    pub fn serialize(
        &self,
        dataset: &Dataset,
        ctx: &RegistryContext,
        filter: Option<&BTreeSet<String>>,
    ) -> AttributeRecord {
        let model = ctx.default_model();
        let (incorrect, correct): (Vec<(&InstanceKey, &Value)>, Vec<(&InstanceKey, &Value)>) =
            self.scalar_items(filter).partition(|(key, _)| match (&model, dataset.instance(key)) {
                (Some(model), Some(instance)) => {
                    instance.is_incorrect(model, &ctx.config.primary_metric)
                }
                _ => false,
            });
        let count = |items: Vec<(&InstanceKey, &Value)>| {
            let mut counts = value_counts(items.into_iter().map(|(_, v)| v));
            counts.sort_by(|a, b| a.0.total_cmp(&b.0));
            counts
        };
        AttributeRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            cmd: self.expression.cmd.clone(),
            domain: self.domain(filter),
            dtype: self.dtype,
            counts: ValueCounts {
                correct: count(correct),
                incorrect: count(incorrect),
            },
        }
    }
}

/// Continuous iff every non-list value is a number.
fn infer_dtype<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Dtype {
    let numeric = values
        .into_iter()
        .filter(|v| v.as_list().is_none())
        .all(|v| matches!(v, Value::Number(_)));
    if numeric {
        Dtype::Continuous
    } else {
        Dtype::Categorical
    }
}

impl Built for Attribute {
    const KIND: BuiltKind = BuiltKind::Attr;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn expression(&self) -> &CompiledExpression {
        &self.expression
    }

    fn test_size(&self) -> usize {
        self.test_size
    }

    fn recreate(
        definition: &BuiltDefinition,
        dataset: &Dataset,
        ctx: &RegistryContext,
    ) -> EngineResult<Arc<Self>> {
        Attribute::create(
            &definition.name,
            &definition.description,
            &definition.cmd,
            dataset,
            ctx,
            CreateOptions::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{Instance, Label};

    fn numbers(values: &[f64]) -> Dataset {
        Dataset::from_instances(values.iter().enumerate().map(|(i, n)| {
            Instance::new(format!("q{}", i), 0).with_entry("n", Value::Number(*n))
        }))
    }

    fn qids(qids: &[&str]) -> BTreeSet<String> {
        qids.iter().map(|q| q.to_string()).collect()
    }

    #[test]
    fn test_empty_cmd_rejected() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[1.0]);
        let result = Attribute::create("a", "", "  ", &dataset, &ctx, CreateOptions::default());
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert!(ctx.attributes.is_empty());
    }

    #[test]
    fn test_parse_error_registers_nothing() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[1.0]);
        let result = Attribute::create("a", "", "n +", &dataset, &ctx, CreateOptions::default());
        assert!(matches!(result, Err(EngineError::Parse { .. })));
        assert!(ctx.attributes.lookup("a").is_none());
    }

    #[test]
    fn test_domain() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[3.0, 1.0, 7.0]);
        let attr =
            Attribute::create("n", "", "n", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert_eq!(attr.dtype, Dtype::Continuous);
        assert_eq!(attr.domain(None), vec![Value::Number(1.0), Value::Number(7.0)]);
        assert_eq!(
            attr.domain(Some(&qids(&["q0", "q1"]))),
            vec![Value::Number(1.0), Value::Number(3.0)]
        );
        assert!(attr.domain(Some(&qids(&["zz"]))).is_empty());
    }

    #[test]
    fn test_categorical_domain_skips_lists() {
        let ctx = RegistryContext::default();
        let dataset = Dataset::from_instances([
            Instance::new("q1", 0).with_entry("t", Value::from("why")),
            Instance::new("q2", 0).with_entry("t", Value::from("how")),
            Instance::new("q3", 0).with_entry("t", Value::from("why")),
            Instance::new("q4", 0).with_entry("t", Value::from(vec!["a", "b"])),
        ]);
        let attr =
            Attribute::create("t", "", "t", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert_eq!(attr.dtype, Dtype::Categorical);
        assert_eq!(attr.domain(None), vec![Value::from("how"), Value::from("why")]);
    }

    #[test]
    fn test_outliers() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[1.0, 2.0, 2.0, 3.0, 2.0, 3.0, 1.0, 100.0]);
        let attr =
            Attribute::create("n", "", "n", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert!(attr.is_outlier(&Value::Number(100.0), None, &ctx.config));
        assert!(!attr.is_outlier(&Value::Number(2.0), None, &ctx.config));
        assert!(!attr.is_outlier(&Value::Null, None, &ctx.config));
        assert_eq!(attr.outliers(None, &ctx.config), vec![InstanceKey::unedited("q7")]);
    }

    #[test]
    fn test_rare_category_outlier() {
        let ctx = RegistryContext::default();
        let mut instances: Vec<Instance> = (0..30)
            .map(|i| Instance::new(format!("q{:02}", i), 0).with_entry("t", Value::from("what")))
            .collect();
        instances.push(Instance::new("q99", 0).with_entry("t", Value::from("whom")));
        let dataset = Dataset::from_instances(instances);
        let attr =
            Attribute::create("t", "", "t", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert!(attr.is_outlier(&Value::from("whom"), None, &ctx.config));
        assert!(!attr.is_outlier(&Value::from("what"), None, &ctx.config));
        assert!(!attr.is_outlier(&Value::from("never"), None, &ctx.config));
    }

    #[test]
    fn test_discretize_continuous() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let attr =
            Attribute::create("n", "", "n", &dataset, &ctx, CreateOptions::default()).unwrap();
        let bins = attr.discretize(&ctx.config);
        // edges 0, 2, 4, 6, 8, 10
        assert_eq!(bins[&InstanceKey::unedited("q0")], "[0,2)");
        assert_eq!(bins[&InstanceKey::unedited("q3")], "[2,4)");
        assert_eq!(bins[&InstanceKey::unedited("q9")], "[8,10)");
        assert_eq!(bins[&InstanceKey::unedited("q10")], "[10,10)");
    }

    #[test]
    fn test_discretize_categorical_top() {
        let ctx = RegistryContext::default();
        let config = EngineConfig {
            top_categories: 1,
            ..EngineConfig::default()
        };
        let dataset = Dataset::from_instances([
            Instance::new("q1", 0).with_entry("t", Value::from("why")),
            Instance::new("q2", 0).with_entry("t", Value::from("how")),
            Instance::new("q3", 0).with_entry("t", Value::from("why")),
        ]);
        let attr =
            Attribute::create("t", "", "t", &dataset, &ctx, CreateOptions::default()).unwrap();
        let bins = attr.discretize(&config);
        assert_eq!(bins[&InstanceKey::unedited("q1")], "why");
        assert_eq!(bins[&InstanceKey::unedited("q2")], "other");
    }

    #[test]
    fn test_serialize_counts() {
        let ctx = RegistryContext::default();
        ctx.set_default_model(Some("m".to_string()));
        let predicted = |score: f64| {
            Value::List(vec![Value::label(Label::new("m", "x").with_perform("f1", score))])
        };
        let dataset = Dataset::from_instances([
            Instance::new("q1", 0)
                .with_entry("t", Value::from("why"))
                .with_entry("predictions", predicted(1.0)),
            Instance::new("q2", 0)
                .with_entry("t", Value::from("why"))
                .with_entry("predictions", predicted(0.0)),
            Instance::new("q3", 0)
                .with_entry("t", Value::from("how"))
                .with_entry("predictions", predicted(1.0)),
        ]);
        let attr =
            Attribute::create("t", "d", "t", &dataset, &ctx, CreateOptions::default()).unwrap();
        let record = attr.serialize(&dataset, &ctx, None);
        assert_eq!(record.cmd, "t");
        assert_eq!(
            record.counts.correct,
            vec![(Value::from("how"), 1), (Value::from("why"), 1)]
        );
        assert_eq!(record.counts.incorrect, vec![(Value::from("why"), 1)]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["counts"]["incorrect"], serde_json::json!([["why", 1]]));
        assert_eq!(json["dtype"], "categorical");
    }

    #[test]
    fn test_equivalent_reuses_dict() {
        let ctx = RegistryContext::default();
        let dataset = numbers(&[1.0, 2.0]);
        let first =
            Attribute::create("a", "", "n + 1", &dataset, &ctx, CreateOptions::default()).unwrap();
        let second = Attribute::create("b", "", "n+1", &dataset, &ctx, CreateOptions::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first.instance_dict, &second.instance_dict));
        assert_eq!(first.expression.cmd, "n + 1");
        assert_eq!(second.expression.cmd, "n+1");
        assert_eq!(second.serialize(&dataset, &ctx, None).cmd, "n+1");
        let exported: Vec<crate::builts::BuiltDefinition> =
            serde_json::from_str(&ctx.attributes.export_json().unwrap()).unwrap();
        assert_eq!(exported[1].name, "b");
        assert_eq!(exported[1].cmd, "n+1");
        let forced = Attribute::create(
            "c",
            "",
            "n + 1",
            &dataset,
            &ctx,
            CreateOptions::default().force_recompute(),
        )
        .unwrap();
        assert!(!Arc::ptr_eq(&first.instance_dict, &forced.instance_dict));
        assert_eq!(first.instance_dict, forced.instance_dict);
    }
}

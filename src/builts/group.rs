use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::ast::{BuiltKind, CompiledExpression, Dependencies, OpNode};
use crate::eval::test_instances;
use crate::instance::{Dataset, InstanceKey};
use crate::registry_context::RegistryContext;
use crate::EngineResult;

use super::store::{Built, BuiltDefinition};
use super::CreateOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCounts {
    pub correct: usize,
    pub incorrect: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorRates {
    /// members over the universe
    pub coverage: f64,
    /// share of all errors that fall inside the group
    pub error_coverage: f64,
    /// errors over members
    pub local_error_rate: f64,
    /// member errors over the universe
    pub global_error_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub counts: GroupCounts,
    pub stats: ErrorRates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub description: String,
    pub cmd: String,
    pub counts: GroupCounts,
    pub stats: ErrorRates,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Correctness {
    Correct,
    Incorrect,
}

impl Correctness {
    fn of(is_incorrect: bool) -> Self {
        if is_incorrect {
            Correctness::Incorrect
        } else {
            Correctness::Correct
        }
    }
}

/// One cell of the two-model error overlap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub model_a: String,
    pub model_b: String,
    pub perform_a: Correctness,
    pub perform_b: Correctness,
    pub count: usize,
}

/// The instances a boolean DSL expression accepts.
#[derive(Debug, Clone)]
pub struct Group {
    pub name: String,
    pub description: String,
    pub expression: Arc<CompiledExpression>,
    /// Only members, all mapped to `true`.
    pub instance_dict: Arc<BTreeMap<InstanceKey, bool>>,
    pub test_size: usize,
}

impl Group {
    /// Filters a sample of `dataset` with `cmd` and registers the group when
    /// `options.save` is set. An empty cmd accepts every unedited instance.
    pub fn create(
        name: &str,
        description: &str,
        cmd: &str,
        dataset: &Dataset,
        ctx: &RegistryContext,
        options: CreateOptions,
    ) -> EngineResult<Arc<Group>> {
        let expression = if cmd.trim().is_empty() {
            CompiledExpression {
                cmd: String::new(),
                root: OpNode::NoOp,
                deps: Dependencies::default(),
            }
        } else {
            CompiledExpression::compile(cmd, ctx)?
        };
        let test_size = options.resolved_test_size(dataset, ctx.config.default_test_size);

        let reused = if options.allows_reuse() {
            ctx.groups.find_equivalent(&expression, test_size)
        } else {
            None
        };
        let group = match reused {
            Some(existing) => {
                tracing::info!(
                    "group:{} reuses the members of group:{} [ {} ]",
                    name,
                    existing.name,
                    cmd
                );
                Group {
                    name: name.to_string(),
                    description: description.to_string(),
                    expression: Arc::new(expression),
                    instance_dict: existing.instance_dict.clone(),
                    test_size: existing.test_size,
                }
            }
            None => {
                let sample = options.sample(dataset, test_size, ctx.config.sample_seed);
                let instance_dict: BTreeMap<InstanceKey, bool> = if expression.root.is_noop() {
                    sample
                        .iter()
                        .filter(|group| group.unedited().is_some())
                        .map(|group| (group.unedited_key(), true))
                        .collect()
                } else {
                    test_instances(
                        &expression.root,
                        sample,
                        BuiltKind::Group,
                        ctx,
                        ctx.config.batch_error_policy,
                    )
                    .values
                    .into_keys()
                    .map(|key| (key, true))
                    .collect()
                };
                tracing::info!(
                    "group:{} created [ {} ] with {} members",
                    name,
                    cmd,
                    instance_dict.len()
                );
                Group {
                    name: name.to_string(),
                    description: description.to_string(),
                    expression: Arc::new(expression),
                    instance_dict: Arc::new(instance_dict),
                    test_size,
                }
            }
        };
        let group = Arc::new(group);
        if options.save {
            ctx.groups.save(group.clone());
        }
        Ok(group)
    }

    pub fn members(&self) -> BTreeSet<InstanceKey> {
        self.instance_dict
            .iter()
            .filter(|(_, member)| **member)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn contains(&self, key: &InstanceKey) -> bool {
        self.instance_dict.get(key).copied().unwrap_or(false)
    }

    /// Correctness counts and error rates of `members` under `model`.
    ///
    /// Rates are taken over the unedited instances when every member is
    /// unedited, over the edited ones otherwise. Empty denominators give 0.
    pub fn eval_stats(
        members: &BTreeSet<InstanceKey>,
        dataset: &Dataset,
        model: Option<&str>,
        primary_metric: &str,
    ) -> GroupStats {
        let universe = if members.iter().all(InstanceKey::is_unedited) {
            dataset.unedited_keys()
        } else {
            dataset.edited_keys()
        };
        let errors: BTreeSet<&InstanceKey> = match model {
            Some(model) => universe
                .iter()
                .filter(|key| {
                    dataset
                        .instance(key)
                        .map_or(false, |i| i.is_incorrect(model, primary_metric))
                })
                .collect(),
            None => BTreeSet::new(),
        };

        let mut counts = GroupCounts::default();
        for key in members {
            let Some(instance) = dataset.instance(key) else {
                continue;
            };
            let incorrect = model.map_or(false, |m| instance.is_incorrect(m, primary_metric));
            if incorrect {
                counts.incorrect += 1;
            } else {
                counts.correct += 1;
            }
        }

        let ratio = |n: usize, d: usize| if d == 0 { 0.0 } else { n as f64 / d as f64 };
        let total = universe.len();
        GroupStats {
            counts,
            stats: ErrorRates {
                coverage: ratio(counts.correct + counts.incorrect, total),
                error_coverage: ratio(counts.incorrect, errors.len()),
                local_error_rate: ratio(counts.incorrect, members.len()),
                global_error_rate: ratio(counts.incorrect, total),
            },
        }
    }

    /// Record of this group's members, judged by the default model.
    pub fn serialize(&self, dataset: &Dataset, ctx: &RegistryContext) -> GroupRecord {
        let model = ctx.default_model();
        let GroupStats { counts, stats } = Group::eval_stats(
            &self.members(),
            dataset,
            model.as_deref(),
            &ctx.config.primary_metric,
        );
        GroupRecord {
            name: self.name.clone(),
            description: self.description.clone(),
            cmd: self.expression.cmd.clone(),
            counts,
            stats,
        }
    }

    /// How `members` split across the correctness of two models, one cell per
    /// combination.
    pub fn compare_models(
        models: [&str; 2],
        members: &BTreeSet<InstanceKey>,
        dataset: &Dataset,
        primary_metric: &str,
    ) -> Vec<ModelComparison> {
        let [model_a, model_b] = models;
        let performs: Vec<(Correctness, Correctness)> = members
            .iter()
            .filter_map(|key| dataset.instance(key))
            .map(|instance| {
                (
                    Correctness::of(instance.is_incorrect(model_a, primary_metric)),
                    Correctness::of(instance.is_incorrect(model_b, primary_metric)),
                )
            })
            .collect();
        Correctness::iter()
            .flat_map(|a| Correctness::iter().map(move |b| (a, b)))
            .map(|(a, b)| ModelComparison {
                model_a: model_a.to_string(),
                model_b: model_b.to_string(),
                perform_a: a,
                perform_b: b,
                count: performs.iter().filter(|p| **p == (a, b)).count(),
            })
            .collect()
    }
}

impl Built for Group {
    const KIND: BuiltKind = BuiltKind::Group;

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
        Group::create(
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
    use crate::eval::Value;
    use crate::instance::{Instance, Label};
    use pretty_assertions::assert_eq;

    fn predictions(scores: &[(&str, f64)]) -> Value {
        Value::List(
            scores
                .iter()
                .map(|(model, score)| {
                    Value::label(Label::new(*model, "x").with_perform("f1", *score))
                })
                .collect(),
        )
    }

    /// q1..q4 unedited, `a` wrong on q1 and q2, `b` wrong on q2 and q3.
    fn dataset() -> Dataset {
        let scores = [
            (1.0, [("a", 0.0), ("b", 1.0)]),
            (2.0, [("a", 0.0), ("b", 0.0)]),
            (3.0, [("a", 1.0), ("b", 0.0)]),
            (4.0, [("a", 1.0), ("b", 1.0)]),
        ];
        let mut instances: Vec<Instance> = scores
            .iter()
            .enumerate()
            .map(|(i, (n, performs))| {
                Instance::new(format!("q{}", i + 1), 0)
                    .with_entry("n", Value::Number(*n))
                    .with_entry("predictions", predictions(performs))
            })
            .collect();
        instances.push(
            Instance::new("q1", 1)
                .with_rid("edit")
                .with_entry("n", Value::Number(9.0))
                .with_entry("predictions", predictions(&[("a", 0.0)])),
        );
        Dataset::from_instances(instances)
    }

    #[test]
    fn test_create_filters_unedited() {
        let ctx = RegistryContext::default();
        let dataset = dataset();
        let group =
            Group::create("big", "", "n >= 2", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert_eq!(
            group.members().into_iter().collect::<Vec<_>>(),
            vec![
                InstanceKey::unedited("q2"),
                InstanceKey::unedited("q3"),
                InstanceKey::unedited("q4")
            ]
        );
        assert!(group.contains(&InstanceKey::unedited("q2")));
        assert!(!group.contains(&InstanceKey::unedited("q1")));
        assert!(ctx.groups.contains("big"));
    }

    #[test]
    fn test_empty_cmd_takes_all_unedited() {
        let ctx = RegistryContext::default();
        let dataset = dataset();
        let group = Group::create("all", "", "", &dataset, &ctx, CreateOptions::default()).unwrap();
        assert_eq!(group.instance_dict.len(), 4);
        assert!(group.instance_dict.keys().all(InstanceKey::is_unedited));
    }

    #[test]
    fn test_eval_stats() {
        let dataset = dataset();
        let members: BTreeSet<InstanceKey> =
            ["q1", "q3"].iter().map(|q| InstanceKey::unedited(*q)).collect();
        let stats = Group::eval_stats(&members, &dataset, Some("a"), "f1");
        assert_eq!(stats.counts, GroupCounts { correct: 1, incorrect: 1 });
        assert_eq!(stats.stats.coverage, 0.5);
        assert_eq!(stats.stats.error_coverage, 0.5);
        assert_eq!(stats.stats.local_error_rate, 0.5);
        assert_eq!(stats.stats.global_error_rate, 0.25);
    }

    #[test]
    fn test_eval_stats_edited_universe() {
        let dataset = dataset();
        let members = BTreeSet::from([InstanceKey::new("q1", 1)]);
        let stats = Group::eval_stats(&members, &dataset, Some("a"), "f1");
        assert_eq!(stats.counts.incorrect, 1);
        assert_eq!(stats.stats.coverage, 1.0);
        assert_eq!(stats.stats.error_coverage, 1.0);
    }

    #[test]
    fn test_eval_stats_empty() {
        let dataset = dataset();
        let stats = Group::eval_stats(&BTreeSet::new(), &dataset, Some("a"), "f1");
        assert_eq!(stats, GroupStats::default());
    }

    #[test]
    fn test_serialize_record() {
        let ctx = RegistryContext::default();
        ctx.set_default_model(Some("b".to_string()));
        let dataset = dataset();
        let group =
            Group::create("big", "n at least 2", "n >= 2", &dataset, &ctx, CreateOptions::default())
                .unwrap();
        let record = group.serialize(&dataset, &ctx);
        assert_eq!(record.counts, GroupCounts { correct: 1, incorrect: 2 });
        assert_eq!(record.stats.error_coverage, 1.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["cmd"], "n >= 2");
        assert_eq!(json["counts"]["incorrect"], 2);
    }

    #[test]
    fn test_compare_models() {
        let dataset = dataset();
        let members = dataset.unedited_keys();
        let cells = Group::compare_models(["a", "b"], &members, &dataset, "f1");
        assert_eq!(cells.len(), 4);
        let count = |a: Correctness, b: Correctness| {
            cells
                .iter()
                .find(|c| c.perform_a == a && c.perform_b == b)
                .map(|c| c.count)
        };
        assert_eq!(count(Correctness::Correct, Correctness::Correct), Some(1));
        assert_eq!(count(Correctness::Incorrect, Correctness::Incorrect), Some(1));
        assert_eq!(count(Correctness::Incorrect, Correctness::Correct), Some(1));
        assert_eq!(count(Correctness::Correct, Correctness::Incorrect), Some(1));
        let json = serde_json::to_value(&cells[0]).unwrap();
        assert_eq!(json["perform_a"], "correct");
    }

    #[test]
    fn test_group_reuse() {
        let ctx = RegistryContext::default();
        let dataset = dataset();
        let first = Group::create("g1", "", "n > 1", &dataset, &ctx, CreateOptions::default())
            .unwrap();
        let second = Group::create("g2", "", "n>1", &dataset, &ctx, CreateOptions::default())
            .unwrap();
        assert!(Arc::ptr_eq(&first.instance_dict, &second.instance_dict));
        assert_eq!(second.expression.cmd, "n>1");
        assert_eq!(second.serialize(&dataset, &ctx).cmd, "n>1");
        // a smaller registered sample cannot stand in for a larger request
        let ctx = RegistryContext::default();
        let small = Group::create(
            "g1",
            "",
            "n > 1",
            &dataset,
            &ctx,
            CreateOptions::default().with_test_size(1),
        )
        .unwrap();
        let full = Group::create("g2", "", "n > 1", &dataset, &ctx, CreateOptions::default())
            .unwrap();
        assert!(!Arc::ptr_eq(&small.instance_dict, &full.instance_dict));
    }
}

//! Single-group and batch evaluation entry points.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{BuiltKind, OpNode};
use crate::config::BatchErrorPolicy;
use crate::error::ValueError;
use crate::instance::{InstanceGroup, InstanceKey};
use crate::registry_context::RegistryContext;

use super::context::EvalContext;
use super::evaluator::{record_key, ExpressionEvaluator};
use super::value::Value;

/// Values recorded by a batch run, plus the groups that failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub values: BTreeMap<InstanceKey, Value>,
    /// `(qid, error)` of every failing group
    pub failures: Vec<(String, ValueError)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Evaluates `expr` against one group, propagating any error.
pub fn test_one(
    expr: &OpNode,
    group: &InstanceGroup,
    registry: &RegistryContext,
) -> Result<Value, ValueError> {
    let ctx = EvalContext::new(group, registry);
    ExpressionEvaluator::new().evaluate(expr, &ctx).map(|r| r.value)
}

/// Evaluates `expr` over `groups`. Attributes keep non-null values; groups
/// keep the keys whose value is `true`.
pub fn test_instances<'a, I>(
    expr: &OpNode,
    groups: I,
    kind: BuiltKind,
    registry: &RegistryContext,
    policy: BatchErrorPolicy,
) -> BatchOutcome
where
    I: IntoIterator<Item = &'a InstanceGroup>,
{
    let evaluator = ExpressionEvaluator::new();
    let mut outcome = BatchOutcome::default();
    for group in groups {
        let ctx = EvalContext::new(group, registry);
        match evaluator.evaluate(expr, &ctx) {
            Ok(result) => {
                let keep = match kind {
                    BuiltKind::Attr => !result.value.is_null(),
                    BuiltKind::Group => result.value == Value::Bool(true),
                };
                if keep {
                    let key = record_key(&result, &group.qid);
                    outcome.values.insert(key, result.value);
                }
            }
            Err(e) => match policy {
                BatchErrorPolicy::FailFast => {
                    tracing::error!("[ {} ] failed on {}: {}", expr, group.qid, e);
                    return BatchOutcome {
                        values: BTreeMap::new(),
                        failures: vec![(group.qid.clone(), e)],
                    };
                }
                BatchErrorPolicy::SkipFailing => {
                    tracing::warn!("[ {} ] skipped {}: {}", expr, group.qid, e);
                    outcome.failures.push((group.qid.clone(), e));
                }
            },
        }
    }
    tracing::debug!(
        "[ {} ] evaluated: {} recorded, {} failed",
        expr,
        outcome.values.len(),
        outcome.failures.len()
    );
    outcome
}

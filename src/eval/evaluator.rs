use std::collections::BTreeSet;

use crate::ast::{Argument, BinaryOperator, BuiltKind, Literal, OpNode, UnaryOperator, SELECTED};
use crate::error::ValueError;
use crate::function_registry::{bind_arguments, CallEnv};
use crate::instance::InstanceKey;

use super::context::EvalContext;
use super::dispatch::dispatch;
use super::value::{Handle, OpNodeReturn, Value};

/// Keyword whose bare identifier value names a frequency table, not an entry.
const LITERAL_KEYWORD: &str = "target_type";

/// Evaluates an expression tree against one instance group.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, node: &OpNode, ctx: &EvalContext) -> Result<OpNodeReturn, ValueError> {
        match node {
            OpNode::NoOp => Ok(OpNodeReturn::null()),
            OpNode::Literal(literal) => Ok(OpNodeReturn::bare(Self::eval_literal(literal))),
            OpNode::List(items) => self.eval_list(items, ctx),
            OpNode::Ident(name) => Ok(self.eval_ident(name, ctx)),
            OpNode::BuiltRef { kind, name } => self.eval_built_ref(*kind, name, ctx),
            OpNode::Unary { op, operand } => self.eval_unary(*op, operand, ctx),
            OpNode::Binary { op, left, right } => self.eval_binary(*op, left, right, ctx),
            OpNode::Call {
                name,
                args,
                rewrite,
            } => self.eval_call(name, args, rewrite.as_deref(), ctx),
        }
    }

    fn eval_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::None => Value::Null,
        }
    }

    fn eval_list(&self, items: &[OpNode], ctx: &EvalContext) -> Result<OpNodeReturn, ValueError> {
        let mut provenance = BTreeSet::new();
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let result = self.evaluate(item, ctx)?;
            provenance.extend(result.provenance);
            values.push(result.value);
        }
        Ok(OpNodeReturn::new(provenance, Value::List(values)))
    }

    /// A live entry of the requested variant, else the identifier's own text.
    fn eval_ident(&self, name: &str, ctx: &EvalContext) -> OpNodeReturn {
        let Some(instance) = ctx.instance() else {
            return OpNodeReturn::null();
        };
        let model = ctx.registry.default_model();
        match instance.entry(name, model.as_deref()) {
            Some(value) => OpNodeReturn::keyed(&instance.key, value),
            None => OpNodeReturn::bare(Value::Str(name.to_string())),
        }
    }

    fn eval_built_ref(
        &self,
        kind: BuiltKind,
        name: &str,
        ctx: &EvalContext,
    ) -> Result<OpNodeReturn, ValueError> {
        let unknown = || ValueError::UnknownBuiltBlock {
            kind,
            name: name.to_string(),
        };
        match kind {
            BuiltKind::Attr => {
                let attr = ctx.registry.attributes.lookup(name).ok_or_else(unknown)?;
                let Some(instance) = ctx.instance() else {
                    return Ok(OpNodeReturn::null());
                };
                let value = match attr.instance_dict.get(&instance.key) {
                    Some(cached) => cached.clone(),
                    None => {
                        let variant = ctx.with_rewrite(instance.rid.clone());
                        self.evaluate(&attr.expression.root, &variant)?.value
                    }
                };
                Ok(OpNodeReturn::keyed(&instance.key, value))
            }
            BuiltKind::Group => {
                let group = ctx.registry.groups.lookup(name).ok_or_else(unknown)?;
                let Some(instance) = ctx.instance() else {
                    return Ok(OpNodeReturn::null());
                };
                let members: Vec<Value> = group
                    .instance_dict
                    .iter()
                    .filter(|(_, member)| **member)
                    .map(|(key, _)| Value::key(key.clone()))
                    .collect();
                Ok(OpNodeReturn::keyed(&instance.key, Value::List(members)))
            }
        }
    }

    fn eval_unary(
        &self,
        op: UnaryOperator,
        operand: &OpNode,
        ctx: &EvalContext,
    ) -> Result<OpNodeReturn, ValueError> {
        let result = self.evaluate(operand, ctx)?;
        let value = match (op, &result.value) {
            (UnaryOperator::Not, Value::Null) => Value::Bool(false),
            (UnaryOperator::Not, value) => Value::Bool(!value.truthy()),
            (_, Value::Null) => return Err(ValueError::MissingOperand(op.to_string())),
            (UnaryOperator::Neg, Value::Number(n)) => Value::Number(-n),
            (UnaryOperator::Pos, Value::Number(n)) => Value::Number(*n),
            (_, other) => {
                return Err(ValueError::type_mismatch(format!(
                    "bad operand type for unary [ {} ]: {}",
                    op,
                    other.tag()
                )))
            }
        };
        Ok(OpNodeReturn::new(result.provenance, value))
    }

    fn eval_binary(
        &self,
        op: BinaryOperator,
        left: &OpNode,
        right: &OpNode,
        ctx: &EvalContext,
    ) -> Result<OpNodeReturn, ValueError> {
        if op.is_logical() {
            return self.eval_logical(op, left, right, ctx);
        }
        let lhs = self.evaluate(left, ctx)?;
        let rhs = self.evaluate(right, ctx)?;
        let value = match op {
            BinaryOperator::In => Value::Bool(contains(&rhs.value, &lhs.value)?),
            BinaryOperator::NotIn => Value::Bool(!contains(&rhs.value, &lhs.value)?),
            _ => dispatch(op, &lhs.value, &rhs.value)?,
        };
        let mut provenance = lhs.provenance;
        provenance.extend(rhs.provenance);
        Ok(OpNodeReturn::new(provenance, value))
    }

    /// Short-circuiting `and`/`or`. Only evaluated operands contribute
    /// provenance and a null operand ends evaluation with `false`.
    fn eval_logical(
        &self,
        op: BinaryOperator,
        left: &OpNode,
        right: &OpNode,
        ctx: &EvalContext,
    ) -> Result<OpNodeReturn, ValueError> {
        let lhs = self.evaluate(left, ctx)?;
        let mut provenance = lhs.provenance;
        if lhs.value.is_null() {
            return Ok(OpNodeReturn::new(provenance, Value::Bool(false)));
        }
        let decided = match op {
            BinaryOperator::And => !lhs.value.truthy(),
            _ => lhs.value.truthy(),
        };
        if decided {
            return Ok(OpNodeReturn::new(provenance, Value::Bool(lhs.value.truthy())));
        }
        let rhs = self.evaluate(right, ctx)?;
        provenance.extend(rhs.provenance);
        Ok(OpNodeReturn::new(provenance, Value::Bool(rhs.value.truthy())))
    }

    fn eval_call(
        &self,
        name: &str,
        args: &[Argument],
        rewrite: Option<&str>,
        ctx: &EvalContext,
    ) -> Result<OpNodeReturn, ValueError> {
        let descriptor = ctx.registry.functions.get(name)?;

        let variant_ctx = if ctx.is_unrewritten() {
            let declared = descriptor
                .param("rewrite")
                .and_then(|p| p.default.as_ref())
                .and_then(Value::as_str)
                .map(str::to_string);
            match rewrite.map(str::to_string).or(declared) {
                Some(rid) if rid == SELECTED => ctx.with_rewrite(ctx.registry.selected_rewrite()),
                Some(rid) => ctx.with_rewrite(rid),
                None => ctx.clone(),
            }
        } else {
            ctx.clone()
        };
        let Some(instance) = variant_ctx.instance() else {
            return Ok(OpNodeReturn::null());
        };

        let mut provenance = BTreeSet::new();
        let mut positional = Vec::new();
        let mut named = Vec::new();
        for arg in args {
            match arg {
                Argument::Positional(node) => {
                    let result = self.evaluate(node, &variant_ctx)?;
                    provenance.extend(result.provenance);
                    positional.push(result.value);
                }
                Argument::Named { name, value } => {
                    let value = match value {
                        OpNode::Ident(text) if name == LITERAL_KEYWORD => Value::Str(text.clone()),
                        node => {
                            let result = self.evaluate(node, &variant_ctx)?;
                            provenance.extend(result.provenance);
                            result.value
                        }
                    };
                    named.push((name.clone(), value));
                }
            }
        }

        let model = ctx.registry.default_model();
        let entry = |entry_name: &str| instance.entry(entry_name, model.as_deref());
        let (bound, auto_bound) = bind_arguments(&descriptor, positional, named, &entry)?;
        if auto_bound {
            provenance.insert(instance.key.clone());
        }
        let value = descriptor.call(&bound, &CallEnv::new(ctx.registry))?;
        tracing::trace!("{} -> {}", name, value);
        Ok(OpNodeReturn::new(provenance, value))
    }
}

/// `element in container`: list membership, or substring containment for a
/// string or document container.
fn contains(container: &Value, element: &Value) -> Result<bool, ValueError> {
    match (container, element) {
        (Value::List(items), element) => Ok(items.contains(element)),
        (Value::Str(text), Value::Str(needle)) => Ok(text.contains(needle.as_str())),
        (Value::Handle(Handle::Doc(doc)), Value::Str(needle)) => {
            Ok(doc.text().contains(needle.as_str()))
        }
        (container, element) => Err(ValueError::type_mismatch(format!(
            "[ in ] is not supported between {} and {}",
            element.tag(),
            container.tag()
        ))),
    }
}

/// Evaluates `node` in `ctx` with a fresh evaluator.
pub fn evaluate(node: &OpNode, ctx: &EvalContext) -> Result<OpNodeReturn, ValueError> {
    ExpressionEvaluator::new().evaluate(node, ctx)
}

/// Key a batch result is recorded under: its single source instance, or the
/// unedited variant of the group.
pub(crate) fn record_key(result: &OpNodeReturn, qid: &str) -> InstanceKey {
    if result.provenance.len() == 1 {
        if let Some(key) = result.provenance.iter().next() {
            return key.clone();
        }
    }
    InstanceKey::unedited(qid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::parse_cmd;
    use crate::instance::{Document, Instance, InstanceGroup, Label};
    use crate::registry_context::RegistryContext;
    use pretty_assertions::assert_eq;

    fn group() -> InstanceGroup {
        InstanceGroup::new("q1")
            .with_variant(
                Instance::new("q1", 0)
                    .with_entry("question", Value::doc(Document::from_text("who wrote it ?")))
                    .with_entry("n", Value::Number(4.0))
                    .with_entry(
                        "predictions",
                        Value::List(vec![Value::label(
                            Label::new("bidaf", "Paris").with_perform("f1", 0.25),
                        )]),
                    ),
            )
            .with_variant(
                Instance::new("q1", 1)
                    .with_rid("shorten")
                    .with_entry("question", Value::doc(Document::from_text("who ?"))),
            )
    }

    fn eval(cmd: &str, ctx: &EvalContext) -> Result<OpNodeReturn, ValueError> {
        evaluate(&parse_cmd(cmd), ctx)
    }

    #[test]
    fn test_arithmetic_precedence() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        assert_eq!(eval("1 + 2 * 3", &ctx).unwrap().value, Value::Number(7.0));
        assert_eq!(eval("-(1 + 2) % 2", &ctx).unwrap().value, Value::Number(1.0));
    }

    #[test]
    fn test_ident_resolution() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        let result = eval("n", &ctx).unwrap();
        assert_eq!(result.value, Value::Number(4.0));
        assert_eq!(result.provenance, BTreeSet::from([InstanceKey::unedited("q1")]));

        let result = eval("unknown", &ctx).unwrap();
        assert_eq!(result.value, Value::from("unknown"));
        assert!(result.provenance.is_empty());
    }

    #[test]
    fn test_unary() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        assert_eq!(eval("not None", &ctx).unwrap().value, Value::Bool(false));
        assert_eq!(eval("not 0", &ctx).unwrap().value, Value::Bool(true));
        assert!(matches!(eval("-None", &ctx), Err(ValueError::MissingOperand(_))));
        assert!(matches!(eval("-true", &ctx), Err(ValueError::TypeMismatch(_))));
    }

    #[test]
    fn test_short_circuit_provenance() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        let result = eval("false and n > 1", &ctx).unwrap();
        assert_eq!(result.value, Value::Bool(false));
        assert!(result.provenance.is_empty());

        let result = eval("None or true", &ctx).unwrap();
        assert_eq!(result.value, Value::Bool(false));

        let result = eval("true and n", &ctx).unwrap();
        assert_eq!(result.value, Value::Bool(true));
        assert_eq!(result.provenance.len(), 1);
    }

    #[test]
    fn test_containment() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        assert_eq!(eval("2 in [1, 2]", &ctx).unwrap().value, Value::Bool(true));
        assert_eq!(eval("\"wrote\" in question", &ctx).unwrap().value, Value::Bool(true));
        assert_eq!(eval("\"x\" not in \"abc\"", &ctx).unwrap().value, Value::Bool(true));
        assert!(matches!(eval("1 in 2", &ctx), Err(ValueError::TypeMismatch(_))));
    }

    #[test]
    fn test_call_auto_binding_and_rewrite() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);

        let result = eval("length(question)", &ctx).unwrap();
        assert_eq!(result.value, Value::Number(4.0));
        assert_eq!(result.provenance, BTreeSet::from([InstanceKey::unedited("q1")]));

        let result = eval("length()", &ctx).unwrap();
        assert_eq!(result.value, Value::Number(4.0));
        assert_eq!(result.provenance, BTreeSet::from([InstanceKey::unedited("q1")]));

        let result = eval("length(question, rewrite=\"shorten\")", &ctx).unwrap();
        assert_eq!(result.value, Value::Number(2.0));
        assert_eq!(result.provenance, BTreeSet::from([InstanceKey::new("q1", 1)]));

        let result = eval("length(question, rewrite=\"absent\")", &ctx).unwrap();
        assert_eq!(result.value, Value::Null);
        assert!(result.provenance.is_empty());

        registry.set_selected_rewrite("shorten");
        let result = eval("apply(length(question))", &ctx).unwrap();
        assert_eq!(result.value, Value::Number(2.0));
    }

    #[test]
    fn test_model_dependent_call() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        assert!(matches!(
            eval("f1()", &ctx),
            Err(ValueError::InvalidArgument { .. })
        ));
        registry.set_default_model(Some("bidaf".to_string()));
        assert_eq!(eval("f1()", &ctx).unwrap().value, Value::Number(0.25));
        assert_eq!(
            eval("f1(model=\"bidaf\") < 0.5", &ctx).unwrap().value,
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unknown_names() {
        let registry = RegistryContext::default();
        let group = group();
        let ctx = EvalContext::new(&group, &registry);
        assert_eq!(
            eval("missing(question)", &ctx).unwrap_err(),
            ValueError::UnknownFunction("missing".to_string())
        );
        assert!(matches!(
            eval("attr:nothing", &ctx),
            Err(ValueError::UnknownBuiltBlock { .. })
        ));
    }

    #[test]
    fn test_record_key() {
        let single = OpNodeReturn::keyed(&InstanceKey::new("q1", 3), Value::Bool(true));
        assert_eq!(record_key(&single, "q1"), InstanceKey::new("q1", 3));
        let bare = OpNodeReturn::bare(Value::Bool(true));
        assert_eq!(record_key(&bare, "q1"), InstanceKey::unedited("q1"));
    }
}

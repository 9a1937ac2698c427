use core::fmt;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{
    analyzer,
    eval::Value,
    function_registry::{FunctionDescriptor, ParamBinding},
    registry_context::RegistryContext,
    EngineError, EngineResult,
};

/// Sentinel meaning "the context's default model".
pub const ANCHOR: &str = "ANCHOR";
/// Sentinel meaning "the context's selected rewrite".
pub const SELECTED: &str = "SELECTED";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumString, Display, AsRefStr,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BuiltKind {
    Attr,
    Group,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "not")]
    Not,
    #[strum(serialize = "-")]
    Neg,
    #[strum(serialize = "+")]
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "or")]
    Or,
    #[strum(serialize = "and")]
    And,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "in")]
    In,
    #[strum(serialize = "not in")]
    NotIn,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
}

impl BinaryOperator {
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessThanEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterThanEqual
                | BinaryOperator::In
                | BinaryOperator::NotIn
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Add | BinaryOperator::Subtract => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
            _ => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(OpNode),
    Named { name: String, value: OpNode },
}

impl Argument {
    pub fn value(&self) -> &OpNode {
        match self {
            Argument::Positional(value) | Argument::Named { value, .. } => value,
        }
    }
}

/// Node of a parsed query. Equality is structural, which is what the store
/// uses to detect equivalent expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum OpNode {
    /// Result of a failed parse
    NoOp,
    Literal(Literal),
    List(Vec<OpNode>),
    BuiltRef {
        kind: BuiltKind,
        name: String,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<OpNode>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<OpNode>,
        right: Box<OpNode>,
    },
    /// Bare entry reference; falls back to its own text when no entry matches
    Ident(String),
    Call {
        name: String,
        args: Vec<Argument>,
        rewrite: Option<String>,
    },
}

impl OpNode {
    pub fn is_noop(&self) -> bool {
        matches!(self, OpNode::NoOp)
    }

    pub fn number(n: f64) -> Self {
        OpNode::Literal(Literal::Number(n))
    }

    pub fn string<S: Into<String>>(s: S) -> Self {
        OpNode::Literal(Literal::Str(s.into()))
    }

    pub fn binary(op: BinaryOperator, left: OpNode, right: OpNode) -> Self {
        OpNode::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: OpNode) -> Self {
        OpNode::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Builds a call node, lifting a textual `rewrite=` keyword out of the
    /// argument list.
    pub fn call<S: Into<String>>(name: S, args: Vec<Argument>) -> Self {
        let mut rewrite = None;
        let mut kept = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Named { name, value } if name == "rewrite" => match value {
                    OpNode::Literal(Literal::Str(s)) | OpNode::Ident(s) => rewrite = Some(s),
                    value => kept.push(Argument::Named { name, value }),
                },
                other => kept.push(other),
            }
        }
        OpNode::Call {
            name: name.into(),
            args: kept,
            rewrite,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            OpNode::Binary { op, .. } => op.precedence(),
            OpNode::Unary {
                op: UnaryOperator::Not,
                ..
            } => 3,
            OpNode::Unary { .. } => 7,
            _ => 8,
        }
    }

    /// Names of all attribute or group blocks referenced in the tree.
    pub fn built_refs(&self) -> Vec<(BuiltKind, String)> {
        let mut refs = Vec::new();
        self.collect_built_refs(&mut refs);
        refs
    }

    fn collect_built_refs(&self, refs: &mut Vec<(BuiltKind, String)>) {
        match self {
            OpNode::BuiltRef { kind, name } => refs.push((*kind, name.clone())),
            OpNode::List(items) => items.iter().for_each(|i| i.collect_built_refs(refs)),
            OpNode::Unary { operand, .. } => operand.collect_built_refs(refs),
            OpNode::Binary { left, right, .. } => {
                left.collect_built_refs(refs);
                right.collect_built_refs(refs);
            }
            OpNode::Call { args, .. } => args
                .iter()
                .for_each(|a| a.value().collect_built_refs(refs)),
            _ => {}
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &OpNode, needs_parens: bool) -> fmt::Result {
    if needs_parens {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{}", c)?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Str(s) => write_escaped(f, s),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::None => write!(f, "None"),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Positional(value) => write!(f, "{}", value),
            Argument::Named { name, value } => write!(f, "{}={}", name, value),
        }
    }
}

impl fmt::Display for OpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpNode::NoOp => Ok(()),
            OpNode::Literal(literal) => write!(f, "{}", literal),
            OpNode::List(items) => {
                let items: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            OpNode::BuiltRef { kind, name } => write!(f, "{}:{}", kind, name),
            OpNode::Unary { op, operand } => {
                let min = if *op == UnaryOperator::Not { 3 } else { 7 };
                match op {
                    UnaryOperator::Not => write!(f, "not ")?,
                    _ => write!(f, "{}", op)?,
                }
                // a signed operand after a sign would read as `--1`
                let signed = *op != UnaryOperator::Not
                    && match &**operand {
                        OpNode::Unary { op, .. } => *op != UnaryOperator::Not,
                        OpNode::Literal(Literal::Number(n)) => n.is_sign_negative(),
                        _ => false,
                    };
                write_child(f, operand, signed || operand.precedence() < min)
            }
            OpNode::Binary { op, left, right } => {
                let prec = op.precedence();
                // comparisons do not chain, so both sides must bind tighter
                let left_parens = if op.is_comparison() {
                    left.precedence() <= prec
                } else {
                    left.precedence() < prec
                };
                write_child(f, left, left_parens)?;
                write!(f, " {} ", op)?;
                write_child(f, right, right.precedence() <= prec)
            }
            OpNode::Ident(name) => write!(f, "{}", name),
            OpNode::Call {
                name,
                args,
                rewrite,
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                if let Some(rewrite) = rewrite {
                    parts.push(format!("rewrite={}", Literal::Str(rewrite.clone())));
                }
                write!(f, "{}({})", name, parts.join(", "))
            }
        }
    }
}

/// Whether a compiled expression depends on the ambient model or rewrite
/// selection. Captured once at compile time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub model: bool,
    pub rewrite: bool,
}

impl Dependencies {
    pub fn merge(&mut self, other: Dependencies) {
        self.model |= other.model;
        self.rewrite |= other.rewrite;
    }

    pub fn depends_on(&self, switch: &str) -> bool {
        match switch {
            "model" => self.model,
            "rewrite" => self.rewrite,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    pub cmd: String,
    pub root: OpNode,
    pub deps: Dependencies,
}

impl CompiledExpression {
    pub fn compile(cmd: &str, ctx: &RegistryContext) -> EngineResult<Self> {
        let root =
            analyzer::try_parse_cmd(cmd).map_err(|e| EngineError::parse(cmd, e.to_string()))?;
        if root.is_noop() {
            return Err(EngineError::parse(cmd, "empty expression"));
        }
        let mut deps = Dependencies::default();
        collect_dependencies(&root, ctx, &mut deps);
        tracing::debug!("compiled [ {} ] deps: {:?}", cmd, deps);
        Ok(Self {
            cmd: cmd.to_string(),
            root,
            deps,
        })
    }

    /// Structural equivalence used for store deduplication.
    pub fn equivalent(&self, other: &CompiledExpression) -> bool {
        self.root == other.root
    }
}

fn sentinel_deps(text: &str, deps: &mut Dependencies) {
    match text {
        ANCHOR => deps.model = true,
        SELECTED => deps.rewrite = true,
        _ => {}
    }
}

fn collect_dependencies(node: &OpNode, ctx: &RegistryContext, deps: &mut Dependencies) {
    match node {
        OpNode::Literal(Literal::Str(s)) | OpNode::Ident(s) => sentinel_deps(s, deps),
        OpNode::BuiltRef { kind, name } => {
            let found = match kind {
                BuiltKind::Attr => ctx.attributes.lookup(name).map(|a| a.expression.deps),
                BuiltKind::Group => ctx.groups.lookup(name).map(|g| g.expression.deps),
            };
            if let Some(found) = found {
                deps.merge(found);
            }
        }
        OpNode::List(items) => items
            .iter()
            .for_each(|item| collect_dependencies(item, ctx, deps)),
        OpNode::Unary { operand, .. } => collect_dependencies(operand, ctx, deps),
        OpNode::Binary { left, right, .. } => {
            collect_dependencies(left, ctx, deps);
            collect_dependencies(right, ctx, deps);
        }
        OpNode::Call {
            name,
            args,
            rewrite,
        } => {
            if let Some(rewrite) = rewrite {
                sentinel_deps(rewrite, deps);
            }
            if let Ok(descriptor) = ctx.functions.get(name) {
                defaulted_sentinels(&descriptor, args, rewrite.is_some(), deps);
            }
            args.iter()
                .for_each(|arg| collect_dependencies(arg.value(), ctx, deps));
        }
        _ => {}
    }
}

/// Flags sentinel defaults of parameters that the call leaves unfilled.
fn defaulted_sentinels(
    descriptor: &FunctionDescriptor,
    args: &[Argument],
    has_rewrite: bool,
    deps: &mut Dependencies,
) {
    let positional = args
        .iter()
        .filter(|a| matches!(a, Argument::Positional(_)))
        .count();
    let mut slot = 0;
    for param in descriptor.visible_params() {
        let named = args
            .iter()
            .any(|a| matches!(a, Argument::Named { name, .. } if *name == param.name));
        let covered = if matches!(descriptor.binding(&param.name), Some(ParamBinding::Entry(_))) {
            true
        } else {
            slot += 1;
            named || slot <= positional
        };
        if param.name == "rewrite" && has_rewrite {
            continue;
        }
        if !covered {
            if let Some(Value::Str(default)) = &param.default {
                sentinel_deps(default, deps);
            }
        }
    }
}

mod common;

use errslice::ast::{Argument, BinaryOperator, BuiltKind, Literal, OpNode, UnaryOperator};
use errslice::{parse_cmd, try_parse_cmd};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn ident(name: &str) -> OpNode {
    OpNode::Ident(name.to_string())
}

#[test]
fn it_parses_the_query_surface() {
    let node = parse_cmd("length(question) > 3 and not prediction(model=\"bert\") in groundtruths");
    let expected = OpNode::binary(
        BinaryOperator::And,
        OpNode::binary(
            BinaryOperator::GreaterThan,
            OpNode::call("length", vec![Argument::Positional(ident("question"))]),
            OpNode::number(3.0),
        ),
        OpNode::unary(
            UnaryOperator::Not,
            OpNode::binary(
                BinaryOperator::In,
                OpNode::call(
                    "prediction",
                    vec![Argument::Named {
                        name: "model".to_string(),
                        value: OpNode::string("bert"),
                    }],
                ),
                ident("groundtruths"),
            ),
        ),
    );
    assert_eq!(node, expected);
}

#[test]
fn it_binds_multiplication_tighter() {
    assert_eq!(parse_cmd("1 + 2 * 3"), parse_cmd("1 + (2 * 3)"));
    assert_ne!(parse_cmd("1 + 2 * 3"), parse_cmd("(1 + 2) * 3"));
    assert_eq!(parse_cmd("a or b and c"), parse_cmd("a or (b and c)"));
}

#[test]
fn it_extracts_rewrite_keyword() {
    match parse_cmd("length(question, rewrite=\"add_not\")") {
        OpNode::Call { name, args, rewrite } => {
            assert_eq!(name, "length");
            assert_eq!(args.len(), 1);
            assert_eq!(rewrite.as_deref(), Some("add_not"));
        }
        other => panic!("unexpected node: {:?}", other),
    }
}

#[test]
fn it_parses_built_refs() {
    assert_eq!(
        parse_cmd("attr:len > 4"),
        OpNode::binary(
            BinaryOperator::GreaterThan,
            OpNode::BuiltRef {
                kind: BuiltKind::Attr,
                name: "len".to_string()
            },
            OpNode::number(4.0)
        )
    );
    assert_eq!(
        parse_cmd("group:wrong").built_refs(),
        vec![(BuiltKind::Group, "wrong".to_string())]
    );
}

#[test]
fn it_rejects_malformed_commands() {
    for cmd in ["length(question", "1 +", "a == == b", "[1, 2", "a < b < c"] {
        assert!(try_parse_cmd(cmd).is_err(), "{} should not parse", cmd);
        assert_eq!(parse_cmd(cmd), OpNode::NoOp);
    }
}

#[test]
fn it_prints_minimal_parentheses() {
    for cmd in [
        "(a + b) * c",
        "a - (b - c)",
        "not (a and b)",
        "(a == b) == c",
        "f(x, y=\"z\") in [1, 2]",
    ] {
        assert_eq!(parse_cmd(cmd).to_string(), cmd);
    }
}

#[test]
fn it_prints_nested_signs_with_parens() {
    let node = OpNode::unary(
        UnaryOperator::Neg,
        OpNode::unary(UnaryOperator::Neg, OpNode::number(1.0)),
    );
    assert_eq!(node.to_string(), "-(-1)");
    assert_eq!(parse_cmd("-(-1)"), node);
    assert_eq!(parse_cmd("-(-1)").to_string(), "-(-1)");
}

fn leaf() -> impl Strategy<Value = OpNode> {
    prop_oneof![
        (0u32..1000, 0u32..4).prop_map(|(n, q)| OpNode::number(n as f64 + q as f64 / 4.0)),
        "[a-z ]{0,6}".prop_map(OpNode::string),
        any::<bool>().prop_map(|b| OpNode::Literal(Literal::Bool(b))),
        Just(OpNode::Literal(Literal::None)),
        "[a-z]{1,5}".prop_map(|s| OpNode::Ident(format!("v_{}", s))),
        ("[a-z]{1,5}", any::<bool>()).prop_map(|(name, attr)| OpNode::BuiltRef {
            kind: if attr { BuiltKind::Attr } else { BuiltKind::Group },
            name: format!("b_{}", name),
        }),
    ]
}

fn binary_operator() -> impl Strategy<Value = BinaryOperator> {
    prop_oneof![
        Just(BinaryOperator::Or),
        Just(BinaryOperator::And),
        Just(BinaryOperator::Equal),
        Just(BinaryOperator::NotEqual),
        Just(BinaryOperator::LessThan),
        Just(BinaryOperator::GreaterThanEqual),
        Just(BinaryOperator::In),
        Just(BinaryOperator::NotIn),
        Just(BinaryOperator::Add),
        Just(BinaryOperator::Subtract),
        Just(BinaryOperator::Multiply),
        Just(BinaryOperator::Divide),
        Just(BinaryOperator::Modulo),
    ]
}

fn expression() -> impl Strategy<Value = OpNode> {
    leaf().prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (binary_operator(), inner.clone(), inner.clone())
                .prop_map(|(op, l, r)| OpNode::binary(op, l, r)),
            inner
                .clone()
                .prop_map(|operand| OpNode::unary(UnaryOperator::Not, operand)),
            leaf().prop_map(|operand| OpNode::unary(UnaryOperator::Neg, operand)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(OpNode::List),
            ("[a-z]{1,5}", prop::collection::vec(inner, 0..3)).prop_map(|(name, args)| {
                OpNode::call(
                    format!("f_{}", name),
                    args.into_iter().map(Argument::Positional).collect(),
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn it_reparses_printed_trees(node in expression()) {
        let printed = node.to_string();
        let reparsed = try_parse_cmd(&printed);
        prop_assert_eq!(reparsed.ok(), Some(node), "printed as {}", printed);
    }
}

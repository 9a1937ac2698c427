use super::super::{core::*, prelude::*};
use crate::ast::{self, Argument, BinaryOperator, OpNode, UnaryOperator};
use crate::tokenizer::{
    keyword::Keyword,
    literal::Literal,
    symbol::{Delimiter, Operator},
    token::Token,
};

pub fn parse_expression() -> impl Parser<Token, OpNode> {
    with_context(lazy(parse_logical_or), "expression")
}

fn fold_binary(first: OpNode, rest: Vec<(BinaryOperator, OpNode)>) -> OpNode {
    rest.into_iter()
        .fold(first, |left, (op, right)| OpNode::binary(op, left, right))
}

fn parse_logical_or() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_logical_and(),
                many(tuple2(parse_operator_or(), parse_logical_and())),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical or",
    )
}

fn parse_logical_and() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_logical_not(),
                many(tuple2(parse_operator_and(), parse_logical_not())),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "logical and",
    )
}

fn parse_logical_not() -> impl Parser<Token, OpNode> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple2(parse_operator_not(), lazy(parse_logical_not)),
                |(op, operand)| OpNode::unary(op, operand),
            )),
            Box::new(parse_comparison()),
        ]),
        "logical not",
    )
}

fn parse_comparison() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_additive(),
                optional(tuple2(parse_operator_comparison(), parse_additive())),
            ),
            |(left, rest)| match rest {
                Some((op, right)) => OpNode::binary(op, left, right),
                None => left,
            },
        ),
        "comparison",
    )
}

fn parse_additive() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_multiplicative(),
                many(tuple2(
                    choice(vec![
                        Box::new(operator(Operator::Plus, BinaryOperator::Add)),
                        Box::new(operator(Operator::Minus, BinaryOperator::Subtract)),
                    ]),
                    parse_multiplicative(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "additive",
    )
}

fn parse_multiplicative() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_unary(),
                many(tuple2(
                    choice(vec![
                        Box::new(operator(Operator::Multiply, BinaryOperator::Multiply)),
                        Box::new(operator(Operator::Divide, BinaryOperator::Divide)),
                        Box::new(operator(Operator::Modulo, BinaryOperator::Modulo)),
                    ]),
                    parse_unary(),
                )),
            ),
            |(first, rest)| fold_binary(first, rest),
        ),
        "multiplicative",
    )
}

fn parse_unary() -> impl Parser<Token, OpNode> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple2(
                    choice(vec![
                        Box::new(map(equal(Token::Operator(Operator::Minus)), |_| {
                            UnaryOperator::Neg
                        })),
                        Box::new(map(equal(Token::Operator(Operator::Plus)), |_| {
                            UnaryOperator::Pos
                        })),
                    ]),
                    lazy(parse_unary),
                ),
                |(op, operand)| OpNode::unary(op, operand),
            )),
            Box::new(parse_atom()),
        ]),
        "unary",
    )
}

fn parse_atom() -> impl Parser<Token, OpNode> {
    with_context(
        choice(vec![
            Box::new(map(parse_literal(), OpNode::Literal)),
            Box::new(parse_built_ref()),
            Box::new(parse_list()),
            Box::new(parse_function_call()),
            Box::new(map(parse_identifier(), OpNode::Ident)),
            Box::new(delimited(
                as_unit(parse_open_paren()),
                lazy(parse_expression),
                as_unit(parse_close_paren()),
            )),
        ]),
        "atom",
    )
}

fn parse_literal() -> impl Parser<Token, ast::Literal> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Literal(Literal::Number(n)) => Some(ast::Literal::Number(*n)),
            Token::Literal(Literal::Str(s)) => Some(ast::Literal::Str(s.clone())),
            Token::Keyword(Keyword::True) => Some(ast::Literal::Bool(true)),
            Token::Keyword(Keyword::False) => Some(ast::Literal::Bool(false)),
            Token::Keyword(Keyword::Null) => Some(ast::Literal::None),
            _ => None,
        }),
        "literal",
    )
}

fn parse_built_ref() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                satisfy(|token: &Token| match token {
                    Token::BuiltRef(kind) => Some(*kind),
                    _ => None,
                }),
                parse_identifier(),
            ),
            |(kind, name)| OpNode::BuiltRef { kind, name },
        ),
        "built block reference",
    )
}

fn parse_list() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            delimited(
                as_unit(equal(Token::Delimiter(Delimiter::OpenBracket))),
                separated_list(lazy(parse_expression), as_unit(parse_comma())),
                as_unit(equal(Token::Delimiter(Delimiter::CloseBracket))),
            ),
            OpNode::List,
        ),
        "list",
    )
}

fn parse_function_call() -> impl Parser<Token, OpNode> {
    with_context(
        map(
            tuple2(
                parse_identifier(),
                delimited(
                    as_unit(parse_open_paren()),
                    separated_list(parse_argument(), as_unit(parse_comma())),
                    as_unit(parse_close_paren()),
                ),
            ),
            |(name, args)| OpNode::call(name, args),
        ),
        "function call",
    )
}

fn parse_argument() -> impl Parser<Token, Argument> {
    with_context(
        choice(vec![
            Box::new(map(
                tuple3(
                    parse_identifier(),
                    equal(Token::Operator(Operator::Assign)),
                    lazy(parse_expression),
                ),
                |(name, _, value)| Argument::Named { name, value },
            )),
            Box::new(map(lazy(parse_expression), Argument::Positional)),
        ]),
        "argument",
    )
}

pub fn parse_identifier() -> impl Parser<Token, String> {
    with_context(
        satisfy(|token: &Token| match token {
            Token::Identifier(s) => Some(s.clone()),
            _ => None,
        }),
        "identifier",
    )
}

fn parse_comma() -> impl Parser<Token, Token> {
    with_context(equal(Token::Delimiter(Delimiter::Comma)), "comma")
}

fn parse_open_paren() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::OpenParen))
}

fn parse_close_paren() -> impl Parser<Token, Token> {
    equal(Token::Delimiter(Delimiter::CloseParen))
}

fn operator(token: Operator, op: BinaryOperator) -> impl Parser<Token, BinaryOperator> {
    map(equal(Token::Operator(token)), move |_| op)
}

fn keyword(word: Keyword, op: BinaryOperator) -> impl Parser<Token, BinaryOperator> {
    map(equal(Token::Keyword(word)), move |_| op)
}

fn parse_operator_or() -> impl Parser<Token, BinaryOperator> {
    choice(vec![
        Box::new(keyword(Keyword::Or, BinaryOperator::Or)),
        Box::new(operator(Operator::Pipe, BinaryOperator::Or)),
    ])
}

fn parse_operator_and() -> impl Parser<Token, BinaryOperator> {
    choice(vec![
        Box::new(keyword(Keyword::And, BinaryOperator::And)),
        Box::new(operator(Operator::Ampersand, BinaryOperator::And)),
    ])
}

fn parse_operator_not() -> impl Parser<Token, UnaryOperator> {
    with_context(
        map(
            choice(vec![
                Box::new(equal(Token::Keyword(Keyword::Not))),
                Box::new(equal(Token::Operator(Operator::Caret))),
                Box::new(equal(Token::Operator(Operator::Tilde))),
            ]),
            |_| UnaryOperator::Not,
        ),
        "not operator",
    )
}

fn parse_operator_comparison() -> impl Parser<Token, BinaryOperator> {
    with_context(
        choice(vec![
            Box::new(operator(Operator::EqualEqual, BinaryOperator::Equal)),
            Box::new(operator(Operator::NotEqual, BinaryOperator::NotEqual)),
            Box::new(operator(Operator::Less, BinaryOperator::LessThan)),
            Box::new(operator(Operator::LessEqual, BinaryOperator::LessThanEqual)),
            Box::new(operator(Operator::Greater, BinaryOperator::GreaterThan)),
            Box::new(operator(Operator::GreaterEqual, BinaryOperator::GreaterThanEqual)),
            Box::new(keyword(Keyword::In, BinaryOperator::In)),
            Box::new(map(
                tuple2(
                    equal(Token::Keyword(Keyword::Not)),
                    equal(Token::Keyword(Keyword::In)),
                ),
                |_| BinaryOperator::NotIn,
            )),
        ]),
        "comparison operator",
    )
}

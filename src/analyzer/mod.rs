//! Token-level parsing of query expressions into [`OpNode`] trees.
//!
//! [`parse_cmd`] is the lenient entry point used by callers that treat a
//! failed parse as a no-op; [`try_parse_cmd`] keeps the underlying error.

pub mod combinators;
pub mod core;
pub mod parsers;
pub mod prelude;

pub use core::ParseError;
pub use core::ParseResult;
pub use core::Parser;

use thiserror::Error;

use crate::ast::OpNode;
use crate::preprocessor::normalize_cmd;
use crate::tokenizer::{Token, Tokenizer, TokenizerError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error("Parse error: {0}")]
    Parser(#[from] ParseError),
    #[error("Unexpected trailing input at token {position}: {found}")]
    TrailingInput { position: usize, found: String },
}

/// Parses a whitespace-free token stream. All tokens must be consumed.
pub fn parse_tokens(tokens: &[Token]) -> Result<OpNode, SyntaxError> {
    let (pos, node) = parsers::parse_expression().parse(tokens, 0)?;
    if pos < tokens.len() {
        let found = tokens[pos..]
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        return Err(SyntaxError::TrailingInput {
            position: pos,
            found,
        });
    }
    Ok(node)
}

pub fn try_parse_cmd(cmd: &str) -> Result<OpNode, SyntaxError> {
    let normalized = normalize_cmd(cmd);
    let tokens: Vec<Token> = Tokenizer::new()
        .tokenize(&normalized)?
        .into_iter()
        .map(|span| span.token)
        .filter(|token| !token.is_whitespace())
        .collect();
    parse_tokens(&tokens)
}

/// Parses `cmd`, returning [`OpNode::NoOp`] when it is malformed.
pub fn parse_cmd(cmd: &str) -> OpNode {
    match try_parse_cmd(cmd) {
        Ok(node) => node,
        Err(e) => {
            tracing::warn!("failed to parse [ {} ]: {}", cmd, e);
            OpNode::NoOp
        }
    }
}

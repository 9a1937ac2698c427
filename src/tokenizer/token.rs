use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    combinator::{recognize, value},
    error::{context, VerboseError},
    sequence::pair,
    IResult,
};
use thiserror::Error;

use super::{
    keyword::Keyword,
    literal::{parse_literal, Literal},
    symbol::{parse_delimiter, parse_operator, Delimiter, Operator},
    whitespace::parse_whitespace,
};
use crate::ast::BuiltKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    Identifier(String),
    /// `attr:` or `group:` prefix of a built-block reference
    BuiltRef(BuiltKind),
    Operator(Operator),
    Delimiter(Delimiter),
    Literal(Literal),
    Whitespace(String),
}

impl Token {
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Token::Whitespace(_))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "{}", k),
            Token::Identifier(id) => write!(f, "{}", id),
            Token::BuiltRef(kind) => write!(f, "{}:", kind),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Delimiter(d) => write!(f, "{}", d),
            Token::Literal(Literal::Number(n)) => write!(f, "{}", n),
            Token::Literal(Literal::Str(s)) => write!(f, "{:?}", s),
            Token::Whitespace(ws) => write!(f, "{}", ws),
        }
    }
}

/// Byte span of a token within the normalized command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct TokenSpan {
    pub token: Token,
    pub span: Span,
}

/// Commands are normalized to a single line before tokenizing, so a byte
/// offset is all the position tracking needed.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    position: usize,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(level = "debug", skip(input))]
    pub fn tokenize(&mut self, input: &str) -> TokenizerResult<Vec<TokenSpan>> {
        let mut tokens = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let start = self.position;
            let (rest, token) = alt((
                parse_whitespace,
                parse_literal,
                parse_built_ref,
                parse_operator,
                parse_delimiter,
                parse_identifier,
            ))(remaining)
            .map_err(|e| {
                let error = TokenizerError::ParseError {
                    message: match e {
                        nom::Err::Incomplete(needed) => format!("Incomplete input, {:?}", needed),
                        nom::Err::Error(e) | nom::Err::Failure(e) => {
                            nom::error::convert_error(remaining, e)
                        }
                    },
                    found: remaining.chars().take(20).collect(),
                    span: Span {
                        start,
                        end: start + remaining.chars().next().map_or(0, char::len_utf8),
                    },
                };
                tracing::debug!("{}", error);
                error
            })?;

            self.position += remaining.len() - rest.len();
            tokens.push(TokenSpan {
                token,
                span: Span {
                    start,
                    end: self.position,
                },
            });
            remaining = rest;
        }

        Ok(tokens)
    }
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_built_ref(input: &str) -> ParserResult<Token> {
    context(
        "built block reference",
        alt((
            value(Token::BuiltRef(BuiltKind::Attr), tag("attr:")),
            value(Token::BuiltRef(BuiltKind::Group), tag("group:")),
        )),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
fn parse_identifier(input: &str) -> ParserResult<Token> {
    let (input, id) = context(
        "identifier",
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
    )(input)?;

    if let Some(kw) = Keyword::lookup(id) {
        return Ok((input, Token::Keyword(kw)));
    }

    Ok((input, Token::Identifier(id.to_string())))
}

pub type ParserResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub type TokenizerResult<T> = Result<T, TokenizerError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenizerError {
    #[error("Tokenize error: {message}, found: {found}, at {span}")]
    ParseError {
        message: String,
        found: String,
        span: Span,
    },
}

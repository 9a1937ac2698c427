//! # Symbol Token Handling
//!
//! Operators and delimiters of the query language. Symbols are matched with a
//! longest-match order so that `<=` is never split into `<` and `=`.
//!
//! Several operators have a symbolic and a word spelling: `^`/`~` for `not`,
//! `&` for `and` and `|` for `or`. The word spellings are keywords; the parser
//! accepts both.

use strum_macros::{AsRefStr, Display, EnumString};

use nom::{
    branch::alt,
    bytes::complete::tag,
    combinator::{map, value},
    error::context,
};

use super::token::{ParserResult, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Operator {
    #[strum(serialize = "==")]
    EqualEqual,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    /// Keyword argument binding (`=`)
    #[strum(serialize = "=")]
    Assign,
    #[strum(serialize = "^")]
    Caret,
    #[strum(serialize = "~")]
    Tilde,
    #[strum(serialize = "&")]
    Ampersand,
    #[strum(serialize = "|")]
    Pipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
pub enum Delimiter {
    #[strum(serialize = "(")]
    OpenParen,
    #[strum(serialize = ")")]
    CloseParen,
    #[strum(serialize = "[")]
    OpenBracket,
    #[strum(serialize = "]")]
    CloseBracket,
    #[strum(serialize = ",")]
    Comma,
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_operator(input: &str) -> ParserResult<Token> {
    context(
        "operator",
        map(
            alt((
                value(Operator::EqualEqual, tag("==")),
                value(Operator::NotEqual, tag("!=")),
                value(Operator::LessEqual, tag("<=")),
                value(Operator::GreaterEqual, tag(">=")),
                value(Operator::Less, tag("<")),
                value(Operator::Greater, tag(">")),
                value(Operator::Plus, tag("+")),
                value(Operator::Minus, tag("-")),
                value(Operator::Multiply, tag("*")),
                value(Operator::Divide, tag("/")),
                value(Operator::Modulo, tag("%")),
                value(Operator::Assign, tag("=")),
                value(Operator::Caret, tag("^")),
                value(Operator::Tilde, tag("~")),
                value(Operator::Ampersand, tag("&")),
                value(Operator::Pipe, tag("|")),
            )),
            Token::Operator,
        ),
    )(input)
}

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_delimiter(input: &str) -> ParserResult<Token> {
    context(
        "delimiter",
        map(
            alt((
                value(Delimiter::OpenParen, tag("(")),
                value(Delimiter::CloseParen, tag(")")),
                value(Delimiter::OpenBracket, tag("[")),
                value(Delimiter::CloseBracket, tag("]")),
                value(Delimiter::Comma, tag(",")),
            )),
            Token::Delimiter,
        ),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_match() {
        let (rest, token) = parse_operator("<= 3").unwrap();
        assert_eq!(token, Token::Operator(Operator::LessEqual));
        assert_eq!(rest, " 3");

        let (rest, token) = parse_operator("== x").unwrap();
        assert_eq!(token, Token::Operator(Operator::EqualEqual));
        assert_eq!(rest, " x");

        let (_, token) = parse_operator("=x").unwrap();
        assert_eq!(token, Token::Operator(Operator::Assign));
    }

    #[test]
    fn test_delimiters() {
        let (rest, token) = parse_delimiter("[1]").unwrap();
        assert_eq!(token, Token::Delimiter(Delimiter::OpenBracket));
        assert_eq!(rest, "1]");
        assert!(parse_delimiter("x").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        assert_eq!(Operator::Modulo.to_string(), "%");
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEqual);
    }
}

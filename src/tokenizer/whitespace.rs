//! # Whitespace Token Handling
//!
//! Commands are normalized to a single line before tokenizing, so only spaces
//! and tabs are recognized here. Whitespace tokens are kept in the token stream
//! for accurate spans and dropped before parsing.

use nom::{bytes::complete::take_while1, combinator::map, error::context};

use super::token::{ParserResult, Token};

#[tracing::instrument(level = "debug", skip(input))]
pub fn parse_whitespace(input: &str) -> ParserResult<Token> {
    context(
        "whitespace expected",
        map(take_while1(|c: char| c == ' ' || c == '\t'), |ws: &str| {
            Token::Whitespace(ws.to_string())
        }),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace() {
        let (rest, token) = parse_whitespace("  \tlength").unwrap();
        assert_eq!(token, Token::Whitespace("  \t".to_string()));
        assert_eq!(rest, "length");
    }

    #[test]
    fn test_error() {
        assert!(parse_whitespace("length").is_err());
    }
}

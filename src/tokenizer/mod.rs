//! # Tokenizer
//!
//! Turns normalized command text into a flat list of [`token::TokenSpan`]s.
//! Every sub-module contributes one nom parser for a token family; the
//! [`token::Tokenizer`] loop tries them in order and tracks positions.

pub mod keyword;
pub mod literal;
pub mod symbol;
pub mod token;
pub mod whitespace;

pub use token::{Span, Token, TokenSpan, Tokenizer, TokenizerError};

pub mod expression;

pub use expression::{parse_expression, parse_identifier};

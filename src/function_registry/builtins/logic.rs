use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValueError;
use crate::eval::Value;
use crate::function_registry::{BoundArgs, CallEnv};

use super::{doc_of, to_list};

lazy_static! {
    static ref NUMBER: Regex =
        Regex::new(r"^\s*[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?\s*$").expect("static regex");
}

/// Returns its argument. The `rewrite` keyword is consumed by the caller.
pub fn apply(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    Ok(args.get("func").clone())
}

pub fn has_any(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let container = to_list(args.get("container"));
    let found = to_list(args.get("contained"))
        .iter()
        .any(|item| container.contains(item));
    Ok(Value::Bool(found))
}

pub fn has_all(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let container = to_list(args.get("container"));
    let found = to_list(args.get("contained"))
        .iter()
        .all(|item| container.contains(item));
    Ok(Value::Bool(found))
}

pub fn count(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    Ok(Value::from(to_list(args.get("vars")).len()))
}

/// Numeric reading of one value: numbers, numeric strings and single-token
/// numeric documents.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Str(s) if NUMBER.is_match(s) => s.trim().parse().ok(),
        Value::Handle(_) => match doc_of(value) {
            Some(doc) if doc.len() == 1 && NUMBER.is_match(&doc.tokens[0].text) => {
                doc.tokens[0].text.parse().ok()
            }
            _ => None,
        },
        _ => None,
    }
}

pub fn is_digit(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    match args.get("target") {
        Value::Null => Err(args.invalid("no input")),
        Value::List(items) => Ok(Value::Bool(items.iter().any(|i| number_of(i).is_some()))),
        other => Ok(Value::Bool(number_of(other).is_some())),
    }
}

/// Number parsed from the input, or null when it has none. For a list, the
/// number with the largest magnitude.
pub fn digitize(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let found = match args.get("target") {
        Value::List(items) => items
            .iter()
            .filter_map(number_of)
            .fold(None, |best: Option<f64>, n| match best {
                Some(b) if b.abs() >= n.abs() => Some(b),
                _ => Some(n),
            }),
        other => number_of(other),
    };
    Ok(found.map(Value::Number).unwrap_or_default())
}

/// Clamps a number to `[min_value, max_value]`.
pub fn truncate(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let value = args.get("value");
    if value.is_null() {
        return Ok(Value::Null);
    }
    let value = number_of(value)
        .ok_or_else(|| args.invalid(format!("invalid value input: {}", value)))?;
    let (min, max) = match (number_of(args.get("min_value")), number_of(args.get("max_value"))) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Err(args.invalid(format!(
                "invalid range input: {}, {}",
                args.get("min_value"),
                args.get("max_value")
            )))
        }
    };
    let clamped = if value > max {
        max
    } else if value < min {
        min
    } else {
        value
    };
    Ok(Value::Number(clamped))
}

pub fn abs_num(args: &BoundArgs, _env: &CallEnv) -> Result<Value, ValueError> {
    let number = args.get("number");
    number_of(number)
        .map(|n| Value::Number(n.abs()))
        .ok_or_else(|| args.invalid(format!("invalid value input: {}", number)))
}

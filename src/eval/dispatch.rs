//! Binary operator dispatch on `(operator, lhs tag, rhs tag)`.

use std::cmp::Ordering;
use std::collections::HashMap;

use lazy_static::lazy_static;
use strum::IntoEnumIterator;

use crate::ast::BinaryOperator;
use crate::error::ValueError;

use super::value::{Value, ValueTag};

pub type Kernel = fn(&Value, &Value) -> Result<Value, ValueError>;

type DispatchKey = (BinaryOperator, ValueTag, ValueTag);

const NUMERIC: [ValueTag; 2] = [ValueTag::Number, ValueTag::Bool];

const ARITHMETIC: [BinaryOperator; 5] = [
    BinaryOperator::Add,
    BinaryOperator::Subtract,
    BinaryOperator::Multiply,
    BinaryOperator::Divide,
    BinaryOperator::Modulo,
];

const ORDERING: [BinaryOperator; 4] = [
    BinaryOperator::LessThan,
    BinaryOperator::LessThanEqual,
    BinaryOperator::GreaterThan,
    BinaryOperator::GreaterThanEqual,
];

lazy_static! {
    static ref DISPATCH: HashMap<DispatchKey, Kernel> = build_table();
}

fn build_table() -> HashMap<DispatchKey, Kernel> {
    let mut table: HashMap<DispatchKey, Kernel> = HashMap::new();
    for lhs in ValueTag::iter() {
        for rhs in ValueTag::iter() {
            table.insert((BinaryOperator::Equal, lhs, rhs), equal);
            table.insert((BinaryOperator::NotEqual, lhs, rhs), not_equal);
        }
    }
    for lhs in NUMERIC {
        for rhs in NUMERIC {
            for op in ARITHMETIC {
                table.insert((op, lhs, rhs), arithmetic_kernel(op));
            }
            for op in ORDERING {
                table.insert((op, lhs, rhs), numeric_ordering_kernel(op));
            }
        }
    }
    table.insert((BinaryOperator::Add, ValueTag::Str, ValueTag::Str), concat_str);
    table.insert((BinaryOperator::Add, ValueTag::List, ValueTag::List), concat_list);
    for op in ORDERING {
        table.insert((op, ValueTag::Str, ValueTag::Str), str_ordering_kernel(op));
    }
    tracing::debug!("dispatch table built with {} kernels", table.len());
    table
}

/// Applies `op` to two evaluated operands. Logical and containment
/// operators are handled by the evaluator and never reach the table.
pub fn dispatch(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    match DISPATCH.get(&(op, lhs.tag(), rhs.tag())) {
        Some(kernel) => kernel(lhs, rhs),
        None if op.is_comparison() => Ok(Value::Bool(false)),
        None => Err(ValueError::type_mismatch(format!(
            "unsupported operand types for [ {} ]: {} and {}",
            op,
            lhs.tag(),
            rhs.tag()
        ))),
    }
}

fn numbers(lhs: &Value, rhs: &Value) -> Result<(f64, f64), ValueError> {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(ValueError::type_mismatch(format!(
            "expected numbers, got {} and {}",
            lhs.tag(),
            rhs.tag()
        ))),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn equal(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    Ok(Value::Bool(values_equal(lhs, rhs)))
}

fn not_equal(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    Ok(Value::Bool(!values_equal(lhs, rhs)))
}

fn add(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    Ok(Value::Number(a + b))
}

fn subtract(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    Ok(Value::Number(a - b))
}

fn multiply(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    Ok(Value::Number(a * b))
}

fn divide(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    if b == 0.0 {
        return Err(ValueError::type_mismatch("division by zero"));
    }
    Ok(Value::Number(a / b))
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    if b == 0.0 {
        return Err(ValueError::type_mismatch("modulo by zero"));
    }
    Ok(Value::Number(a - b * (a / b).floor()))
}

fn arithmetic_kernel(op: BinaryOperator) -> Kernel {
    match op {
        BinaryOperator::Add => add,
        BinaryOperator::Subtract => subtract,
        BinaryOperator::Multiply => multiply,
        BinaryOperator::Divide => divide,
        _ => modulo,
    }
}

fn ordering_result(op: BinaryOperator, ordering: Option<Ordering>) -> Value {
    let holds = match (op, ordering) {
        (_, None) => false,
        (BinaryOperator::LessThan, Some(o)) => o == Ordering::Less,
        (BinaryOperator::LessThanEqual, Some(o)) => o != Ordering::Greater,
        (BinaryOperator::GreaterThan, Some(o)) => o == Ordering::Greater,
        (BinaryOperator::GreaterThanEqual, Some(o)) => o != Ordering::Less,
        _ => false,
    };
    Value::Bool(holds)
}

fn numeric_ordering(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    let (a, b) = numbers(lhs, rhs)?;
    Ok(ordering_result(op, a.partial_cmp(&b)))
}

fn str_ordering(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    match (lhs.as_str(), rhs.as_str()) {
        (Some(a), Some(b)) => Ok(ordering_result(op, Some(a.cmp(b)))),
        _ => Err(ValueError::type_mismatch("expected strings")),
    }
}

fn numeric_ordering_kernel(op: BinaryOperator) -> Kernel {
    match op {
        BinaryOperator::LessThan => {
            |l: &Value, r: &Value| numeric_ordering(BinaryOperator::LessThan, l, r)
        }
        BinaryOperator::LessThanEqual => {
            |l: &Value, r: &Value| numeric_ordering(BinaryOperator::LessThanEqual, l, r)
        }
        BinaryOperator::GreaterThan => {
            |l: &Value, r: &Value| numeric_ordering(BinaryOperator::GreaterThan, l, r)
        }
        _ => |l: &Value, r: &Value| numeric_ordering(BinaryOperator::GreaterThanEqual, l, r),
    }
}

fn str_ordering_kernel(op: BinaryOperator) -> Kernel {
    match op {
        BinaryOperator::LessThan => {
            |l: &Value, r: &Value| str_ordering(BinaryOperator::LessThan, l, r)
        }
        BinaryOperator::LessThanEqual => {
            |l: &Value, r: &Value| str_ordering(BinaryOperator::LessThanEqual, l, r)
        }
        BinaryOperator::GreaterThan => {
            |l: &Value, r: &Value| str_ordering(BinaryOperator::GreaterThan, l, r)
        }
        _ => |l: &Value, r: &Value| str_ordering(BinaryOperator::GreaterThanEqual, l, r),
    }
}

fn concat_str(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        _ => Err(ValueError::type_mismatch("expected strings")),
    }
}

fn concat_list(lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
    match (lhs, rhs) {
        (Value::List(a), Value::List(b)) => Ok(Value::List(a.iter().chain(b).cloned().collect())),
        _ => Err(ValueError::type_mismatch("expected lists")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let n = Value::Number;
        assert_eq!(dispatch(BinaryOperator::Add, &n(2.0), &n(3.0)).unwrap(), n(5.0));
        assert_eq!(dispatch(BinaryOperator::Modulo, &n(-7.0), &n(3.0)).unwrap(), n(2.0));
        assert_eq!(
            dispatch(BinaryOperator::Add, &Value::Bool(true), &n(1.0)).unwrap(),
            n(2.0)
        );
        assert!(matches!(
            dispatch(BinaryOperator::Divide, &n(1.0), &n(0.0)),
            Err(ValueError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_comparisons() {
        let n = Value::Number;
        assert_eq!(
            dispatch(BinaryOperator::GreaterThan, &n(5.0), &n(4.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dispatch(BinaryOperator::Equal, &Value::Bool(true), &n(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dispatch(BinaryOperator::LessThan, &Value::from("a"), &Value::from("b")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            dispatch(BinaryOperator::NotEqual, &Value::Null, &Value::from("x")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_missing_entries() {
        assert_eq!(
            dispatch(BinaryOperator::LessThan, &Value::Null, &Value::Number(1.0)).unwrap(),
            Value::Bool(false)
        );
        assert!(matches!(
            dispatch(BinaryOperator::Subtract, &Value::from("a"), &Value::Number(1.0)),
            Err(ValueError::TypeMismatch(_))
        ));
        assert_eq!(
            dispatch(BinaryOperator::Add, &Value::from("a"), &Value::from("b")).unwrap(),
            Value::from("ab")
        );
    }
}

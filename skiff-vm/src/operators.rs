// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Binary-operator evaluator.
//!
//! Pure functions over two values, dispatched on the (kind, kind) pair.
//! Only Int and Double combinations are defined (bitwise-or is Int only);
//! anything else raises a typed error naming the operator and rendering
//! both operands.

use crate::value::Value;
use crate::vm::error::{Result, RuntimeError};

/// Equality over numeric kinds. Int/int compares exactly; any comparison
/// involving a double is the literal `|a - b| < 0` check.
pub fn equal(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a == b)),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Bool((*a as f64 - b).abs() < 0.0)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Bool((a - *b as f64).abs() < 0.0)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Bool((a - b).abs() < 0.0)),
        _ => Err(unsupported("eq", a, b)),
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 + b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a + *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a + b)),
        _ => Err(unsupported("add", a, b)),
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 - b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a - *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a - b)),
        _ => Err(unsupported("sub", a, b)),
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 * b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a * *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a * b)),
        _ => Err(unsupported("mul", a, b)),
    }
}

pub fn div(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Int(a / b))
            }
        }
        (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 / b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a / *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a / b)),
        _ => Err(unsupported("div", a, b)),
    }
}

pub fn modulo(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                Err(RuntimeError::DivisionByZero)
            } else {
                Ok(Value::Int(a % b))
            }
        }
        (Value::Int(a), Value::Double(b)) => Ok(Value::Double(*a as f64 % b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Double(a % *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Double(a % b)),
        _ => Err(unsupported("mod", a, b)),
    }
}

pub fn less_than(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Bool((*a as f64) < *b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Bool(*a < *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Bool(a < b)),
        _ => Err(unsupported("lt", a, b)),
    }
}

pub fn less_than_or_equal(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Bool(*a as f64 <= *b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Bool(*a <= *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Bool(a <= b)),
        _ => Err(unsupported("lte", a, b)),
    }
}

pub fn greater_than(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Bool(*a as f64 > *b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Bool(*a > *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Bool(a > b)),
        _ => Err(unsupported("gt", a, b)),
    }
}

pub fn greater_than_or_equal(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
        (Value::Int(a), Value::Double(b)) => Ok(Value::Bool(*a as f64 >= *b)),
        (Value::Double(a), Value::Int(b)) => Ok(Value::Bool(*a >= *b as f64)),
        (Value::Double(a), Value::Double(b)) => Ok(Value::Bool(a >= b)),
        _ => Err(unsupported("gte", a, b)),
    }
}

pub fn bitwise_or(a: &Value, b: &Value) -> Result<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
        _ => Err(unsupported("bitwise_or", a, b)),
    }
}

fn unsupported(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::OperationNotSupported {
        op: op.to_string(),
        left: a.to_string(),
        right: b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_promotes_to_double() {
        assert!(matches!(
            add(&Value::Int(1), &Value::Double(2.5)).unwrap(),
            Value::Double(v) if v == 3.5
        ));
        assert!(matches!(
            mul(&Value::Int(3), &Value::Int(4)).unwrap(),
            Value::Int(12)
        ));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(
            div(&Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        ));
        assert!(matches!(
            modulo(&Value::Int(1), &Value::Int(0)),
            Err(RuntimeError::DivisionByZero)
        ));
    }

    #[test]
    fn unsupported_pairs_name_operator_and_operands() {
        let err = add(&Value::Bool(true), &Value::Int(1)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("add"));
        assert!(message.contains("true"));
        assert!(message.contains("1"));
    }

    #[test]
    fn mixed_equality_is_the_exact_zero_check() {
        // `|a - b| < 0` is never true for a positive difference, and the
        // int/int path still compares exactly.
        assert!(matches!(
            equal(&Value::Int(2), &Value::Int(2)).unwrap(),
            Value::Bool(true)
        ));
        assert!(matches!(
            equal(&Value::Double(2.0), &Value::Double(2.0)).unwrap(),
            Value::Bool(false)
        ));
        assert!(matches!(
            equal(&Value::Int(2), &Value::Double(2.0)).unwrap(),
            Value::Bool(false)
        ));
    }
}

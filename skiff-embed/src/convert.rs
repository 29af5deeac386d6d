// skiff-embed - Value conversion
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Conversions between Rust values and Skiff [`Value`]s.

use skiff_vm::value::RefValue;
use skiff_vm::Value;

/// Convert a Rust value into a Skiff value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(self as i64)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::list(self.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Convert a Skiff value into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(i) => Ok(*i),
            other => Err(format!("Expected Int, got {}", other.type_name())),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Double(d) => Ok(*d),
            Value::Int(i) => Ok(*i as f64),
            other => Err(format!("Expected Double, got {}", other.type_name())),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(format!("Expected Bool, got {}", other.type_name())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Ref(r) => match r.as_ref() {
                RefValue::Str(s) => Ok(s.clone()),
                other => Err(format!("Expected String, got {}", other.type_name())),
            },
            other => Err(format!("Expected String, got {}", other.type_name())),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Ref(r) => match r.as_ref() {
                RefValue::List(items) | RefValue::Array(items) => {
                    items.borrow().iter().map(T::from_value).collect()
                }
                other => Err(format!("Expected List, got {}", other.type_name())),
            },
            other => Err(format!("Expected List, got {}", other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        assert_eq!(i64::from_value(&42i64.into_value()).unwrap(), 42);
        assert_eq!(f64::from_value(&1.5f64.into_value()).unwrap(), 1.5);
        assert!(bool::from_value(&true.into_value()).unwrap());
        assert_eq!(
            String::from_value(&"hi".into_value()).unwrap(),
            "hi".to_string()
        );
    }

    #[test]
    fn lists_convert_elementwise() {
        let value = vec![1i64, 2, 3].into_value();
        let back: Vec<i64> = Vec::from_value(&value).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn mismatches_report_the_actual_type() {
        let err = i64::from_value(&Value::Bool(true)).unwrap_err();
        assert!(err.contains("Bool"));
    }
}

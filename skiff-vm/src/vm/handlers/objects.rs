// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Object, field, and union handlers.

use std::rc::Rc;

use crate::opcode::OpCode;
use crate::value::{values_equal, ObjectInstance, RefValue, Value};
use crate::vm::{Interpreter, Result, RuntimeError};

impl Interpreter<'_> {
    /// Execute an object/field/union opcode.
    pub(crate) fn execute_objects(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::Construct => {
                let index = self.read_int()? as usize;
                let descriptor = match self.constant(index)? {
                    Value::Ref(r) => match r.as_ref() {
                        RefValue::Type(t) => Rc::clone(t),
                        other => {
                            return Err(RuntimeError::Internal(format!(
                                "Construct constant is not a type: {}",
                                other.type_name()
                            )))
                        }
                    },
                    _ => {
                        return Err(RuntimeError::Internal(
                            "Construct constant is not a type".into(),
                        ))
                    }
                };
                self.stack.push(Value::from_ref(RefValue::Object(
                    ObjectInstance::new(descriptor),
                )));
            }

            OpCode::GetField => {
                let index = self.read_int()? as usize;
                let field = self.constant_name(index)?;
                let subject = self.stack.pop()?;
                let value = self.get_field(&subject, &field)?;
                self.stack.push(value);
            }

            OpCode::SetField => {
                let index = self.read_int()? as usize;
                let field = self.constant_name(index)?;
                let value = self.stack.pop()?;
                let target = self.stack.pop()?;
                self.set_field(&target, &field, value)?;
            }

            OpCode::Compare => {
                let pattern = self.stack.pop()?;
                let subject = self.stack.pop()?;
                self.stack.push(Value::Bool(compare(&subject, &pattern)));
            }

            OpCode::TryUnwrap => {
                let top = self.stack.peek(0)?;
                if let Value::Ref(r) = &top {
                    if let RefValue::Union(u) = r.as_ref() {
                        if u.union.name == "Result" {
                            if u.variant == 0 {
                                let inner = u.values.first().cloned().unwrap_or(Value::Null);
                                self.stack.swap_top(inner)?;
                            } else {
                                let rendered = u
                                    .values
                                    .first()
                                    .map(|v| v.to_string())
                                    .unwrap_or_else(|| "Err".into());
                                return Err(RuntimeError::UnwrapFailed(rendered));
                            }
                        }
                    }
                }
            }

            OpCode::UnwrapUnion => {
                let value = self.stack.pop()?;
                match &value {
                    Value::Ref(r) => match r.as_ref() {
                        RefValue::Union(u) => {
                            let inner = u.values.first().cloned().unwrap_or(Value::Null);
                            self.stack.push(inner);
                        }
                        other => {
                            return Err(RuntimeError::Internal(format!(
                                "UnwrapUnion on non-union {}",
                                other.type_name()
                            )))
                        }
                    },
                    other => {
                        return Err(RuntimeError::Internal(format!(
                            "UnwrapUnion on non-union {}",
                            other.type_name()
                        )))
                    }
                }
            }

            other => {
                return Err(RuntimeError::Internal(format!(
                    "execute_objects: unexpected opcode {:?}",
                    other
                )))
            }
        }

        Ok(())
    }

    fn constant_name(&self, index: usize) -> Result<String> {
        match self.constant(index)? {
            Value::Ref(r) => match r.as_ref() {
                RefValue::Str(s) => Ok(s.clone()),
                other => Err(RuntimeError::Internal(format!(
                    "Field name constant is not a string: {}",
                    other.type_name()
                ))),
            },
            _ => Err(RuntimeError::Internal(
                "Field name constant is not a string".into(),
            )),
        }
    }

    /// Field read dispatched over the receiver's variant: object fields,
    /// then methods (bound to the receiver); union payload fields by name;
    /// `len` on strings, arrays, lists, and ranges.
    fn get_field(&self, subject: &Value, field: &str) -> Result<Value> {
        let reference = match subject {
            Value::Ref(r) => r,
            other => {
                return Err(RuntimeError::UndefinedField {
                    type_name: other.type_name(),
                    field: field.to_string(),
                })
            }
        };

        match reference.as_ref() {
            RefValue::Object(object) => {
                if let Some(value) = object.fields.borrow().get(field) {
                    return Ok(value.clone());
                }
                if let Some(method) = object.ty.method(field) {
                    return Ok(Value::from_ref(RefValue::BoundMethod(
                        crate::function::BoundMethod {
                            receiver: subject.clone(),
                            function: method,
                        },
                    )));
                }
                Err(RuntimeError::UndefinedField {
                    type_name: object.ty.name.clone(),
                    field: field.to_string(),
                })
            }

            RefValue::Union(u) => {
                let variant = &u.union.variants[u.variant];
                match variant.fields.iter().position(|f| f == field) {
                    Some(position) => Ok(u.values.get(position).cloned().unwrap_or(Value::Null)),
                    None => Err(RuntimeError::UndefinedField {
                        type_name: u.union.name.clone(),
                        field: field.to_string(),
                    }),
                }
            }

            RefValue::Str(s) if field == "len" => Ok(Value::Int(s.chars().count() as i64)),
            RefValue::Array(items) | RefValue::List(items) if field == "len" => {
                Ok(Value::Int(items.borrow().len() as i64))
            }
            RefValue::Range(range) if field == "len" => Ok(Value::Int(range.len())),

            RefValue::Type(t) => match t.method(field) {
                Some(method) => Ok(Value::from_ref(RefValue::Function(method))),
                None => Err(RuntimeError::UndefinedField {
                    type_name: t.name.clone(),
                    field: field.to_string(),
                }),
            },

            other => Err(RuntimeError::UndefinedField {
                type_name: other.type_name(),
                field: field.to_string(),
            }),
        }
    }

    fn set_field(&self, target: &Value, field: &str, value: Value) -> Result<()> {
        match target {
            Value::Ref(r) => match r.as_ref() {
                RefValue::Object(object) => {
                    object.fields.borrow_mut().insert(field.to_string(), value);
                    Ok(())
                }
                other => Err(RuntimeError::UndefinedField {
                    type_name: other.type_name(),
                    field: field.to_string(),
                }),
            },
            other => Err(RuntimeError::UndefinedField {
                type_name: other.type_name(),
                field: field.to_string(),
            }),
        }
    }
}

/// `is`/match-arm comparison: a type or variant test when the pattern is a
/// descriptor or constructor, structural equality otherwise.
fn compare(subject: &Value, pattern: &Value) -> bool {
    if let Value::Ref(p) = pattern {
        match p.as_ref() {
            RefValue::Type(expected) => {
                return match subject {
                    Value::Ref(s) => match s.as_ref() {
                        RefValue::Object(object) => Rc::ptr_eq(&object.ty, expected),
                        _ => false,
                    },
                    _ => false,
                };
            }
            RefValue::UnionType(expected) => {
                return match subject {
                    Value::Ref(s) => match s.as_ref() {
                        RefValue::Union(u) => Rc::ptr_eq(&u.union, expected),
                        _ => false,
                    },
                    _ => false,
                };
            }
            RefValue::VariantCtor { union, variant } => {
                return match subject {
                    Value::Ref(s) => match s.as_ref() {
                        RefValue::Union(u) => Rc::ptr_eq(&u.union, union) && u.variant == *variant,
                        _ => false,
                    },
                    _ => false,
                };
            }
            // A nullary variant pattern is a union value; when the subject
            // is a union of the same variant, match on the variant alone.
            RefValue::Union(pattern_union) if pattern_union.values.is_empty() => {
                if let Value::Ref(s) = subject {
                    if let RefValue::Union(u) = s.as_ref() {
                        return Rc::ptr_eq(&u.union, &pattern_union.union)
                            && u.variant == pattern_union.variant;
                    }
                }
                return false;
            }
            _ => {}
        }
    }

    values_equal(subject, pattern)
}

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Indexing and value-construction handlers.
//!
//! Out-of-range reads yield a wrapped `None`, out-of-range writes a wrapped
//! `Err`: indexing failure is data, not a structural error. Non-indexable
//! receivers propagate.

use crate::opcode::OpCode;
use crate::value::{RefValue, Value};
use crate::vm::{Interpreter, Result, RuntimeError};

impl Interpreter<'_> {
    /// Execute an indexing or construction opcode.
    pub(crate) fn execute_indexing(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::IndexGet => {
                let index = self.stack.pop()?;
                let subject = self.stack.pop()?;
                let result = self.index_get(&subject, &index)?;
                self.stack.push(result);
            }

            OpCode::IndexSet => {
                let index = self.stack.pop()?;
                let value = self.stack.pop()?;
                let subject = self.stack.pop()?;
                let result = self.index_set(&subject, &index, value)?;
                self.stack.push(result);
            }

            OpCode::IndexGetDirect => {
                let index = self.stack.pop()?;
                let subject = self.stack.pop()?;
                let item = self.index_get_direct(&subject, &index)?;
                self.stack.push(item);
            }

            OpCode::NewArray => {
                let _element_type = self.stack.pop()?;
                let size = match self.stack.pop()? {
                    Value::Int(size) if size >= 0 => size as usize,
                    other => {
                        return Err(RuntimeError::Internal(format!(
                            "Array size must be a non-negative Int, got {}",
                            other
                        )))
                    }
                };
                self.stack.push(Value::array(vec![Value::Null; size]));
            }

            OpCode::NewList => {
                let count = self.read_int()? as usize;
                let mut items = vec![Value::Null; count];
                for i in (0..count).rev() {
                    items[i] = self.stack.pop()?;
                }
                self.stack.push(Value::list(items));
            }

            OpCode::NewString => {
                let length = self.read_int()? as usize;
                self.stack.push(Value::string(" ".repeat(length)));
            }

            OpCode::NewInt => {
                let value = self.read_int()?;
                self.stack.push(Value::Int(value as i64));
            }

            OpCode::NewDouble => {
                let value = self.read_int()?;
                self.stack.push(Value::Double(value as f64));
            }

            other => {
                return Err(RuntimeError::Internal(format!(
                    "execute_indexing: unexpected opcode {:?}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// IndexGet: Some(item) in bounds, None out of bounds.
    fn index_get(&self, subject: &Value, index: &Value) -> Result<Value> {
        let reference = match subject {
            Value::Ref(r) => r,
            other => return Err(RuntimeError::NotIndexable(other.type_name())),
        };

        match (reference.as_ref(), index) {
            (RefValue::Array(items), Value::Int(i)) | (RefValue::List(items), Value::Int(i)) => {
                let items = items.borrow();
                match usize::try_from(*i).ok().and_then(|i| items.get(i)) {
                    Some(item) => Ok(self.make_some(item.clone())),
                    None => Ok(self.make_none()),
                }
            }

            (RefValue::Str(s), Value::Int(i)) => {
                match usize::try_from(*i).ok().and_then(|i| s.chars().nth(i)) {
                    Some(c) => Ok(self.make_some(Value::string(c.to_string()))),
                    None => Ok(self.make_none()),
                }
            }

            (RefValue::Range(range), Value::Int(i)) => match range.get(*i) {
                Some(v) => Ok(self.make_some(Value::Int(v))),
                None => Ok(self.make_none()),
            },

            _ => Err(RuntimeError::NotIndexable(subject.type_name())),
        }
    }

    /// IndexSet: Ok(value) on success, Err(message) out of bounds; the
    /// receiver is left unmodified on failure.
    fn index_set(&self, subject: &Value, index: &Value, value: Value) -> Result<Value> {
        let reference = match subject {
            Value::Ref(r) => r,
            other => return Err(RuntimeError::NotIndexable(other.type_name())),
        };

        match (reference.as_ref(), index) {
            (RefValue::Array(items), Value::Int(i)) | (RefValue::List(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                let length = items.len();
                match usize::try_from(*i).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value.clone();
                        Ok(self.make_ok(value))
                    }
                    None => Ok(self.make_err(Value::string(format!(
                        "Index {} out of range for length {}",
                        i, length
                    )))),
                }
            }

            _ => Err(RuntimeError::NotIndexable(subject.type_name())),
        }
    }

    /// Raw element access for compiler-generated loops; bounds are the
    /// emitting compiler's responsibility.
    fn index_get_direct(&self, subject: &Value, index: &Value) -> Result<Value> {
        let i = match index {
            Value::Int(i) => *i,
            other => {
                return Err(RuntimeError::Internal(format!(
                    "IndexGetDirect index must be Int, got {}",
                    other.type_name()
                )))
            }
        };

        let reference = match subject {
            Value::Ref(r) => r,
            other => return Err(RuntimeError::NotIndexable(other.type_name())),
        };

        match reference.as_ref() {
            RefValue::Array(items) | RefValue::List(items) => usize::try_from(i)
                .ok()
                .and_then(|i| items.borrow().get(i).cloned())
                .ok_or_else(|| {
                    RuntimeError::Internal(format!("IndexGetDirect out of bounds: {}", i))
                }),

            RefValue::Str(s) => usize::try_from(i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| {
                    RuntimeError::Internal(format!("IndexGetDirect out of bounds: {}", i))
                }),

            RefValue::Range(range) => range.get(i).map(Value::Int).ok_or_else(|| {
                RuntimeError::Internal(format!("IndexGetDirect out of bounds: {}", i))
            }),

            _ => Err(RuntimeError::NotIndexable(subject.type_name())),
        }
    }
}

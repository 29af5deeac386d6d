// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Function primitives: compiled user functions, closures, captured-variable
//! cells, and the foreign-function bridge.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::chunk::Chunk;
use crate::value::Value;

/// A parameter descriptor on a compiled function.
#[derive(Debug, Clone)]
pub struct UserFunctionParam {
    pub name: String,
    pub ty: String,
}

/// A compiled user function. Immutable once constructed; stored as a chunk
/// constant or a global, never copied.
#[derive(Debug)]
pub struct UserFunction {
    pub name: String,
    /// Declaring type for methods.
    pub parent_type: Option<String>,
    pub params: Vec<UserFunctionParam>,
    pub return_type: Option<String>,
    /// Local slots the frame needs (parameters included).
    pub local_count: usize,
    pub chunk: Chunk,
}

impl UserFunction {
    /// Create a function with no parameters, used for scripts.
    pub fn script(chunk: Chunk, local_count: usize) -> Self {
        Self {
            name: "<script>".into(),
            parent_type: None,
            params: Vec::new(),
            return_type: None,
            local_count,
            chunk,
        }
    }
}

impl fmt::Display for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent_type {
            write!(f, "{}.", parent)?;
        }
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
        }
        write!(f, ")")?;
        if let Some(ret) = &self.return_type {
            write!(f, ": {}", ret)?;
        }
        Ok(())
    }
}

/// A shared, mutable box around one captured value.
///
/// Shared by the enclosing scope and every closure that captures the
/// variable; lives as long as the longest-lived holder. Once a local slot
/// is promoted to a cell, all reads and writes of that slot go through it.
#[derive(Debug)]
pub struct UpvalueCell {
    value: RefCell<Value>,
}

impl UpvalueCell {
    /// Box a value into a fresh cell.
    pub fn new(value: Value) -> Rc<Self> {
        Rc::new(Self {
            value: RefCell::new(value),
        })
    }

    /// Read the cell's current value.
    pub fn get(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Replace the cell's value.
    pub fn set(&self, value: Value) {
        *self.value.borrow_mut() = value;
    }
}

/// A closure: a function plus the cells it captured.
#[derive(Debug)]
pub struct Closure {
    pub function: Rc<UserFunction>,
    pub upvalues: Vec<Rc<UpvalueCell>>,
}

/// A method bound to its receiver; calling it prepends the receiver to the
/// argument list.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub function: Rc<UserFunction>,
}

/// The capability a host function implements to be callable from the VM.
///
/// The VM passes positional arguments and receives either a value or a
/// failure message; adapting defaults or trailing variadic arguments is the
/// callable's own concern.
pub trait NativeCallable {
    fn invoke(&self, args: &[Value]) -> Result<Value, String>;
}

impl<F> NativeCallable for F
where
    F: Fn(&[Value]) -> Result<Value, String>,
{
    fn invoke(&self, args: &[Value]) -> Result<Value, String> {
        self(args)
    }
}

/// A natively-implemented function registered with the runtime program.
pub struct ForeignFunction {
    pub name: String,
    callable: Box<dyn NativeCallable>,
}

impl ForeignFunction {
    /// Wrap a host callable.
    pub fn new(
        name: impl Into<String>,
        callable: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callable: Box::new(callable),
        }
    }

    /// Invoke through the bridge. Host failures come back as `Err` and are
    /// wrapped into error data by the caller, never unwound.
    pub fn invoke(&self, args: &[Value]) -> Result<Value, String> {
        self.callable.invoke(args)
    }
}

impl fmt::Debug for ForeignFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_share_mutations() {
        let cell = UpvalueCell::new(Value::Int(1));
        let other = Rc::clone(&cell);
        other.set(Value::Int(2));
        assert!(matches!(cell.get(), Value::Int(2)));
    }

    #[test]
    fn foreign_functions_invoke_through_the_bridge() {
        let f = ForeignFunction::new("double", |args: &[Value]| match args {
            [Value::Int(n)] => Ok(Value::Int(n * 2)),
            _ => Err("expected one int".into()),
        });
        assert!(matches!(f.invoke(&[Value::Int(21)]), Ok(Value::Int(42))));
        assert!(f.invoke(&[]).is_err());
    }
}

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Control flow handlers: jumps, calls, returns, closures, and captured
//! variables.

use std::rc::Rc;

use crate::function::{Closure, UpvalueCell, UserFunction};
use crate::opcode::OpCode;
use crate::value::{RefValue, UnionValue, Value};
use crate::vm::frame::CallFrame;
use crate::vm::{Interpreter, Result, RuntimeError};

/// Control flow result from executing an opcode.
pub enum ControlFlow {
    /// Continue execution.
    Continue,
    /// Terminate evaluation with the given value.
    Return(Value),
}

impl Interpreter<'_> {
    /// Execute a control-flow opcode.
    pub(crate) fn execute_control(&mut self, op: OpCode) -> Result<ControlFlow> {
        match op {
            OpCode::Jump | OpCode::Loop => {
                let target = self.read_int()?;
                self.jump_to(target)?;
            }

            OpCode::JumpIfFalse => {
                let target = self.read_int()?;
                let condition = self.stack.pop()?;
                if !self.is_truthy(&condition)? {
                    self.jump_to(target)?;
                }
            }

            OpCode::Call => {
                self.op_call()?;
            }

            OpCode::Return => return self.op_return(),

            OpCode::MakeClosure => {
                self.op_make_closure()?;
            }

            OpCode::GetUpvalue => {
                let index = self.read_int()? as usize;
                let cell = self.upvalue(index)?;
                self.stack.push(cell.get());
            }

            OpCode::SetUpvalue => {
                let index = self.read_int()? as usize;
                let value = self.stack.pop()?;
                self.upvalue(index)?.set(value);
            }

            OpCode::GetCapturedLocal => {
                let slot = self.read_int()? as usize;
                let value = self.stack.get_local(slot)?;
                match cell_of(&value) {
                    Some(cell) => self.stack.push(cell.get()),
                    None => self.stack.push(value),
                }
            }

            OpCode::SetCapturedLocal => {
                let slot = self.read_int()? as usize;
                let value = self.stack.pop()?;
                let current = self.stack.get_local(slot)?;
                match cell_of(&current) {
                    Some(cell) => cell.set(value),
                    None => {
                        // First write: promote the slot to a cell.
                        let cell = UpvalueCell::new(value);
                        self.stack
                            .set_local(slot, Value::from_ref(RefValue::Cell(cell)))?;
                    }
                }
            }

            other => {
                return Err(RuntimeError::Internal(format!(
                    "execute_control: unexpected opcode {:?}",
                    other
                )))
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn jump_to(&mut self, target: i32) -> Result<()> {
        if target < 0 {
            return Err(RuntimeError::Internal(
                "Jump target was never patched".into(),
            ));
        }
        self.ip = target as usize;
        Ok(())
    }

    fn upvalue(&self, index: usize) -> Result<Rc<UpvalueCell>> {
        let closure = self
            .closure
            .as_ref()
            .ok_or_else(|| RuntimeError::Internal("Upvalue access outside a closure".into()))?;
        closure
            .upvalues
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal(format!("Upvalue index {} out of bounds", index)))
    }

    /// Call: the callee sits on top, above its arguments.
    fn op_call(&mut self) -> Result<()> {
        let callee = self.stack.pop()?;
        let argc = self.read_int()? as usize;
        let return_ip = self.ip;

        let mut args = vec![Value::Null; argc];
        for i in (0..argc).rev() {
            args[i] = self.stack.pop()?;
        }

        self.invoke(callee, args, return_ip)
    }

    fn invoke(&mut self, callee: Value, args: Vec<Value>, return_ip: usize) -> Result<()> {
        let reference = match &callee {
            Value::Ref(r) => Rc::clone(r),
            _ => return Err(RuntimeError::NotCallable(callee.to_string())),
        };

        match reference.as_ref() {
            RefValue::Foreign(foreign) => {
                // Host failures become Err data; they never unwind here.
                let result = match foreign.invoke(&args) {
                    Ok(value) => value,
                    Err(message) => self.make_err(Value::string(message)),
                };
                self.stack.push(result);
                Ok(())
            }

            RefValue::Function(function) => {
                self.push_call_frame(Rc::clone(function), None, args, return_ip)
            }

            RefValue::Closure(closure) => self.push_call_frame(
                Rc::clone(&closure.function),
                Some(Rc::clone(closure)),
                args,
                return_ip,
            ),

            RefValue::BoundMethod(method) => {
                let mut with_receiver = Vec::with_capacity(args.len() + 1);
                with_receiver.push(method.receiver.clone());
                with_receiver.extend(args);
                self.push_call_frame(Rc::clone(&method.function), None, with_receiver, return_ip)
            }

            RefValue::VariantCtor { union, variant } => {
                self.stack.push(Value::from_ref(RefValue::Union(UnionValue {
                    union: Rc::clone(union),
                    variant: *variant,
                    values: args,
                })));
                Ok(())
            }

            _ => Err(RuntimeError::NotCallable(callee.to_string())),
        }
    }

    fn push_call_frame(
        &mut self,
        function: Rc<UserFunction>,
        closure: Option<Rc<Closure>>,
        args: Vec<Value>,
        return_ip: usize,
    ) -> Result<()> {
        self.frames.push(CallFrame {
            function: Rc::clone(&self.function),
            return_ip,
            stack_pointer: self.stack.len(),
            frame_base: self.stack.frame_base(),
            closure: self.closure.take(),
        });

        self.function = function;
        self.closure = closure;
        self.ip = 0;

        self.stack.push_frame(self.function.local_count);
        for (slot, arg) in args.into_iter().enumerate() {
            self.stack.set_local(slot, arg)?;
        }

        Ok(())
    }

    /// Return: pop the result, unwind one frame or terminate at depth zero.
    pub(crate) fn op_return(&mut self) -> Result<ControlFlow> {
        let result = self.stack.pop()?;

        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Ok(ControlFlow::Return(result)),
        };

        self.stack.truncate(frame.stack_pointer);
        self.stack.set_frame_base(frame.frame_base);
        self.function = frame.function;
        self.closure = frame.closure;
        self.ip = frame.return_ip;

        self.stack.push(result);
        Ok(ControlFlow::Continue)
    }

    /// MakeClosure operands: function const, capture count, then
    /// (is_local, index) pairs. Local captures promote the slot to a cell
    /// on first capture and share the existing cell afterwards; transitive
    /// captures share the parent closure's cell.
    fn op_make_closure(&mut self) -> Result<()> {
        let function_index = self.read_int()? as usize;
        let capture_count = self.read_int()? as usize;

        let function = match self.constant(function_index)? {
            Value::Ref(r) => match r.as_ref() {
                RefValue::Function(f) => Rc::clone(f),
                _ => {
                    return Err(RuntimeError::Internal(
                        "MakeClosure constant is not a function".into(),
                    ))
                }
            },
            _ => {
                return Err(RuntimeError::Internal(
                    "MakeClosure constant is not a function".into(),
                ))
            }
        };

        let mut upvalues = Vec::with_capacity(capture_count);
        for _ in 0..capture_count {
            let is_local = self.read_int()? == 1;
            let index = self.read_int()? as usize;

            if is_local {
                let value = self.stack.get_local(index)?;
                let cell = match cell_of(&value) {
                    Some(existing) => existing,
                    None => {
                        let cell = UpvalueCell::new(value);
                        self.stack
                            .set_local(index, Value::from_ref(RefValue::Cell(Rc::clone(&cell))))?;
                        cell
                    }
                };
                upvalues.push(cell);
            } else {
                upvalues.push(self.upvalue(index)?);
            }
        }

        self.stack
            .push(Value::from_ref(RefValue::Closure(Rc::new(Closure {
                function,
                upvalues,
            }))));
        Ok(())
    }

    // ========================================================================
    // Wrapped result constructors
    // ========================================================================

    pub(crate) fn make_some(&self, value: Value) -> Value {
        Value::from_ref(RefValue::Union(UnionValue {
            union: Rc::clone(&self.option_union),
            variant: 0,
            values: vec![value],
        }))
    }

    pub(crate) fn make_none(&self) -> Value {
        Value::from_ref(RefValue::Union(UnionValue {
            union: Rc::clone(&self.option_union),
            variant: 1,
            values: Vec::new(),
        }))
    }

    pub(crate) fn make_ok(&self, value: Value) -> Value {
        Value::from_ref(RefValue::Union(UnionValue {
            union: Rc::clone(&self.result_union),
            variant: 0,
            values: vec![value],
        }))
    }

    pub(crate) fn make_err(&self, error: Value) -> Value {
        Value::from_ref(RefValue::Union(UnionValue {
            union: Rc::clone(&self.result_union),
            variant: 1,
            values: vec![error],
        }))
    }
}

/// Extract the shared cell when a slot value holds one.
pub(crate) fn cell_of(value: &Value) -> Option<Rc<UpvalueCell>> {
    match value {
        Value::Ref(r) => match r.as_ref() {
            RefValue::Cell(cell) => Some(Rc::clone(cell)),
            _ => None,
        },
        _ => None,
    }
}

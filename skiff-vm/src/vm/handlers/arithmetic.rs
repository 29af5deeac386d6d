// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Arithmetic and comparison handlers. Semantics live in
//! [`crate::operators`]; this file only moves operands.

use crate::opcode::OpCode;
use crate::operators;
use crate::value::Value;
use crate::vm::{Interpreter, Result, RuntimeError};

impl Interpreter<'_> {
    /// Execute an arithmetic or comparison opcode.
    pub(crate) fn execute_arithmetic(&mut self, op: OpCode) -> Result<()> {
        match op {
            OpCode::Inc => {
                match self.stack.peek(0)? {
                    Value::Int(i) => self.stack.swap_top(Value::Int(i + 1))?,
                    Value::Double(d) => self.stack.swap_top(Value::Double(d + 1.0))?,
                    _ => {}
                }
                return Ok(());
            }
            OpCode::Dec => {
                match self.stack.peek(0)? {
                    Value::Int(i) => self.stack.swap_top(Value::Int(i - 1))?,
                    Value::Double(d) => self.stack.swap_top(Value::Double(d - 1.0))?,
                    _ => {}
                }
                return Ok(());
            }
            _ => {}
        }

        let right = self.stack.pop()?;
        let left = self.stack.pop()?;

        let result = match op {
            OpCode::Add => operators::add(&left, &right)?,
            OpCode::Sub => operators::sub(&left, &right)?,
            OpCode::Mul => operators::mul(&left, &right)?,
            OpCode::Div => operators::div(&left, &right)?,
            OpCode::Mod => operators::modulo(&left, &right)?,
            OpCode::Lt => operators::less_than(&left, &right)?,
            OpCode::Lte => operators::less_than_or_equal(&left, &right)?,
            OpCode::Gt => operators::greater_than(&left, &right)?,
            OpCode::Gte => operators::greater_than_or_equal(&left, &right)?,
            OpCode::Eq => operators::equal(&left, &right)?,
            OpCode::BitwiseOr => operators::bitwise_or(&left, &right)?,
            other => {
                return Err(RuntimeError::Internal(format!(
                    "execute_arithmetic: unexpected opcode {:?}",
                    other
                )))
            }
        };

        self.stack.push(result);
        Ok(())
    }
}

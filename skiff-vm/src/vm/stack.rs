// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The program stack.
//!
//! One contiguous growable array of values serves as the operand stack and
//! as local-slot storage for the active call frame (addressed from
//! `frame_base`), plus a separate fixed-size global slot table.

use crate::value::Value;

use super::error::{Result, RuntimeError};

/// Size of the fixed global slot table. Slot 0 holds the argv array.
pub const GLOBAL_SLOTS: usize = 64;

/// The VM's value stack plus the global slot table.
#[derive(Debug)]
pub struct ProgramStack {
    values: Vec<Value>,
    frame_base: usize,
    globals: Vec<Value>,
}

impl ProgramStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(256),
            frame_base: 0,
            globals: vec![Value::Null; GLOBAL_SLOTS],
        }
    }

    /// Push a value.
    #[inline]
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Pop the top value.
    #[inline]
    pub fn pop(&mut self) -> Result<Value> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Peek at the value `distance` entries from the top (0 = top).
    #[inline]
    pub fn peek(&self, distance: usize) -> Result<Value> {
        if distance >= self.values.len() {
            return Err(RuntimeError::StackUnderflow);
        }
        Ok(self.values[self.values.len() - 1 - distance].clone())
    }

    /// Replace the top value in place.
    #[inline]
    pub fn swap_top(&mut self, value: Value) -> Result<()> {
        match self.values.last_mut() {
            Some(top) => {
                *top = value;
                Ok(())
            }
            None => Err(RuntimeError::StackUnderflow),
        }
    }

    /// The current stack depth.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no values are on the stack.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Truncate to the given depth.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    /// Iterate the live operand stack, bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// The active frame's first local slot.
    #[inline]
    pub fn frame_base(&self) -> usize {
        self.frame_base
    }

    /// Restore a caller's frame base.
    #[inline]
    pub fn set_frame_base(&mut self, frame_base: usize) {
        self.frame_base = frame_base;
    }

    /// Begin a frame: the base lands just past the current top and
    /// `local_count` null-initialised slots are reserved. Growth preserves
    /// existing contents.
    pub fn push_frame(&mut self, local_count: usize) {
        self.frame_base = self.values.len();
        self.values
            .extend(std::iter::repeat_with(|| Value::Null).take(local_count));
    }

    /// Read local slot `slot` of the active frame.
    #[inline]
    pub fn get_local(&self, slot: usize) -> Result<Value> {
        self.values
            .get(self.frame_base + slot)
            .cloned()
            .ok_or(RuntimeError::StackUnderflow)
    }

    /// Write local slot `slot` of the active frame.
    #[inline]
    pub fn set_local(&mut self, slot: usize, value: Value) -> Result<()> {
        let index = self.frame_base + slot;
        match self.values.get_mut(index) {
            Some(entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(RuntimeError::StackUnderflow),
        }
    }

    /// Read a global slot.
    #[inline]
    pub fn get_global(&self, slot: usize) -> Result<Value> {
        self.globals
            .get(slot)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal(format!("Global slot {} out of range", slot)))
    }

    /// Write a global slot.
    #[inline]
    pub fn set_global(&mut self, slot: usize, value: Value) -> Result<()> {
        match self.globals.get_mut(slot) {
            Some(entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(RuntimeError::Internal(format!(
                "Global slot {} out of range",
                slot
            ))),
        }
    }
}

impl Default for ProgramStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_address_locals_from_the_base() {
        let mut stack = ProgramStack::new();
        stack.push(Value::Int(99));
        stack.push_frame(2);

        assert_eq!(stack.frame_base(), 1);
        stack.set_local(0, Value::Int(1)).unwrap();
        stack.set_local(1, Value::Int(2)).unwrap();
        assert!(matches!(stack.get_local(0).unwrap(), Value::Int(1)));
        assert!(matches!(stack.get_local(1).unwrap(), Value::Int(2)));
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn pop_on_empty_underflows() {
        let mut stack = ProgramStack::new();
        assert!(matches!(stack.pop(), Err(RuntimeError::StackUnderflow)));
    }

    #[test]
    fn globals_are_bounded() {
        let mut stack = ProgramStack::new();
        stack.set_global(0, Value::Int(7)).unwrap();
        assert!(matches!(stack.get_global(0).unwrap(), Value::Int(7)));
        assert!(stack.set_global(GLOBAL_SLOTS, Value::Null).is_err());
    }
}

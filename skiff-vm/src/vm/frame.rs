// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames.

use std::rc::Rc;

use crate::function::{Closure, UserFunction};

/// Saved caller state, pushed on every call and popped on return.
#[derive(Debug)]
pub struct CallFrame {
    /// The caller's function.
    pub function: Rc<UserFunction>,
    /// Where the caller resumes.
    pub return_ip: usize,
    /// The caller's stack depth; the stack is truncated back to this on
    /// return (callee and arguments were already popped at the call).
    pub stack_pointer: usize,
    /// The caller's frame base.
    pub frame_base: usize,
    /// The caller's active closure, if any.
    pub closure: Option<Rc<Closure>>,
}

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The bytecode interpreter.
//!
//! A state machine over the instruction stream: (current function, current
//! closure, instruction pointer, frame stack). Any error inside the loop is
//! caught once at the top of [`Interpreter::evaluate`], enriched with the
//! last instruction's debug span, and surfaced as a single [`SkiffError`]
//! after dumping the operand and frame stacks for diagnostics.

pub mod error;
pub mod frame;
pub mod handlers;
pub mod stack;

use std::rc::Rc;

use tracing::{error, trace};

use crate::function::{Closure, UserFunction};
use crate::opcode::OpCode;
use crate::program::{RuntimeProgram, UnionDescriptor, VariantDescriptor};
use crate::value::Value;

pub use error::{Result, RuntimeError, SkiffError};
pub use frame::CallFrame;
pub use handlers::control::ControlFlow;
pub use stack::{ProgramStack, GLOBAL_SLOTS};

/// The Skiff bytecode interpreter.
///
/// Borrows its [`ProgramStack`] so an embedding host can persist globals
/// across runs (REPL style). Construction seeds the global slot array from
/// the runtime program; execution then only touches slots by index.
pub struct Interpreter<'a> {
    pub(crate) stack: &'a mut ProgramStack,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) function: Rc<UserFunction>,
    pub(crate) closure: Option<Rc<Closure>>,
    pub(crate) ip: usize,
    last_ip: usize,
    /// Per-instruction stack tracing (the `--trace` debug mode).
    trace: bool,
    pub(crate) option_union: Rc<UnionDescriptor>,
    pub(crate) result_union: Rc<UnionDescriptor>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for one script run, seeding resolved globals
    /// into the slot table.
    pub fn new(
        program: &RuntimeProgram,
        script: Rc<UserFunction>,
        stack: &'a mut ProgramStack,
    ) -> Self {
        for (name, &slot) in &program.global_slots {
            if let Some(value) = program.global_values.get(name) {
                let _ = stack.set_global(slot, value.clone());
            }
        }

        let option_union = program
            .unions
            .get("Option")
            .cloned()
            .unwrap_or_else(|| builtin_fallback_union("Option", "Some", "None"));
        let result_union = program
            .unions
            .get("Result")
            .cloned()
            .unwrap_or_else(|| builtin_fallback_union("Result", "Ok", "Err"));

        Self {
            stack,
            frames: Vec::new(),
            function: script,
            closure: None,
            ip: 0,
            last_ip: 0,
            trace: false,
            option_union,
            result_union,
        }
    }

    /// As [`Interpreter::new`], also writing the argv array into slot 0.
    pub fn with_args(
        program: &RuntimeProgram,
        script: Rc<UserFunction>,
        stack: &'a mut ProgramStack,
        args: &[String],
    ) -> Self {
        let mut interpreter = Self::new(program, script, stack);
        let argv = Value::list(args.iter().map(Value::string).collect());
        let slot = program.slot_of("args").unwrap_or(0);
        let _ = interpreter.stack.set_global(slot, argv);
        interpreter
    }

    /// Enable per-instruction stack tracing.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Run the program to completion. Errors are span-enriched and the
    /// live stacks are dumped before returning.
    pub fn evaluate(&mut self) -> std::result::Result<Value, SkiffError> {
        self.stack.push_frame(self.function.local_count);

        match self.run() {
            Ok(value) => Ok(value),
            Err(err) => {
                error!(ip = self.last_ip, "runtime error: {}", err);
                for (i, value) in self.stack.iter().enumerate() {
                    error!("stack[{}] = {}", i, value);
                }
                error!("frame depth = {}", self.frames.len());
                for (i, frame) in self.frames.iter().enumerate() {
                    error!("frame[{}] {} ip={}", i, frame.function, frame.return_ip);
                }

                let span = self
                    .function
                    .chunk
                    .debug_span(self.last_ip)
                    .cloned()
                    .unwrap_or_default();
                Err(SkiffError::new(span, err.to_string()))
            }
        }
    }

    fn run(&mut self) -> Result<Value> {
        loop {
            if self.ip >= self.function.chunk.code.len() {
                // Falling off the end yields null: from the script it ends
                // the run, from a callee it returns to the caller.
                if self.frames.is_empty() {
                    return Ok(Value::Null);
                }
                self.stack.push(Value::Null);
                match self.op_return()? {
                    ControlFlow::Continue => continue,
                    ControlFlow::Return(value) => return Ok(value),
                }
            }

            self.last_ip = self.ip;
            let byte = self.function.chunk.code[self.ip];
            self.ip += 1;
            let op = OpCode::from_byte(byte)
                .ok_or_else(|| RuntimeError::Internal(format!("Unknown opcode byte {}", byte)))?;

            if self.trace {
                let rendered: Vec<String> = self.stack.iter().map(|v| v.to_string()).collect();
                trace!("{:04} {:<16} [{}]", self.last_ip, op.name(), rendered.join(" "));
            }

            match op {
                OpCode::None => {}

                // Stack & slot moves, handled inline.
                OpCode::Dup => {
                    let top = self.stack.peek(0)?;
                    self.stack.push(top);
                }
                OpCode::Pop => {
                    self.stack.pop()?;
                }
                OpCode::Swap => {
                    let a = self.stack.pop()?;
                    let b = self.stack.pop()?;
                    self.stack.push(a);
                    self.stack.push(b);
                }
                OpCode::LoadConst => {
                    let index = self.read_int()? as usize;
                    let value = self.constant(index)?;
                    self.stack.push(value);
                }
                OpCode::SetLocal => {
                    let slot = self.read_int()? as usize;
                    let value = self.stack.pop()?;
                    self.stack.set_local(slot, value)?;
                }
                OpCode::GetLocal => {
                    let slot = self.read_int()? as usize;
                    let value = self.stack.get_local(slot)?;
                    self.stack.push(value);
                }
                OpCode::SetGlobal => {
                    let slot = self.read_int()? as usize;
                    let value = self.stack.pop()?;
                    self.stack.set_global(slot, value)?;
                }
                OpCode::GetGlobal => {
                    let slot = self.read_int()? as usize;
                    let value = self.stack.get_global(slot)?;
                    self.stack.push(value);
                }

                // Control flow, calls, and closures.
                OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::Loop
                | OpCode::Call
                | OpCode::Return
                | OpCode::MakeClosure
                | OpCode::GetUpvalue
                | OpCode::SetUpvalue
                | OpCode::GetCapturedLocal
                | OpCode::SetCapturedLocal => match self.execute_control(op)? {
                    ControlFlow::Continue => {}
                    ControlFlow::Return(value) => return Ok(value),
                },

                // Arithmetic and comparison.
                OpCode::Inc
                | OpCode::Dec
                | OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::Lt
                | OpCode::Lte
                | OpCode::Gt
                | OpCode::Gte
                | OpCode::Eq
                | OpCode::BitwiseOr => self.execute_arithmetic(op)?,

                // Objects, unions, and comparisons.
                OpCode::Construct
                | OpCode::GetField
                | OpCode::SetField
                | OpCode::Compare
                | OpCode::TryUnwrap
                | OpCode::UnwrapUnion => self.execute_objects(op)?,

                // Indexing and value construction.
                OpCode::IndexGet
                | OpCode::IndexSet
                | OpCode::IndexGetDirect
                | OpCode::NewArray
                | OpCode::NewList
                | OpCode::NewString
                | OpCode::NewInt
                | OpCode::NewDouble => self.execute_indexing(op)?,
            }
        }
    }

    /// Read a 4-byte little-endian operand at the instruction pointer.
    #[inline]
    pub(crate) fn read_int(&mut self) -> Result<i32> {
        let value = self
            .function
            .chunk
            .read_i32(self.ip)
            .ok_or_else(|| RuntimeError::Internal("Operand read out of bounds".into()))?;
        self.ip += 4;
        Ok(value)
    }

    /// Fetch a constant from the current function's pool.
    pub(crate) fn constant(&self, index: usize) -> Result<Value> {
        self.function
            .chunk
            .constants
            .get(index)
            .cloned()
            .ok_or_else(|| RuntimeError::Internal(format!("Constant index {} out of bounds", index)))
    }

    /// Truthiness per the language rules; a hard error for values without
    /// the capability.
    pub(crate) fn is_truthy(&self, value: &Value) -> Result<bool> {
        value
            .truthiness()
            .ok_or_else(|| RuntimeError::NotTruthy(value.to_string()))
    }
}

fn builtin_fallback_union(name: &str, first: &str, second: &str) -> Rc<UnionDescriptor> {
    Rc::new(UnionDescriptor {
        name: name.to_string(),
        variants: vec![
            VariantDescriptor {
                name: first.to_string(),
                fields: vec!["value".into()],
            },
            VariantDescriptor {
                name: second.to_string(),
                fields: Vec::new(),
            },
        ],
    })
}

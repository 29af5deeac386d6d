// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler and virtual machine for the Skiff programming
//! language.
//!
//! The pipeline: a parsed program compiles against a [`ProgramBuilder`]'s
//! global tables into byte-encoded [`Chunk`]s, and an [`Interpreter`]
//! executes the script chunk against a [`ProgramStack`], producing a final
//! [`Value`] or one span-carrying [`SkiffError`].

pub mod builtins;
pub mod chunk;
pub mod compiler;
pub mod dump;
pub mod function;
pub mod opcode;
pub mod operators;
pub mod program;
pub mod value;
pub mod vm;

pub use chunk::{Chunk, Label};
pub use compiler::{compile, CompileError};
pub use function::{
    BoundMethod, Closure, ForeignFunction, NativeCallable, UpvalueCell, UserFunction,
};
pub use opcode::OpCode;
pub use program::{ProgramBuilder, ProgramError, RuntimeProgram, TypeDescriptor, UnionDescriptor};
pub use value::{IntRange, RefValue, Value, ValueKind};
pub use vm::{Interpreter, ProgramStack, RuntimeError, SkiffError, GLOBAL_SLOTS};

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! AST→bytecode compiler.
//!
//! [`analysis`] decides which locals are captured by nested functions;
//! [`codegen`] allocates slots, resolves identifiers (local, captured
//! local, upvalue, global), and emits chunks that honor the contract the
//! VM consumes.

pub mod analysis;
pub mod codegen;

use std::fmt;

use skiff_parser::SourceSpan;

pub use codegen::{compile, Compiler};

/// A spanned compilation error.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub span: SourceSpan,
}

impl CompileError {
    /// Create a new error.
    pub fn new(message: impl Into<String>, span: &SourceSpan) -> Self {
        Self {
            message: message.into(),
            span: span.clone(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Compile error at {}:{}:{}: {}",
            self.span.file, self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// Result alias for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

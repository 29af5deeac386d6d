// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime errors for the VM.

use std::fmt;

use skiff_parser::SourceSpan;

/// Runtime error during VM execution.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Stack underflow.
    StackUnderflow,
    /// Integer division or modulo by zero.
    DivisionByZero,
    /// Operator applied to an unsupported kind pair.
    OperationNotSupported {
        op: String,
        left: String,
        right: String,
    },
    /// Calling a value that is not callable.
    NotCallable(String),
    /// Indexing a receiver that has no indexer.
    NotIndexable(String),
    /// Evaluating the truthiness of a value that has none.
    NotTruthy(String),
    /// Reading or writing a member that does not exist.
    UndefinedField { type_name: String, field: String },
    /// `?` on an Err result.
    UnwrapFailed(String),
    /// Malformed instruction stream or corrupted state.
    Internal(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackUnderflow => write!(f, "Stack underflow"),
            RuntimeError::DivisionByZero => write!(f, "Division by zero"),
            RuntimeError::OperationNotSupported { op, left, right } => write!(
                f,
                "Operation {} not supported for '{}' and '{}'",
                op, left, right
            ),
            RuntimeError::NotCallable(value) => write!(f, "Value is not callable: {}", value),
            RuntimeError::NotIndexable(type_name) => {
                write!(f, "{} does not have an indexer", type_name)
            }
            RuntimeError::NotTruthy(value) => {
                write!(f, "No truthiness defined for {}", value)
            }
            RuntimeError::UndefinedField { type_name, field } => {
                write!(f, "{} has no member named {}", type_name, field)
            }
            RuntimeError::UnwrapFailed(message) => write!(f, "Unwrap failed: {}", message),
            RuntimeError::Internal(message) => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// The single span-carrying exception surfaced from a VM run. Callers render
/// it; they never inspect VM internals.
#[derive(Debug, Clone)]
pub struct SkiffError {
    pub span: SourceSpan,
    pub message: String,
}

impl SkiffError {
    /// Create a new error.
    pub fn new(span: SourceSpan, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for SkiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Runtime error at {}:{}:{}: {}",
            self.span.file, self.span.start.line, self.span.start.column, self.message
        )
    }
}

impl std::error::Error for SkiffError {}

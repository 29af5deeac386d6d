// skiff-embed - Error type
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The unified error an embedding host sees. Each phase's error folds into
//! one enum; hosts render it and never inspect VM internals.

use std::fmt;

use skiff_parser::{LexError, ParseError};
use skiff_vm::compiler::CompileError;
use skiff_vm::program::ProgramError;
use skiff_vm::SkiffError;

/// Anything that can go wrong between source text and a final value.
#[derive(Debug)]
pub enum Error {
    Parse(ParseError),
    Compile(CompileError),
    Program(ProgramError),
    Runtime(SkiffError),
    Io(std::io::Error),
    Convert(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::Compile(e) => write!(f, "{}", e),
            Error::Program(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Convert(message) => write!(f, "Conversion error: {}", message),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Parse(ParseError::Lex(e))
    }
}

impl From<CompileError> for Error {
    fn from(e: CompileError) -> Self {
        Error::Compile(e)
    }
}

impl From<ProgramError> for Error {
    fn from(e: ProgramError) -> Self {
        Error::Program(e)
    }
}

impl From<SkiffError> for Error {
    fn from(e: SkiffError) -> Self {
        Error::Runtime(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, Error>;

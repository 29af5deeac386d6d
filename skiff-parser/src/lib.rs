// skiff-parser - Parser for Skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer and parser for the Skiff programming language.
//!
//! This crate turns source text into tokens ([`lexer`]) and tokens into an
//! abstract syntax tree ([`parser`], [`ast`]). Every token and AST node
//! carries a [`span::SourceSpan`] for diagnostics.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;

pub use ast::{BinaryOp, Expr, FunctionDef, InterpolatedPart, MatchArm, Pattern};
pub use lexer::{lex, LexError, Lexer};
pub use parser::{parse_source, ParseError, Parser};
pub use span::{Location, SourceSpan};
pub use token::{Token, TokenKind};

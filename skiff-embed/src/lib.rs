// skiff-embed - Embedding API for Skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Embed the Skiff language in a Rust application.
//!
//! [`Engine`] wraps the parse→compile→execute pipeline behind a small API:
//! evaluate source, read and write globals, register native functions, and
//! call script functions from Rust. One engine keeps its globals across
//! evaluations, which is exactly what a REPL needs.

pub mod convert;
pub mod engine;
pub mod error;

pub use convert::{FromValue, IntoValue};
pub use engine::Engine;
pub use error::{Error, Result};
pub use skiff_vm::Value;

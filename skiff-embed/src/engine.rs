// skiff-embed - Engine implementation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Engine struct - main entry point for embedding Skiff.

use std::path::Path;
use std::rc::Rc;

use skiff_parser::{parse_source, SourceSpan};
use skiff_vm::chunk::Chunk;
use skiff_vm::compiler;
use skiff_vm::opcode::OpCode;
use skiff_vm::program::ProgramBuilder;
use skiff_vm::vm::{Interpreter, ProgramStack};
use skiff_vm::{UserFunction, Value};

use crate::convert::{FromValue, IntoValue};
use crate::error::{Error, Result};

/// The Skiff scripting engine.
///
/// `Engine` compiles and runs Skiff source against a persistent program
/// stack: globals defined in one [`Engine::eval`] stay visible to the next,
/// which is what a REPL needs. Host functions registered through
/// [`Engine::register_native`] are called through the same foreign bridge
/// as the builtins.
///
/// # Thread Safety
///
/// **`Engine` is NOT thread-safe.** Values use `Rc`/`RefCell` internally.
/// Create one engine per thread for concurrent evaluation; compiled chunks
/// themselves are immutable and safely shareable.
///
/// # Example
///
/// ```rust
/// use skiff_embed::Engine;
///
/// let mut engine = Engine::new();
/// let result = engine.eval("1 + 2 * 3").unwrap();
/// assert_eq!(result.to_string(), "7");
/// ```
pub struct Engine {
    builder: ProgramBuilder,
    stack: ProgramStack,
    args: Vec<String>,
    trace: bool,
}

impl Engine {
    /// Create a new engine with the builtins registered.
    pub fn new() -> Self {
        Self {
            builder: ProgramBuilder::new(),
            stack: ProgramStack::new(),
            args: Vec::new(),
            trace: false,
        }
    }

    /// Set the argv array scripts see as `args`.
    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    /// Enable per-instruction tracing for subsequent runs.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Evaluate a string of Skiff code; returns the last expression's
    /// value. Globals persist across calls.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        self.eval_named("<repl>", source)
    }

    /// Evaluate source under an explicit file name (for diagnostics).
    pub fn eval_named(&mut self, file: &str, source: &str) -> Result<Value> {
        let program = parse_source(file, source)?;
        let script = compiler::compile(&mut self.builder, &program)?;
        self.run(script)
    }

    /// Evaluate a file of Skiff code.
    pub fn eval_file(&mut self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        self.eval_named(&path.display().to_string(), &source)
    }

    /// Compile source without running it. Used by the disassembler path.
    pub fn compile_only(&mut self, file: &str, source: &str) -> Result<Rc<UserFunction>> {
        let program = parse_source(file, source)?;
        Ok(compiler::compile(&mut self.builder, &program)?)
    }

    /// Read a global by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let slot = self.builder.lookup_slot(name)?;
        self.stack.get_global(slot).ok()
    }

    /// Read a global converted to a Rust type.
    #[must_use]
    pub fn get_as<T: FromValue>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| T::from_value(&v).ok())
    }

    /// Read a global, distinguishing "not defined" from "wrong type".
    pub fn try_get_as<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name) {
            Some(value) => T::from_value(&value).map(Some).map_err(Error::Convert),
            None => Ok(None),
        }
    }

    /// Set a global by name, allocating a slot when needed.
    pub fn set(&mut self, name: &str, value: impl IntoValue) {
        let slot = self.builder.slot(name);
        let _ = self.stack.set_global(slot, value.into_value());
    }

    /// Register a native Rust function callable from scripts.
    ///
    /// # Example
    ///
    /// ```rust
    /// use skiff_embed::{Engine, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine.register_native("double", |args| match args {
    ///     [Value::Int(n)] => Ok(Value::Int(n * 2)),
    ///     _ => Err("double expects one Int".into()),
    /// });
    /// assert_eq!(engine.eval("double(21)").unwrap().to_string(), "42");
    /// ```
    pub fn register_native(
        &mut self,
        name: &str,
        func: impl Fn(&[Value]) -> std::result::Result<Value, String> + 'static,
    ) {
        self.builder.define_foreign(name, func);
    }

    /// Call a global function by name with the given arguments.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let callee = self
            .builder
            .global_value(name)
            .cloned()
            .or_else(|| {
                self.builder
                    .lookup_slot(name)
                    .and_then(|slot| self.stack.get_global(slot).ok())
            })
            .ok_or_else(|| Error::Convert(format!("Undefined function `{}`", name)))?;

        // A synthetic one-call script: push the arguments, push the callee,
        // call, return.
        let mut chunk = Chunk::new();
        for arg in args {
            let index = chunk.add_constant(arg.clone()) as i32;
            chunk.emit(OpCode::LoadConst, SourceSpan::empty(), &[index]);
        }
        let index = chunk.add_constant(callee) as i32;
        chunk.emit(OpCode::LoadConst, SourceSpan::empty(), &[index]);
        chunk.emit(OpCode::Call, SourceSpan::empty(), &[args.len() as i32]);
        chunk.emit(OpCode::Return, SourceSpan::empty(), &[]);

        self.run(Rc::new(UserFunction::script(chunk, 0)))
    }

    fn run(&mut self, script: Rc<UserFunction>) -> Result<Value> {
        let program = self.builder.finish()?;
        let result = {
            let mut interpreter =
                Interpreter::with_args(&program, script, &mut self.stack, &self.args);
            interpreter.set_trace(self.trace);
            interpreter.evaluate()
        };

        // Globals live in their own table; the operand stack resets between
        // runs so an aborted evaluation cannot poison the next one.
        self.stack.truncate(0);
        self.stack.set_frame_base(0);

        Ok(result?)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode emission.
//!
//! Slots are unique per function and never reused. Script-level
//! declarations live in global slots (shadowed redeclarations in nested
//! blocks get hidden slots); function-level declarations are frame locals.
//! Locals referenced by nested functions go through the captured-local
//! opcodes, nested references become upvalues, and closure creation emits
//! `MakeClosure` with (is_local, index) descriptor pairs.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;

use skiff_parser::ast::{
    BinaryOp, Expr, FunctionDef, InterpolatedPart, MatchArm, ObjectField, Pattern,
};
use skiff_parser::SourceSpan;

use crate::chunk::{Chunk, Label};
use crate::function::{UserFunction, UserFunctionParam};
use crate::opcode::OpCode;
use crate::program::{ProgramBuilder, VariantDescriptor};
use crate::value::{RefValue, Value};

use super::analysis::captured_names;
use super::{CompileError, Result};

/// Compile a parsed program against the builder's global tables, returning
/// the script function. Top-level `fun`/`type`/`union`/`let` names are
/// declared up front so bodies can reference them in any order.
pub fn compile(builder: &mut ProgramBuilder, program: &[Expr]) -> Result<Rc<UserFunction>> {
    Compiler::new(builder).compile_script(program)
}

/// How an identifier reference resolves.
#[derive(Debug, Clone, Copy)]
enum VarRef {
    Local(usize),
    CapturedLocal(usize),
    Upvalue(usize),
    Global(usize),
}

#[derive(Debug, Clone, Copy)]
struct UpvalueRef {
    is_local: bool,
    index: usize,
}

/// Per-function compilation state.
struct FunctionContext {
    chunk: Chunk,
    scopes: Vec<HashMap<String, usize>>,
    slot_count: usize,
    /// Names referenced by nested functions; accessed via captured ops.
    captured: HashSet<String>,
    /// This function's captures, in descriptor order.
    upvalues: IndexMap<String, UpvalueRef>,
    is_script: bool,
}

impl FunctionContext {
    fn new(is_script: bool, captured: HashSet<String>) -> Self {
        Self {
            chunk: Chunk::new(),
            scopes: vec![HashMap::new()],
            slot_count: 0,
            captured,
            upvalues: IndexMap::new(),
            is_script,
        }
    }

    fn resolve_local(&self, name: &str) -> Option<usize> {
        for scope in self.scopes.iter().rev() {
            if let Some(&slot) = scope.get(name) {
                return Some(slot);
            }
        }
        None
    }
}

/// The bytecode compiler.
pub struct Compiler<'b> {
    builder: &'b mut ProgramBuilder,
    contexts: Vec<FunctionContext>,
}

impl<'b> Compiler<'b> {
    /// Create a compiler over the given program builder.
    pub fn new(builder: &'b mut ProgramBuilder) -> Self {
        Self {
            builder,
            contexts: Vec::new(),
        }
    }

    /// Compile a whole script. The last expression's value is the script's
    /// result.
    pub fn compile_script(mut self, program: &[Expr]) -> Result<Rc<UserFunction>> {
        self.declare_top_level(program);
        self.contexts
            .push(FunctionContext::new(true, HashSet::new()));

        let mut terminal = false;
        for (i, expr) in program.iter().enumerate() {
            let last = i + 1 == program.len();
            self.emit(expr, last)?;
            if last {
                terminal = matches!(expr, Expr::Return { .. });
            }
        }

        let end_span = program
            .last()
            .map(|e| e.span().clone())
            .unwrap_or_else(SourceSpan::empty);
        if program.is_empty() {
            self.emit_constant(Value::Null, &end_span);
        }
        if !terminal {
            self.emit_op(OpCode::Return, &end_span, &[]);
        }

        let context = self.pop_context();
        Ok(Rc::new(UserFunction::script(
            context.chunk,
            context.slot_count,
        )))
    }

    /// Pre-declare top-level names so definitions resolve in any order.
    fn declare_top_level(&mut self, program: &[Expr]) {
        for expr in program {
            match expr {
                Expr::Function(def) => {
                    self.builder.slot(&def.name);
                }
                Expr::Let { name, .. } => {
                    self.builder.slot(name);
                }
                Expr::TypeDef { name, fields, .. } => {
                    let field_names = fields.iter().map(|f| f.name.clone()).collect();
                    self.builder.define_type(name, field_names);
                    let defaults = fields
                        .iter()
                        .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
                        .collect();
                    self.builder.set_type_defaults(name, defaults);
                }
                Expr::UnionDef { name, variants, .. } => {
                    if self.builder.lookup_union(name).is_none() {
                        let descriptors = variants
                            .iter()
                            .map(|v| VariantDescriptor {
                                name: v.name.clone(),
                                fields: v.fields.clone(),
                            })
                            .collect();
                        self.builder.define_union(name, descriptors);
                    }
                }
                Expr::TraitDef {
                    name, functions, ..
                } => {
                    let methods = functions.iter().map(|f| f.name.clone()).collect();
                    self.builder.declare_trait(name, methods);
                }
                _ => {}
            }
        }
    }

    // ========================================================================
    // Context and emission helpers
    // ========================================================================

    fn ctx(&mut self) -> &mut FunctionContext {
        self.contexts.last_mut().expect("no active function context")
    }

    fn pop_context(&mut self) -> FunctionContext {
        self.contexts.pop().expect("no active function context")
    }

    fn emit_op(&mut self, op: OpCode, span: &SourceSpan, operands: &[i32]) -> usize {
        let span = span.clone();
        self.ctx().chunk.emit(op, span, operands)
    }

    fn emit_jump(&mut self, op: OpCode, span: &SourceSpan, label: &mut Label) -> usize {
        let span = span.clone();
        self.ctx().chunk.emit_jump(op, span, label)
    }

    fn mark(&mut self, label: &mut Label) {
        self.ctx().chunk.mark_label(label);
    }

    fn add_constant(&mut self, value: Value) -> i32 {
        self.ctx().chunk.add_constant(value) as i32
    }

    fn emit_constant(&mut self, value: Value, span: &SourceSpan) {
        let index = self.add_constant(value);
        self.emit_op(OpCode::LoadConst, span, &[index]);
    }

    /// Emit `Pop` when the context discards the produced value.
    fn discard_if(&mut self, discard: bool, span: &SourceSpan) {
        if discard {
            self.emit_op(OpCode::Pop, span, &[]);
        }
    }

    /// Emit a null when the context expects a value from a statement.
    fn null_if(&mut self, want_value: bool, span: &SourceSpan) {
        if want_value {
            self.emit_constant(Value::Null, span);
        }
    }

    // ========================================================================
    // Name resolution
    // ========================================================================

    fn declare_variable(&mut self, name: &str) -> VarRef {
        let context = self.contexts.last().expect("no active function context");
        if context.is_script {
            let depth = context.scopes.len();
            let existing = context
                .scopes
                .last()
                .and_then(|scope| scope.get(name))
                .copied();
            let slot = match existing {
                Some(slot) => slot,
                None => {
                    // Top-scope names are addressable globals; shadows in
                    // nested blocks get hidden slots.
                    let slot = if depth == 1 {
                        self.builder.slot(name)
                    } else {
                        self.builder.anonymous_slot()
                    };
                    self.ctx()
                        .scopes
                        .last_mut()
                        .expect("scope stack")
                        .insert(name.to_string(), slot);
                    slot
                }
            };
            VarRef::Global(slot)
        } else {
            let context = self.ctx();
            let scope = context.scopes.last_mut().expect("scope stack");
            let slot = match scope.get(name) {
                Some(&slot) => slot,
                None => {
                    let slot = context.slot_count;
                    context.slot_count += 1;
                    scope.insert(name.to_string(), slot);
                    slot
                }
            };
            if context.captured.contains(name) {
                VarRef::CapturedLocal(slot)
            } else {
                VarRef::Local(slot)
            }
        }
    }

    /// A hidden slot for compiler-generated loop state. Never captured.
    fn hidden_slot(&mut self) -> VarRef {
        if self.contexts.last().expect("context").is_script {
            VarRef::Global(self.builder.anonymous_slot())
        } else {
            let context = self.ctx();
            let slot = context.slot_count;
            context.slot_count += 1;
            VarRef::Local(slot)
        }
    }

    fn resolve(&mut self, name: &str, span: &SourceSpan) -> Result<VarRef> {
        {
            let context = self.contexts.last().expect("context");
            if let Some(slot) = context.resolve_local(name) {
                // Script-scope slots are globals, including block shadows.
                return Ok(if context.is_script {
                    VarRef::Global(slot)
                } else if context.captured.contains(name) {
                    VarRef::CapturedLocal(slot)
                } else {
                    VarRef::Local(slot)
                });
            }
        }

        let top = self.contexts.len() - 1;
        if top > 0 {
            if let Some(index) = self.resolve_upvalue(top, name) {
                return Ok(VarRef::Upvalue(index));
            }
        }

        if let Some(slot) = self.builder.lookup_slot(name) {
            return Ok(VarRef::Global(slot));
        }

        Err(CompileError::new(
            format!("Undefined identifier `{}`", name),
            span,
        ))
    }

    fn resolve_upvalue(&mut self, ctx_index: usize, name: &str) -> Option<usize> {
        if ctx_index == 0 {
            return None;
        }
        let parent = ctx_index - 1;
        if self.contexts[parent].is_script {
            // Script names are globals, not captures.
            return None;
        }

        if let Some(slot) = self.contexts[parent].resolve_local(name) {
            return Some(self.add_upvalue(ctx_index, name, true, slot));
        }

        let transitive = self.resolve_upvalue(parent, name)?;
        Some(self.add_upvalue(ctx_index, name, false, transitive))
    }

    fn add_upvalue(&mut self, ctx_index: usize, name: &str, is_local: bool, index: usize) -> usize {
        let context = &mut self.contexts[ctx_index];
        if let Some(position) = context.upvalues.get_index_of(name) {
            return position;
        }
        context
            .upvalues
            .insert(name.to_string(), UpvalueRef { is_local, index });
        context.upvalues.len() - 1
    }

    fn emit_get(&mut self, var: VarRef, span: &SourceSpan) {
        match var {
            VarRef::Local(slot) => self.emit_op(OpCode::GetLocal, span, &[slot as i32]),
            VarRef::CapturedLocal(slot) => {
                self.emit_op(OpCode::GetCapturedLocal, span, &[slot as i32])
            }
            VarRef::Upvalue(index) => self.emit_op(OpCode::GetUpvalue, span, &[index as i32]),
            VarRef::Global(slot) => self.emit_op(OpCode::GetGlobal, span, &[slot as i32]),
        };
    }

    fn emit_set(&mut self, var: VarRef, span: &SourceSpan) {
        match var {
            VarRef::Local(slot) => self.emit_op(OpCode::SetLocal, span, &[slot as i32]),
            VarRef::CapturedLocal(slot) => {
                self.emit_op(OpCode::SetCapturedLocal, span, &[slot as i32])
            }
            VarRef::Upvalue(index) => self.emit_op(OpCode::SetUpvalue, span, &[index as i32]),
            VarRef::Global(slot) => self.emit_op(OpCode::SetGlobal, span, &[slot as i32]),
        };
    }

    fn global_constant(&mut self, name: &str, span: &SourceSpan) -> Result<Value> {
        self.builder.global_value(name).cloned().ok_or_else(|| {
            CompileError::new(format!("Missing builtin `{}`", name), span)
        })
    }

    // ========================================================================
    // Expression emission
    // ========================================================================

    /// Emit one expression. With `want_value` the expression leaves exactly
    /// one value on the stack; without it, none.
    fn emit(&mut self, expr: &Expr, want_value: bool) -> Result<()> {
        match expr {
            Expr::Int { value, span } => {
                self.emit_constant(Value::Int(*value), span);
                self.discard_if(!want_value, span);
            }
            Expr::Double { value, span } => {
                self.emit_constant(Value::Double(*value), span);
                self.discard_if(!want_value, span);
            }
            Expr::Str { value, span } => {
                self.emit_constant(Value::string(value.clone()), span);
                self.discard_if(!want_value, span);
            }
            Expr::Char { value, span } => {
                self.emit_constant(Value::string(value.to_string()), span);
                self.discard_if(!want_value, span);
            }
            Expr::Bool { value, span } => {
                self.emit_constant(Value::Bool(*value), span);
                self.discard_if(!want_value, span);
            }

            Expr::Identifier { name, span } => {
                let var = self.resolve(name, span)?;
                self.emit_get(var, span);
                self.discard_if(!want_value, span);
            }

            Expr::Keyword { name, span } if name == "self" => {
                let var = self.resolve("self", span)?;
                self.emit_get(var, span);
                self.discard_if(!want_value, span);
            }

            Expr::Interpolated { parts, span } => {
                self.emit_interpolation(parts, span)?;
                self.discard_if(!want_value, span);
            }

            Expr::Binary {
                left,
                op,
                op_span,
                right,
                span,
            } => {
                self.emit_binary(left, *op, op_span, right)?;
                self.discard_if(!want_value, span);
            }

            Expr::Assignment {
                target,
                value,
                span,
            } => self.emit_assignment(target, value, want_value, span)?,

            Expr::Range {
                start,
                end,
                inclusive,
                span,
            } => {
                let (start, end) = match (start, end) {
                    (Some(start), Some(end)) => (start, end),
                    _ => {
                        return Err(CompileError::new(
                            "An unbounded range is not usable as a value",
                            span,
                        ))
                    }
                };
                self.emit(start, true)?;
                self.emit(end, true)?;
                self.emit_constant(Value::Bool(*inclusive), span);
                let range_fn = self.global_constant("range", span)?;
                self.emit_constant(range_fn, span);
                self.emit_op(OpCode::Call, span, &[3]);
                self.discard_if(!want_value, span);
            }

            Expr::InlineTry { body, span } | Expr::Try { body, span } => {
                self.emit(body, true)?;
                self.emit_op(OpCode::TryUnwrap, span, &[]);
                self.discard_if(!want_value, span);
            }

            Expr::Increment { target, span } => {
                self.emit_adjust(target, OpCode::Inc, span)?;
                self.null_if(want_value, span);
            }
            Expr::Decrement { target, span } => {
                self.emit_adjust(target, OpCode::Dec, span)?;
                self.null_if(want_value, span);
            }

            Expr::MemberAccess {
                object,
                property,
                span,
            } => {
                self.emit(object, true)?;
                let name = property_name(property)?;
                let index = self.add_constant(Value::string(name));
                self.emit_op(OpCode::GetField, span, &[index]);
                self.discard_if(!want_value, span);
            }

            Expr::Call { callee, args, span } => {
                for arg in args {
                    self.emit(arg, true)?;
                }
                self.emit(callee, true)?;
                self.emit_op(OpCode::Call, span, &[args.len() as i32]);
                self.discard_if(!want_value, span);
            }

            Expr::Index {
                object,
                index,
                span,
            } => {
                self.emit(object, true)?;
                self.emit(index, true)?;
                self.emit_op(OpCode::IndexGet, span, &[]);
                self.discard_if(!want_value, span);
            }

            Expr::Block { body, span } => {
                self.ctx().scopes.push(HashMap::new());
                if body.is_empty() {
                    self.null_if(want_value, span);
                } else {
                    for (i, inner) in body.iter().enumerate() {
                        let last = i + 1 == body.len();
                        self.emit(inner, last && want_value)?;
                    }
                }
                self.ctx().scopes.pop();
            }

            Expr::If {
                condition,
                then_branch,
                else_branch,
                span,
            } => {
                self.emit(condition, true)?;

                let mut else_label = Chunk::new_label();
                let mut end_label = Chunk::new_label();

                self.emit_jump(OpCode::JumpIfFalse, condition.span(), &mut else_label);
                self.emit(then_branch, want_value)?;
                self.emit_jump(OpCode::Jump, span, &mut end_label);

                self.mark(&mut else_label);
                match else_branch {
                    Some(else_branch) => self.emit(else_branch, want_value)?,
                    None => self.null_if(want_value, span),
                }
                self.mark(&mut end_label);
            }

            Expr::While {
                condition,
                body,
                span,
            } => {
                let loop_start = self.ctx().chunk.current_offset();
                self.emit(condition, true)?;

                let mut end_label = Chunk::new_label();
                self.emit_jump(OpCode::JumpIfFalse, condition.span(), &mut end_label);

                self.ctx().scopes.push(HashMap::new());
                for inner in body {
                    self.emit(inner, false)?;
                }
                self.ctx().scopes.pop();

                self.emit_op(OpCode::Loop, span, &[loop_start as i32]);
                self.mark(&mut end_label);
                self.null_if(want_value, span);
            }

            Expr::For {
                binding,
                binding_span,
                iterable,
                body,
                span,
            } => {
                self.emit_for(binding, binding_span, iterable, body, span)?;
                self.null_if(want_value, span);
            }

            Expr::Match {
                subject,
                arms,
                span,
            } => {
                self.emit_match(subject, arms, span)?;
                self.discard_if(!want_value, span);
            }

            Expr::Return { value, span } => {
                match value {
                    Some(value) => self.emit(value, true)?,
                    None => self.emit_constant(Value::Null, span),
                }
                self.emit_op(OpCode::Return, span, &[]);
            }

            Expr::Let {
                name,
                value,
                span,
                ..
            } => {
                self.emit(value, true)?;
                let var = self.declare_variable(name);
                self.emit_set(var, span);
                self.null_if(want_value, span);
            }

            Expr::Function(def) => self.emit_function_definition(def, want_value)?,

            Expr::Lambda { params, body, span } => {
                let (function, upvalues) = self.compile_lambda(params, body, span)?;
                self.emit_function_value(function, &upvalues, span);
                self.discard_if(!want_value, span);
            }

            Expr::TypeDef {
                name,
                fields,
                methods,
                span,
                ..
            } => {
                // Top-level types were declared up front; nested ones are
                // declared here.
                if self.builder.lookup_type(name).is_none() {
                    let field_names = fields.iter().map(|f| f.name.clone()).collect();
                    self.builder.define_type(name, field_names);
                    let defaults = fields
                        .iter()
                        .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
                        .collect();
                    self.builder.set_type_defaults(name, defaults);
                }
                self.compile_methods(name, methods, span)?;
                self.null_if(want_value, span);
            }

            Expr::ImplBlock {
                type_name,
                functions,
                span,
                ..
            } => {
                self.compile_methods(type_name, functions, span)?;
                self.null_if(want_value, span);
            }

            Expr::UnionDef {
                name,
                variants,
                span,
            } => {
                if self.builder.lookup_union(name).is_none() {
                    let descriptors = variants
                        .iter()
                        .map(|v| VariantDescriptor {
                            name: v.name.clone(),
                            fields: v.fields.clone(),
                        })
                        .collect();
                    self.builder.define_union(name, descriptors);
                }
                self.null_if(want_value, span);
            }

            Expr::ArrayLit { elements, span } => {
                for element in elements {
                    self.emit(element, true)?;
                }
                self.emit_op(OpCode::NewList, span, &[elements.len() as i32]);
                self.discard_if(!want_value, span);
            }

            Expr::ObjectLit { fields, span } => {
                let dynamic = Value::from_ref(RefValue::Type(self.builder.dynamic_type()));
                let index = self.add_constant(dynamic);
                self.emit_op(OpCode::Construct, span, &[index]);
                self.emit_object_fields(fields)?;
                self.discard_if(!want_value, span);
            }

            Expr::Instantiate {
                type_name,
                type_span,
                fields,
                span,
            } => {
                let type_value = self
                    .builder
                    .global_value(type_name)
                    .cloned()
                    .ok_or_else(|| {
                        CompileError::new(format!("Unknown type `{}`", type_name), type_span)
                    })?;
                let index = self.add_constant(type_value);
                self.emit_op(OpCode::Construct, span, &[index]);

                // Defaults for fields the literal does not provide.
                let provided: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
                let defaults: Vec<(String, Expr)> = self
                    .builder
                    .type_defaults(type_name)
                    .map(|d| {
                        d.iter()
                            .filter(|(name, _)| !provided.contains(name.as_str()))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                for (field, default) in &defaults {
                    self.emit_op(OpCode::Dup, span, &[]);
                    self.emit(default, true)?;
                    let index = self.add_constant(Value::string(field.clone()));
                    self.emit_op(OpCode::SetField, default.span(), &[index]);
                }

                self.emit_object_fields(fields)?;
                self.discard_if(!want_value, span);
            }

            // Declarations with no runtime effect.
            Expr::Use { span, .. }
            | Expr::Module { span, .. }
            | Expr::Open { span, .. }
            | Expr::Tag { span, .. }
            | Expr::Comment { span, .. }
            | Expr::TraitDef { span, .. } => self.null_if(want_value, span),

            Expr::Keyword { name, span } => {
                return Err(CompileError::new(
                    format!("`{}` is not supported here", name),
                    span,
                ))
            }
            Expr::OperatorLit { text, span } => {
                return Err(CompileError::new(
                    format!("Operator `{}` is not usable as a value", text),
                    span,
                ))
            }
            Expr::Dot { span } => {
                return Err(CompileError::new("`.` is not usable as a value", span))
            }
            Expr::Tuple { span, .. } => {
                return Err(CompileError::new(
                    "Tuple expressions are not supported here",
                    span,
                ))
            }
            Expr::Defer { span, .. } => {
                return Err(CompileError::new("`defer` is not supported yet", span))
            }
        }

        Ok(())
    }

    fn emit_interpolation(
        &mut self,
        parts: &[InterpolatedPart],
        span: &SourceSpan,
    ) -> Result<()> {
        let str_fn = self.global_constant("str", span)?;
        let concat_fn = self.global_constant("concat", span)?;

        for part in parts {
            match part {
                InterpolatedPart::Text { value, span } => {
                    self.emit_constant(Value::string(value.clone()), span);
                }
                InterpolatedPart::Expr(inner) => {
                    self.emit(inner, true)?;
                    self.emit_constant(str_fn.clone(), inner.span());
                    self.emit_op(OpCode::Call, inner.span(), &[1]);
                }
            }
        }

        self.emit_constant(concat_fn, span);
        self.emit_op(OpCode::Call, span, &[parts.len() as i32]);
        Ok(())
    }

    fn emit_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        op_span: &SourceSpan,
        right: &Expr,
    ) -> Result<()> {
        match op {
            // Short-circuiting forms yield the deciding operand.
            BinaryOp::And => {
                self.emit(left, true)?;
                let mut end_label = Chunk::new_label();
                self.emit_op(OpCode::Dup, op_span, &[]);
                self.emit_jump(OpCode::JumpIfFalse, op_span, &mut end_label);
                self.emit_op(OpCode::Pop, op_span, &[]);
                self.emit(right, true)?;
                self.mark(&mut end_label);
                return Ok(());
            }
            BinaryOp::Or => {
                self.emit(left, true)?;
                let mut right_label = Chunk::new_label();
                let mut end_label = Chunk::new_label();
                self.emit_op(OpCode::Dup, op_span, &[]);
                self.emit_jump(OpCode::JumpIfFalse, op_span, &mut right_label);
                self.emit_jump(OpCode::Jump, op_span, &mut end_label);
                self.mark(&mut right_label);
                self.emit_op(OpCode::Pop, op_span, &[]);
                self.emit(right, true)?;
                self.mark(&mut end_label);
                return Ok(());
            }
            _ => {}
        }

        self.emit(left, true)?;
        self.emit(right, true)?;

        match op {
            BinaryOp::Add => self.emit_op(OpCode::Add, op_span, &[]),
            BinaryOp::Sub => self.emit_op(OpCode::Sub, op_span, &[]),
            BinaryOp::Mul => self.emit_op(OpCode::Mul, op_span, &[]),
            BinaryOp::Div => self.emit_op(OpCode::Div, op_span, &[]),
            BinaryOp::Mod => self.emit_op(OpCode::Mod, op_span, &[]),
            BinaryOp::Lt => self.emit_op(OpCode::Lt, op_span, &[]),
            BinaryOp::Lte => self.emit_op(OpCode::Lte, op_span, &[]),
            BinaryOp::Gt => self.emit_op(OpCode::Gt, op_span, &[]),
            BinaryOp::Gte => self.emit_op(OpCode::Gte, op_span, &[]),
            BinaryOp::Eq => self.emit_op(OpCode::Eq, op_span, &[]),
            BinaryOp::Is => self.emit_op(OpCode::Compare, op_span, &[]),
            BinaryOp::BitOr => self.emit_op(OpCode::BitwiseOr, op_span, &[]),
            BinaryOp::Neq => {
                // Invert Eq: no dedicated instruction exists.
                self.emit_op(OpCode::Eq, op_span, &[]);
                let mut true_label = Chunk::new_label();
                let mut end_label = Chunk::new_label();
                self.emit_jump(OpCode::JumpIfFalse, op_span, &mut true_label);
                self.emit_constant(Value::Bool(false), op_span);
                self.emit_jump(OpCode::Jump, op_span, &mut end_label);
                self.mark(&mut true_label);
                self.emit_constant(Value::Bool(true), op_span);
                self.mark(&mut end_label);
                0
            }
            BinaryOp::BitXor | BinaryOp::BitAnd | BinaryOp::Shl | BinaryOp::Shr => {
                return Err(CompileError::new(
                    format!("Operator `{}` is not supported", op),
                    op_span,
                ))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };

        Ok(())
    }

    fn emit_assignment(
        &mut self,
        target: &Expr,
        value: &Expr,
        want_value: bool,
        span: &SourceSpan,
    ) -> Result<()> {
        match target {
            Expr::Identifier { name, span: target_span } => {
                self.emit(value, true)?;
                if want_value {
                    self.emit_op(OpCode::Dup, span, &[]);
                }
                let var = self.resolve(name, target_span)?;
                self.emit_set(var, span);
                Ok(())
            }

            Expr::Keyword { name, span: target_span } if name == "self" => {
                self.emit(value, true)?;
                if want_value {
                    self.emit_op(OpCode::Dup, span, &[]);
                }
                let var = self.resolve("self", target_span)?;
                self.emit_set(var, span);
                Ok(())
            }

            Expr::MemberAccess {
                object, property, ..
            } => {
                let name = property_name(property)?;
                let index = self.add_constant(Value::string(name));
                if want_value {
                    self.emit(value, true)?;
                    self.emit_op(OpCode::Dup, span, &[]);
                    self.emit(object, true)?;
                    self.emit_op(OpCode::Swap, span, &[]);
                    self.emit_op(OpCode::SetField, span, &[index]);
                } else {
                    self.emit(object, true)?;
                    self.emit(value, true)?;
                    self.emit_op(OpCode::SetField, span, &[index]);
                }
                Ok(())
            }

            Expr::Index { object, index, .. } => {
                self.emit(object, true)?;
                self.emit(value, true)?;
                self.emit(index, true)?;
                self.emit_op(OpCode::IndexSet, span, &[]);
                // IndexSet always pushes its wrapped Ok/Err result.
                self.discard_if(!want_value, span);
                Ok(())
            }

            other => Err(CompileError::new(
                format!("Cannot assign to {}", other.describe()),
                other.span(),
            )),
        }
    }

    /// `++`/`--`: read, adjust, and store back through the resolved kind.
    fn emit_adjust(&mut self, target: &Expr, op: OpCode, span: &SourceSpan) -> Result<()> {
        match target {
            Expr::Identifier { name, span: target_span } => {
                let var = self.resolve(name, target_span)?;
                self.emit_get(var, span);
                self.emit_op(op, span, &[]);
                self.emit_set(var, span);
                Ok(())
            }
            other => Err(CompileError::new(
                format!("Cannot apply ++/-- to {}", other.describe()),
                other.span(),
            )),
        }
    }

    fn emit_object_fields(&mut self, fields: &[ObjectField]) -> Result<()> {
        for field in fields {
            self.emit_op(OpCode::Dup, &field.span, &[]);
            match &field.value {
                Some(value) => self.emit(value, true)?,
                None => {
                    // Shorthand `{ name }` reads the variable of that name.
                    let var = self.resolve(&field.name, &field.span)?;
                    self.emit_get(var, &field.span);
                }
            }
            let index = self.add_constant(Value::string(field.name.clone()));
            self.emit_op(OpCode::SetField, &field.span, &[index]);
        }
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn emit_for(
        &mut self,
        binding: &str,
        binding_span: &SourceSpan,
        iterable: &Expr,
        body: &[Expr],
        span: &SourceSpan,
    ) -> Result<()> {
        let binding_var = self.declare_variable(binding);

        // A syntactic bounded range iterates without materialising a value.
        if let Expr::Range {
            start: Some(start),
            end: Some(end),
            inclusive,
            ..
        } = iterable
        {
            let counter = self.hidden_slot();
            let limit = self.hidden_slot();

            self.emit(start, true)?;
            self.emit_set(counter, span);
            self.emit(end, true)?;
            self.emit_set(limit, span);

            let loop_start = self.ctx().chunk.current_offset();
            self.emit_get(counter, span);
            self.emit_get(limit, span);
            let compare = if *inclusive { OpCode::Lte } else { OpCode::Lt };
            self.emit_op(compare, span, &[]);

            let mut end_label = Chunk::new_label();
            self.emit_jump(OpCode::JumpIfFalse, span, &mut end_label);

            // Copy the counter into the user-visible binding each iteration.
            self.emit_get(counter, binding_span);
            self.emit_set(binding_var, binding_span);

            self.ctx().scopes.push(HashMap::new());
            for inner in body {
                self.emit(inner, false)?;
            }
            self.ctx().scopes.pop();

            self.emit_get(counter, span);
            self.emit_op(OpCode::Inc, span, &[]);
            self.emit_set(counter, span);

            self.emit_op(OpCode::Loop, span, &[loop_start as i32]);
            self.mark(&mut end_label);
            return Ok(());
        }

        // General collection iteration: hidden collection/counter/limit,
        // bounds from `len`, raw element reads.
        let collection = self.hidden_slot();
        let counter = self.hidden_slot();
        let limit = self.hidden_slot();

        self.emit(iterable, true)?;
        self.emit_set(collection, span);

        self.emit_constant(Value::Int(0), span);
        self.emit_set(counter, span);

        self.emit_get(collection, span);
        let len_index = self.add_constant(Value::string("len"));
        self.emit_op(OpCode::GetField, span, &[len_index]);
        self.emit_set(limit, span);

        let loop_start = self.ctx().chunk.current_offset();
        self.emit_get(counter, span);
        self.emit_get(limit, span);
        self.emit_op(OpCode::Lt, span, &[]);

        let mut end_label = Chunk::new_label();
        self.emit_jump(OpCode::JumpIfFalse, span, &mut end_label);

        self.emit_get(collection, binding_span);
        self.emit_get(counter, binding_span);
        self.emit_op(OpCode::IndexGetDirect, binding_span, &[]);
        self.emit_set(binding_var, binding_span);

        self.ctx().scopes.push(HashMap::new());
        for inner in body {
            self.emit(inner, false)?;
        }
        self.ctx().scopes.pop();

        self.emit_get(counter, span);
        self.emit_op(OpCode::Inc, span, &[]);
        self.emit_set(counter, span);

        self.emit_op(OpCode::Loop, span, &[loop_start as i32]);
        self.mark(&mut end_label);
        Ok(())
    }

    // ========================================================================
    // Match
    // ========================================================================

    fn emit_match(&mut self, subject: &Expr, arms: &[MatchArm], span: &SourceSpan) -> Result<()> {
        self.emit(subject, true)?;

        let mut end_label = Chunk::new_label();

        for arm in arms {
            let mut arm_fail = Chunk::new_label();

            match &arm.pattern {
                Pattern::Discard { .. } => {}

                Pattern::Constant(constant) => {
                    self.emit_op(OpCode::Dup, constant.span(), &[]);
                    self.emit(constant, true)?;
                    self.emit_op(OpCode::Compare, constant.span(), &[]);
                    self.emit_jump(OpCode::JumpIfFalse, constant.span(), &mut arm_fail);
                }

                Pattern::Variant { name, span, parts } => {
                    self.emit_variant_pattern(name, span, parts.as_deref(), &mut arm_fail)?;
                }
            }

            // The subject is consumed once an arm is taken.
            self.emit_op(OpCode::Pop, &arm.span, &[]);
            self.emit(&arm.body, true)?;
            self.emit_jump(OpCode::Jump, &arm.span, &mut end_label);
            self.mark(&mut arm_fail);
        }

        // No arm matched: the match evaluates to null.
        self.emit_op(OpCode::Pop, span, &[]);
        self.emit_constant(Value::Null, span);
        self.mark(&mut end_label);
        Ok(())
    }

    fn emit_variant_pattern(
        &mut self,
        name: &str,
        span: &SourceSpan,
        parts: Option<&[Expr]>,
        arm_fail: &mut Label,
    ) -> Result<()> {
        // A variant name tests the subject's variant; a type name tests its
        // type; anything else compares against the named variable's value.
        let field_names: Option<Vec<String>> =
            if let Some((union, index)) = self.builder.lookup_variant(name) {
                let pattern = self.global_constant(name, span)?;
                self.emit_op(OpCode::Dup, span, &[]);
                self.emit_constant(pattern, span);
                self.emit_op(OpCode::Compare, span, &[]);
                self.emit_jump(OpCode::JumpIfFalse, span, arm_fail);
                Some(union.variants[index].fields.clone())
            } else if let Some(ty) = self.builder.lookup_type(name) {
                let pattern = self.global_constant(name, span)?;
                self.emit_op(OpCode::Dup, span, &[]);
                self.emit_constant(pattern, span);
                self.emit_op(OpCode::Compare, span, &[]);
                self.emit_jump(OpCode::JumpIfFalse, span, arm_fail);
                Some(ty.fields.clone())
            } else {
                if parts.is_some() {
                    return Err(CompileError::new(
                        format!("Unknown variant or type `{}` in pattern", name),
                        span,
                    ));
                }
                let var = self.resolve(name, span)?;
                self.emit_op(OpCode::Dup, span, &[]);
                self.emit_get(var, span);
                self.emit_op(OpCode::Compare, span, &[]);
                self.emit_jump(OpCode::JumpIfFalse, span, arm_fail);
                None
            };

        let parts = match parts {
            Some(parts) => parts,
            None => return Ok(()),
        };
        let field_names = field_names.unwrap_or_default();

        for (i, part) in parts.iter().enumerate() {
            let field = field_names.get(i).ok_or_else(|| {
                CompileError::new(
                    format!(
                        "`{}` has {} field(s) but the pattern names {}",
                        name,
                        field_names.len(),
                        parts.len()
                    ),
                    span,
                )
            })?;
            let field_index = self.add_constant(Value::string(field.clone()));

            match part {
                Expr::Identifier {
                    name: binder,
                    span: binder_span,
                } => {
                    self.emit_op(OpCode::Dup, binder_span, &[]);
                    self.emit_op(OpCode::GetField, binder_span, &[field_index]);
                    let var = self.declare_variable(binder);
                    self.emit_set(var, binder_span);
                }
                literal => {
                    self.emit_op(OpCode::Dup, literal.span(), &[]);
                    self.emit_op(OpCode::GetField, literal.span(), &[field_index]);
                    self.emit(literal, true)?;
                    self.emit_op(OpCode::Compare, literal.span(), &[]);
                    self.emit_jump(OpCode::JumpIfFalse, literal.span(), arm_fail);
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn emit_function_definition(&mut self, def: &FunctionDef, want_value: bool) -> Result<()> {
        let top_level = self.contexts.len() == 1
            && self.contexts.first().map(|c| c.is_script).unwrap_or(false);

        let (function, upvalues) = self.compile_function(def, None)?;

        if top_level {
            // The slot was pre-declared; the VM seeds it at start-up.
            self.builder.define_function(&def.name, function);
            self.null_if(want_value, &def.span);
            return Ok(());
        }

        // Nested definitions bind a local.
        self.emit_function_value(function, &upvalues, &def.span);
        let var = self.declare_variable(&def.name);
        if want_value {
            self.emit_op(OpCode::Dup, &def.span, &[]);
        }
        self.emit_set(var, &def.span);
        Ok(())
    }

    fn emit_function_value(
        &mut self,
        function: Rc<UserFunction>,
        upvalues: &[UpvalueRef],
        span: &SourceSpan,
    ) {
        let index = self.add_constant(Value::from_ref(RefValue::Function(function)));
        if upvalues.is_empty() {
            self.emit_op(OpCode::LoadConst, span, &[index]);
            return;
        }

        let mut operands = Vec::with_capacity(2 + upvalues.len() * 2);
        operands.push(index);
        operands.push(upvalues.len() as i32);
        for upvalue in upvalues {
            operands.push(if upvalue.is_local { 1 } else { 0 });
            operands.push(upvalue.index as i32);
        }
        self.emit_op(OpCode::MakeClosure, span, &operands);
    }

    fn compile_function(
        &mut self,
        def: &FunctionDef,
        parent_type: Option<&str>,
    ) -> Result<(Rc<UserFunction>, Vec<UpvalueRef>)> {
        let captured = captured_names(&def.body);
        self.contexts.push(FunctionContext::new(false, captured));

        if def.has_self {
            self.declare_variable("self");
        }
        for param in &def.params {
            self.declare_variable(&param.name);
        }

        let mut terminal = false;
        for (i, expr) in def.body.iter().enumerate() {
            let last = i + 1 == def.body.len();
            self.emit(expr, last)?;
            if last {
                terminal = matches!(expr, Expr::Return { .. });
            }
        }

        let end_span = def
            .body
            .last()
            .map(|e| e.span().clone())
            .unwrap_or_else(|| def.span.clone());
        if def.body.is_empty() {
            self.emit_constant(Value::Null, &end_span);
        }
        if !terminal {
            self.emit_op(OpCode::Return, &end_span, &[]);
        }

        let context = self.pop_context();
        let function = Rc::new(UserFunction {
            name: def.name.clone(),
            parent_type: parent_type.map(str::to_string),
            params: def
                .params
                .iter()
                .map(|p| UserFunctionParam {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                })
                .collect(),
            return_type: def.return_type.clone(),
            local_count: context.slot_count,
            chunk: context.chunk,
        });
        let upvalues = context.upvalues.values().copied().collect();
        Ok((function, upvalues))
    }

    fn compile_lambda(
        &mut self,
        params: &[String],
        body: &Expr,
        span: &SourceSpan,
    ) -> Result<(Rc<UserFunction>, Vec<UpvalueRef>)> {
        let captured = captured_names(std::slice::from_ref(body));
        self.contexts.push(FunctionContext::new(false, captured));

        for param in params {
            self.declare_variable(param);
        }

        self.emit(body, true)?;
        self.emit_op(OpCode::Return, span, &[]);

        let context = self.pop_context();
        let function = Rc::new(UserFunction {
            name: "<lambda>".into(),
            parent_type: None,
            params: params
                .iter()
                .map(|name| UserFunctionParam {
                    name: name.clone(),
                    ty: "Any".into(),
                })
                .collect(),
            return_type: None,
            local_count: context.slot_count,
            chunk: context.chunk,
        });
        let upvalues = context.upvalues.values().copied().collect();
        Ok((function, upvalues))
    }

    fn compile_methods(
        &mut self,
        type_name: &str,
        methods: &[FunctionDef],
        span: &SourceSpan,
    ) -> Result<()> {
        let descriptor = self.builder.lookup_type(type_name).ok_or_else(|| {
            CompileError::new(format!("Unknown type `{}`", type_name), span)
        })?;

        for method in methods {
            let (function, upvalues) = self.compile_function(method, Some(type_name))?;
            if !upvalues.is_empty() {
                return Err(CompileError::new(
                    format!("Method `{}` cannot capture variables", method.name),
                    &method.span,
                ));
            }
            descriptor
                .methods
                .borrow_mut()
                .insert(method.name.clone(), function);
        }

        Ok(())
    }
}

fn property_name(property: &Expr) -> Result<String> {
    match property {
        Expr::Identifier { name, .. } => Ok(name.clone()),
        Expr::Keyword { name, .. } => Ok(name.clone()),
        other => Err(CompileError::new(
            format!("Expected a member name, found {}", other.describe()),
            other.span(),
        )),
    }
}

// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Capture analysis.
//!
//! Before a function body is compiled, every identifier referenced inside
//! its nested functions and lambdas is collected. A local whose name is in
//! that set is accessed through the captured-local opcodes so that reads
//! and writes stay correct once the slot is promoted to a cell at runtime.
//! The set over-approximates (a nested function's own shadowing binding
//! still marks the outer name): captured-local access falls back to the
//! raw slot when no cell is present, so the wider set is safe.

use std::collections::HashSet;

use skiff_parser::ast::{Expr, InterpolatedPart, MatchArm, Pattern};

/// Names referenced anywhere inside nested functions of `body`.
pub fn captured_names(body: &[Expr]) -> HashSet<String> {
    let mut out = HashSet::new();
    for expr in body {
        scan_for_nested(expr, &mut out);
    }
    out
}

/// Walk an expression; on reaching a nested function or lambda, collect all
/// identifiers its subtree references.
fn scan_for_nested(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Function(def) => {
            for inner in &def.body {
                collect_identifiers(inner, out);
            }
        }
        Expr::Lambda { body, .. } => collect_identifiers(body, out),
        other => walk_children(other, &mut |child| scan_for_nested(child, out)),
    }
}

/// Collect every identifier in a subtree, nested functions included.
fn collect_identifiers(expr: &Expr, out: &mut HashSet<String>) {
    match expr {
        Expr::Identifier { name, .. } => {
            out.insert(name.clone());
        }
        Expr::Function(def) => {
            for inner in &def.body {
                collect_identifiers(inner, out);
            }
        }
        other => walk_children(other, &mut |child| collect_identifiers(child, out)),
    }
}

/// Apply `f` to each direct child expression.
fn walk_children(expr: &Expr, f: &mut impl FnMut(&Expr)) {
    match expr {
        Expr::Int { .. }
        | Expr::Double { .. }
        | Expr::Str { .. }
        | Expr::Char { .. }
        | Expr::Bool { .. }
        | Expr::Identifier { .. }
        | Expr::Keyword { .. }
        | Expr::OperatorLit { .. }
        | Expr::Dot { .. }
        | Expr::Use { .. }
        | Expr::Module { .. }
        | Expr::Open { .. }
        | Expr::Tag { .. }
        | Expr::Comment { .. }
        | Expr::TraitDef { .. } => {}

        Expr::Interpolated { parts, .. } => {
            for part in parts {
                if let InterpolatedPart::Expr(inner) = part {
                    f(inner);
                }
            }
        }

        Expr::Tuple { parts, .. } | Expr::ArrayLit { elements: parts, .. } => {
            for part in parts {
                f(part);
            }
        }

        Expr::Binary { left, right, .. } => {
            f(left);
            f(right);
        }

        Expr::Assignment { target, value, .. } => {
            f(target);
            f(value);
        }

        Expr::Range { start, end, .. } => {
            if let Some(start) = start {
                f(start);
            }
            if let Some(end) = end {
                f(end);
            }
        }

        Expr::InlineTry { body, .. }
        | Expr::Try { body, .. }
        | Expr::Defer { body, .. }
        | Expr::Lambda { body, .. } => f(body),

        Expr::Increment { target, .. } | Expr::Decrement { target, .. } => f(target),

        Expr::MemberAccess { object, property, .. } => {
            f(object);
            f(property);
        }

        Expr::Call { callee, args, .. } => {
            f(callee);
            for arg in args {
                f(arg);
            }
        }

        Expr::Index { object, index, .. } => {
            f(object);
            f(index);
        }

        Expr::Block { body, .. } => {
            for inner in body {
                f(inner);
            }
        }

        Expr::While {
            condition, body, ..
        } => {
            f(condition);
            for inner in body {
                f(inner);
            }
        }

        Expr::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            f(condition);
            f(then_branch);
            if let Some(else_branch) = else_branch {
                f(else_branch);
            }
        }

        Expr::For {
            iterable, body, ..
        } => {
            f(iterable);
            for inner in body {
                f(inner);
            }
        }

        Expr::Match { subject, arms, .. } => {
            f(subject);
            for MatchArm { pattern, body, .. } in arms {
                if let Pattern::Constant(inner) = pattern {
                    f(inner);
                }
                f(body);
            }
        }

        Expr::Return { value, .. } => {
            if let Some(value) = value {
                f(value);
            }
        }

        Expr::Let { value, .. } => f(value),

        Expr::Function(def) => {
            for inner in &def.body {
                f(inner);
            }
        }

        Expr::TypeDef {
            fields, methods, ..
        } => {
            for field in fields {
                if let Some(default) = &field.default {
                    f(default);
                }
            }
            for method in methods {
                for inner in &method.body {
                    f(inner);
                }
            }
        }

        Expr::ImplBlock { functions, .. } => {
            for function in functions {
                for inner in &function.body {
                    f(inner);
                }
            }
        }

        Expr::UnionDef { .. } => {}

        Expr::ObjectLit { fields, .. } => {
            for field in fields {
                if let Some(value) = &field.value {
                    f(value);
                }
            }
        }

        Expr::Instantiate { fields, .. } => {
            for field in fields {
                if let Some(value) = &field.value {
                    f(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_parser::parse_source;

    fn captured(source: &str) -> HashSet<String> {
        let exprs = parse_source("test.skf", source).expect("parse failed");
        captured_names(&exprs)
    }

    #[test]
    fn lambda_references_are_captured() {
        let names = captured("let x = 1\nlet f = id(y => x + y)");
        assert!(names.contains("x"));
    }

    #[test]
    fn plain_references_are_not() {
        let names = captured("let x = 1\nlet y = x + 2");
        assert!(names.is_empty());
    }

    #[test]
    fn transitive_nesting_is_seen() {
        let names = captured("fun outer() { let a = 1\n fun inner() { a } }");
        // The scan runs per function body at compile time; at the top level
        // the nested `outer` contributes everything it mentions.
        assert!(names.contains("a"));
    }
}

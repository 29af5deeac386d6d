// skiff-parser - Parser integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use skiff_parser::ast::{BinaryOp, Expr, InterpolatedPart, Pattern};
use skiff_parser::{parse_source, ParseError};

fn parse(source: &str) -> Vec<Expr> {
    parse_source("test.skf", source).expect("parse failed")
}

#[test]
fn parses_let_with_mut_and_type() {
    let exprs = parse("let mut total: Int = 0");
    match &exprs[0] {
        Expr::Let {
            mutable, name, ty, ..
        } => {
            assert!(*mutable);
            assert_eq!(name, "total");
            assert_eq!(ty.as_deref(), Some("Int"));
        }
        other => panic!("expected let, got {:?}", other),
    }
}

#[test]
fn precedence_table_is_respected() {
    // 1 + 2 * 3 parses as 1 + (2 * 3).
    let exprs = parse("1 + 2 * 3");
    match &exprs[0] {
        Expr::Binary { op, left, right, .. } => {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(left.as_ref(), Expr::Int { value: 1, .. }));
            assert!(matches!(
                right.as_ref(),
                Expr::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }

    // Comparison binds looser than arithmetic.
    let exprs = parse("a + 1 < b * 2");
    assert!(matches!(
        &exprs[0],
        Expr::Binary {
            op: BinaryOp::Lt,
            ..
        }
    ));

    // `is` binds tighter than arithmetic.
    let exprs = parse("x is 1 + 2");
    match &exprs[0] {
        Expr::Binary { op, left, .. } => {
            assert_eq!(*op, BinaryOp::Add);
            assert!(matches!(
                left.as_ref(),
                Expr::Binary {
                    op: BinaryOp::Is,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn binary_ties_bind_left_to_right() {
    let exprs = parse("10 - 4 - 3");
    match &exprs[0] {
        Expr::Binary { op, left, .. } => {
            assert_eq!(*op, BinaryOp::Sub);
            assert!(matches!(
                left.as_ref(),
                Expr::Binary {
                    op: BinaryOp::Sub,
                    ..
                }
            ));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn function_definition_carries_params_and_return_type() {
    let exprs = parse("fun add(a: Int, b: Int): Int { a + b }");
    match &exprs[0] {
        Expr::Function(def) => {
            assert_eq!(def.name, "add");
            assert_eq!(def.params.len(), 2);
            assert_eq!(def.params[0].name, "a");
            assert_eq!(def.params[1].ty, "Int");
            assert_eq!(def.return_type.as_deref(), Some("Int"));
            assert_eq!(def.body.len(), 1);
        }
        other => panic!("expected function, got {:?}", other),
    }
}

#[test]
fn method_self_parameter_is_recognised() {
    let exprs = parse("type Point { x: Int\n fun get_x(self) { self.x } }");
    match &exprs[0] {
        Expr::TypeDef {
            fields, methods, ..
        } => {
            assert_eq!(fields.len(), 1);
            assert_eq!(methods.len(), 1);
            assert!(methods[0].has_self);
        }
        other => panic!("expected type definition, got {:?}", other),
    }
}

#[test]
fn union_definition_parses_variants() {
    let exprs = parse("union Shape { Circle(radius), Square(side), Empty }");
    match &exprs[0] {
        Expr::UnionDef { name, variants, .. } => {
            assert_eq!(name, "Shape");
            assert_eq!(variants.len(), 3);
            assert_eq!(variants[0].fields, vec!["radius".to_string()]);
            assert!(variants[2].fields.is_empty());
        }
        other => panic!("expected union, got {:?}", other),
    }
}

#[test]
fn trait_and_impl_parse() {
    let exprs = parse(
        "trait Shape { fun area(self): Int }\n\
         impl Shape for Square { fun area(self) { self.side * self.side } }",
    );
    assert!(matches!(&exprs[0], Expr::TraitDef { name, .. } if name == "Shape"));
    match &exprs[1] {
        Expr::ImplBlock {
            trait_name,
            type_name,
            functions,
            ..
        } => {
            assert_eq!(trait_name, "Shape");
            assert_eq!(type_name, "Square");
            assert_eq!(functions.len(), 1);
        }
        other => panic!("expected impl, got {:?}", other),
    }
}

#[test]
fn lowercase_trait_name_is_a_hard_error() {
    assert!(parse_source("test.skf", "trait shape { }").is_err());
    assert!(parse_source("test.skf", "impl shape for Square { }").is_err());
}

#[test]
fn for_in_parses_range_and_collection() {
    let exprs = parse("for i in 0..10 { i }");
    match &exprs[0] {
        Expr::For {
            binding, iterable, ..
        } => {
            assert_eq!(binding, "i");
            assert!(matches!(
                iterable.as_ref(),
                Expr::Range {
                    inclusive: false,
                    ..
                }
            ));
        }
        other => panic!("expected for, got {:?}", other),
    }

    let exprs = parse("for x in items { x }");
    assert!(matches!(&exprs[0], Expr::For { .. }));
}

#[test]
fn match_supports_all_pattern_forms() {
    let exprs = parse("match v { 0 => 1, Some(x) => x, other => other, _ => 9 }");
    match &exprs[0] {
        Expr::Match { arms, .. } => {
            assert_eq!(arms.len(), 4);
            assert!(matches!(arms[0].pattern, Pattern::Constant(_)));
            assert!(
                matches!(&arms[1].pattern, Pattern::Variant { name, parts, .. }
                    if name == "Some" && parts.as_ref().map(|p| p.len()) == Some(1))
            );
            assert!(matches!(&arms[2].pattern, Pattern::Variant { parts, .. } if parts.is_none()));
            assert!(matches!(arms[3].pattern, Pattern::Discard { .. }));
        }
        other => panic!("expected match, got {:?}", other),
    }
}

#[test]
fn interpolation_reparses_nested_expressions() {
    let exprs = parse("`value: {a + b}!`");
    match &exprs[0] {
        Expr::Interpolated { parts, .. } => {
            assert_eq!(parts.len(), 3);
            match &parts[1] {
                InterpolatedPart::Expr(Expr::Binary { op, .. }) => {
                    assert_eq!(*op, BinaryOp::Add)
                }
                other => panic!("expected nested binary, got {:?}", other),
            }
        }
        other => panic!("expected interpolation, got {:?}", other),
    }
}

#[test]
fn interpolation_spans_stay_file_relative() {
    let exprs = parse("`ab{xyz}`");
    match &exprs[0] {
        Expr::Interpolated { parts, .. } => match &parts[1] {
            InterpolatedPart::Expr(inner) => {
                // In `ab{xyz}` the inner expression starts after the brace.
                assert_eq!(inner.span().start.column, 5);
                assert_eq!(inner.span().start.line, 1);
            }
            other => panic!("expected expression part, got {:?}", other),
        },
        other => panic!("expected interpolation, got {:?}", other),
    }
}

#[test]
fn postfix_operators_chain() {
    let exprs = parse("counter++");
    assert!(matches!(&exprs[0], Expr::Increment { .. }));

    let exprs = parse("read()?");
    assert!(matches!(&exprs[0], Expr::InlineTry { body, .. }
        if matches!(body.as_ref(), Expr::Call { .. })));
}

#[test]
fn lambda_argument_parses() {
    let exprs = parse("apply(x => x + 1)");
    match &exprs[0] {
        Expr::Call { args, .. } => {
            assert!(matches!(&args[0], Expr::Lambda { params, .. }
                if params == &vec!["x".to_string()]));
        }
        other => panic!("expected call, got {:?}", other),
    }
}

#[test]
fn unexpected_eof_and_expected_errors_are_distinct() {
    // A truncated binding names the construct that was expected.
    match parse_source("test.skf", "let x =") {
        Err(ParseError::Expected { expected, .. }) => {
            assert!(expected.contains("let binding"), "got: {}", expected);
        }
        other => panic!("expected a named syntax error, got {:?}", other),
    }

    assert!(matches!(
        parse_source("test.skf", "1 +"),
        Err(ParseError::UnexpectedEof)
    ));

    match parse_source("test.skf", "fun 5() { }") {
        Err(ParseError::Expected {
            expected, found, ..
        }) => {
            assert!(expected.contains("Identifier"));
            assert!(found.contains("Int"));
        }
        other => panic!("expected expected/found error, got {:?}", other),
    }
}

#[test]
fn error_spans_point_at_the_offending_token() {
    let err = parse_source("test.skf", "let x = ]").unwrap_err();
    let span = err.span().expect("span");
    assert_eq!(span.start.line, 1);
    assert_eq!(span.start.column, 9);
}

#[test]
fn semicolons_separate_statements() {
    let exprs = parse("let a = 1; let b = 2; a + b");
    assert_eq!(exprs.len(), 3);
}

#[test]
fn comments_are_dropped_from_the_program() {
    let exprs = parse("// leading\nlet a = 1 /* inline */\na");
    assert_eq!(exprs.len(), 2);
}

#[test]
fn tags_parse_name_and_version() {
    let exprs = parse("#http@1.2.0");
    match &exprs[0] {
        Expr::Tag { name, version, .. } => {
            assert_eq!(name, "http");
            assert_eq!(version.as_deref(), Some("1.2.0"));
        }
        other => panic!("expected tag, got {:?}", other),
    }
}

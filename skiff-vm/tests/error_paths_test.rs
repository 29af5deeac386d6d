// skiff-vm - Error path tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use skiff_parser::parse_source;
use skiff_vm::compiler::compile;
use skiff_vm::program::ProgramBuilder;
use skiff_vm::vm::{Interpreter, ProgramStack, SkiffError};

fn run(src: &str) -> Result<String, SkiffError> {
    let program = parse_source("test.skf", src).expect("parse error");
    let mut builder = ProgramBuilder::new();
    let script = compile(&mut builder, &program).expect("compile error");
    let runtime = builder.finish().expect("program error");

    let mut stack = ProgramStack::new();
    let mut vm = Interpreter::new(&runtime, script, &mut stack);
    vm.evaluate().map(|v| v.to_string())
}

fn compile_error(src: &str) -> String {
    let program = parse_source("test.skf", src).expect("parse error");
    let mut builder = ProgramBuilder::new();
    match compile(&mut builder, &program) {
        Ok(_) => panic!("expected a compile error for: {}", src),
        Err(e) => e.to_string(),
    }
}

#[test]
fn operator_errors_name_operator_and_operands() {
    let err = run("1 + true").unwrap_err();
    assert!(err.message.contains("add"), "got: {}", err.message);
    assert!(err.message.contains("1"), "got: {}", err.message);
    assert!(err.message.contains("true"), "got: {}", err.message);

    let err = run("\"a\" < 1").unwrap_err();
    assert!(err.message.contains("lt"), "got: {}", err.message);
}

#[test]
fn runtime_errors_carry_the_failing_span() {
    let err = run("let x = 1\nlet y = 2\nx + true").unwrap_err();
    assert_eq!(err.span.start.line, 3);
}

#[test]
fn division_by_zero() {
    let err = run("1 / 0").unwrap_err();
    assert!(err.message.contains("Division by zero"));
    let err = run("1 % 0").unwrap_err();
    assert!(err.message.contains("Division by zero"));
}

#[test]
fn calling_a_non_callable_value() {
    let err = run("let x = 5\nx(1)").unwrap_err();
    assert!(err.message.contains("not callable"), "got: {}", err.message);
}

#[test]
fn undefined_identifier_is_a_compile_error() {
    let message = compile_error("nope + 1");
    assert!(message.contains("Undefined identifier"), "got: {}", message);
    assert!(message.contains("nope"), "got: {}", message);
}

#[test]
fn unsupported_operators_fail_at_compile_time() {
    let message = compile_error("1 & 2");
    assert!(message.contains("not supported"), "got: {}", message);
}

#[test]
fn defer_is_rejected_with_a_span() {
    let message = compile_error("defer cleanup()");
    assert!(message.contains("defer"), "got: {}", message);
    assert!(message.contains("test.skf"), "got: {}", message);
}

#[test]
fn missing_member_names_type_and_field() {
    let err = run("type Point { x: Int }\nlet p = Point { }\np.nope").unwrap_err();
    assert!(err.message.contains("Point"), "got: {}", err.message);
    assert!(err.message.contains("nope"), "got: {}", err.message);
}

#[test]
fn unwrap_on_err_reports_the_payload() {
    let err = run("len(5)?").unwrap_err();
    assert!(err.message.contains("Unwrap failed"), "got: {}", err.message);
}

#[test]
fn deep_recursion_grows_the_frame_stack() {
    // Frames auto-grow; a few hundred levels are routine.
    let result = run(
        "fun down(n: Int) { if n < 1 { 0 } else { down(n - 1) } }\ndown(500)",
    )
    .unwrap();
    assert_eq!(result, "0");
}

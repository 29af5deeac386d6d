// skiff-vm - End-to-end execution tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use skiff_parser::parse_source;
use skiff_vm::compiler::compile;
use skiff_vm::program::ProgramBuilder;
use skiff_vm::vm::{Interpreter, ProgramStack};

fn compile_and_run(src: &str) -> String {
    let program = parse_source("test.skf", src).expect("parse error");
    let mut builder = ProgramBuilder::new();
    let script = compile(&mut builder, &program).expect("compile error");
    let runtime = builder.finish().expect("program error");

    let mut stack = ProgramStack::new();
    let mut vm = Interpreter::new(&runtime, script, &mut stack);
    match vm.evaluate() {
        Ok(value) => value.to_string(),
        Err(e) => format!("Error: {}", e),
    }
}

#[test]
fn literals_evaluate_to_themselves() {
    assert_eq!(compile_and_run("42"), "42");
    assert_eq!(compile_and_run("3.5"), "3.5");
    assert_eq!(compile_and_run("true"), "true");
    assert_eq!(compile_and_run("false"), "false");
    assert_eq!(compile_and_run("\"hello\""), "hello");
}

#[test]
fn arithmetic_respects_precedence() {
    assert_eq!(compile_and_run("1 + 2 * 3"), "7");
    assert_eq!(compile_and_run("10 - 4 - 3"), "3");
    assert_eq!(compile_and_run("7 % 3"), "1");
    assert_eq!(compile_and_run("1 + 2 * 3 < 8"), "true");
    assert_eq!(compile_and_run("6 / 2"), "3");
    assert_eq!(compile_and_run("1 | 2"), "3");
}

#[test]
fn mixed_arithmetic_promotes_to_double() {
    assert_eq!(compile_and_run("1 + 0.5"), "1.5");
    assert_eq!(compile_and_run("2.5 * 2"), "5");
}

#[test]
fn let_bindings_and_assignment() {
    assert_eq!(compile_and_run("let x = 41\nx + 1"), "42");
    assert_eq!(compile_and_run("let mut x = 1\nx = 5\nx"), "5");
    assert_eq!(compile_and_run("let mut x = 1\nx += 4\nx"), "5");
    assert_eq!(compile_and_run("let mut x = 6\nx -= 4\nx"), "2");
}

#[test]
fn postfix_increment_and_decrement() {
    assert_eq!(compile_and_run("let mut x = 1\nx++\nx"), "2");
    assert_eq!(compile_and_run("let mut x = 1\nx--\nx"), "0");
}

#[test]
fn if_else_selects_a_branch() {
    assert_eq!(compile_and_run("if true { 1 } else { 2 }"), "1");
    assert_eq!(compile_and_run("if false { 1 } else { 2 }"), "2");
    assert_eq!(compile_and_run("if 1 < 2 { 1 } else { 2 }"), "1");
    // No else: the statement value is null.
    assert_eq!(compile_and_run("if false { 1 }"), "null");
    // Else-if chains.
    assert_eq!(
        compile_and_run("let x = 5\nif x < 3 { 1 } else if x < 10 { 2 } else { 3 }"),
        "2"
    );
}

#[test]
fn truthiness_rules() {
    // Numbers are always truthy, including zero.
    assert_eq!(compile_and_run("if 0 { 1 } else { 2 }"), "1");
    // Truthiness of a string is a hard error.
    let result = compile_and_run("if \"x\" { 1 } else { 2 }");
    assert!(result.starts_with("Error:"), "got: {}", result);
    assert!(result.contains("truthiness"), "got: {}", result);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(compile_and_run("true && false"), "false");
    assert_eq!(compile_and_run("false && true"), "false");
    assert_eq!(compile_and_run("1 < 2 || \"boom\""), "true");
    assert_eq!(compile_and_run("false || 7"), "7");
    // The right side must not be evaluated when the left decides:
    // "boom" has no truthiness and would abort if evaluated.
    assert_eq!(compile_and_run("false && \"boom\""), "false");
}

#[test]
fn numeric_equality_and_inversion() {
    assert_eq!(compile_and_run("1 == 1"), "true");
    assert_eq!(compile_and_run("1 == 2"), "false");
    assert_eq!(compile_and_run("1 != 2"), "true");
    // Double equality uses the |a - b| < 0 comparison and is never true.
    assert_eq!(compile_and_run("1.5 == 1.5"), "false");
    assert_eq!(compile_and_run("1 == 1.0"), "false");
}

#[test]
fn while_loops_run_to_completion() {
    assert_eq!(
        compile_and_run(
            "let mut sum = 0\nlet mut i = 0\nwhile i < 10 { sum = sum + i; i = i + 1 }\nsum"
        ),
        "45"
    );
}

#[test]
fn for_over_ranges() {
    assert_eq!(
        compile_and_run("let mut sum = 0\nfor i in 0..10 { sum = sum + i }\nsum"),
        "45"
    );
    assert_eq!(
        compile_and_run("let mut sum = 0\nfor i in 0..=10 { sum = sum + i }\nsum"),
        "55"
    );
    assert_eq!(
        compile_and_run("let mut count = 0\nfor i in 5..5 { count = count + 1 }\ncount"),
        "0"
    );
}

#[test]
fn for_over_collections() {
    assert_eq!(
        compile_and_run("let mut sum = 0\nfor x in [1, 2, 3] { sum = sum + x }\nsum"),
        "6"
    );
    // A materialised range value iterates the same way.
    assert_eq!(
        compile_and_run("let r = 1..4\nlet mut sum = 0\nfor x in r { sum = sum + x }\nsum"),
        "6"
    );
}

#[test]
fn user_function_call_round_trips() {
    assert_eq!(
        compile_and_run("fun add(a: Int, b: Int) { a + b }\nadd(2, 3)"),
        "5"
    );
    // Caller state is fully restored: surrounding locals stay intact and
    // the call leaves exactly its one result.
    assert_eq!(
        compile_and_run(
            "fun add(a: Int, b: Int) { a + b }\n\
             let before = 10\n\
             let result = add(2, 3)\n\
             before + result"
        ),
        "15"
    );
}

#[test]
fn explicit_return_short_circuits() {
    assert_eq!(
        compile_and_run(
            "fun pick(n: Int) { if n < 10 { return 1 }\n return 2 }\npick(5)"
        ),
        "1"
    );
    assert_eq!(
        compile_and_run(
            "fun pick(n: Int) { if n < 10 { return 1 }\n return 2 }\npick(50)"
        ),
        "2"
    );
}

#[test]
fn nested_and_recursive_calls() {
    assert_eq!(
        compile_and_run(
            "fun fact(n: Int) { if n < 2 { 1 } else { n * fact(n - 1) } }\nfact(6)"
        ),
        "720"
    );
    assert_eq!(
        compile_and_run(
            "fun inner(x: Int) { x * 2 }\nfun outer(x: Int) { inner(x) + 1 }\nouter(10)"
        ),
        "21"
    );
}

#[test]
fn interpolation_concatenates_parts() {
    assert_eq!(compile_and_run("`a{1+1}b`"), "a2b");
    assert_eq!(
        compile_and_run("let name = \"skiff\"\n`hello {name}!`"),
        "hello skiff!"
    );
    assert_eq!(compile_and_run("`{1}{2}{3}`"), "123");
}

#[test]
fn index_get_wraps_results() {
    assert_eq!(
        compile_and_run("let a = [1, 2, 3]\nmatch a[1] { Some(v) => v, None => 0 - 1 }"),
        "2"
    );
    // Out of range is absence, not an error.
    assert_eq!(
        compile_and_run("let a = [1, 2, 3]\nmatch a[5] { Some(v) => v, None => 0 - 99 }"),
        "-99"
    );
    assert_eq!(
        compile_and_run("let s = \"abc\"\nmatch s[1] { Some(c) => c, None => \"?\" }"),
        "b"
    );
}

#[test]
fn index_set_wraps_results_and_preserves_on_failure() {
    assert_eq!(
        compile_and_run(
            "let a = [1, 2, 3]\n\
             let r = (a[1] = 42)\n\
             match r { Ok(v) => v, Err(m) => 0 - 1 }"
        ),
        "42"
    );
    // Out-of-range write: an Err result and an untouched array.
    assert_eq!(
        compile_and_run(
            "let a = [1, 2, 3]\n\
             let r = (a[5] = 42)\n\
             let failed = match r { Ok(v) => 0, Err(m) => 1 }\n\
             let kept = match a[2] { Some(v) => v, None => 0 - 1 }\n\
             failed * 100 + kept"
        ),
        "103"
    );
}

#[test]
fn indexing_non_indexable_is_an_error() {
    let result = compile_and_run("let x = 5\nx[0]");
    assert!(result.starts_with("Error:"), "got: {}", result);
    assert!(result.contains("indexer"), "got: {}", result);
}

#[test]
fn match_constant_and_discard_arms() {
    assert_eq!(
        compile_and_run("let x = 2\nmatch x { 1 => 10, 2 => 20, _ => 30 }"),
        "20"
    );
    assert_eq!(
        compile_and_run("let x = 9\nmatch x { 1 => 10, 2 => 20, _ => 30 }"),
        "30"
    );
    // No arm matched and no discard: the match is null.
    assert_eq!(compile_and_run("let x = 9\nmatch x { 1 => 10 }"), "null");
}

#[test]
fn match_binds_variant_payloads() {
    assert_eq!(
        compile_and_run(
            "union Shape { Circle(radius), Square(side) }\n\
             let s = Circle(5)\n\
             match s { Circle(r) => r * 2, Square(x) => x }"
        ),
        "10"
    );
    assert_eq!(
        compile_and_run(
            "union Shape { Circle(radius), Square(side) }\n\
             let s = Square(7)\n\
             match s { Circle(r) => r, Square(x) => x + 1 }"
        ),
        "8"
    );
}

#[test]
fn is_operator_tests_types_and_values() {
    assert_eq!(compile_and_run("5 is 5"), "true");
    assert_eq!(compile_and_run("5 is 6"), "false");
    assert_eq!(compile_and_run("\"a\" is \"a\""), "true");
    assert_eq!(
        compile_and_run("type Point { x: Int }\nlet p = Point { x = 1 }\np is Point"),
        "true"
    );
    assert_eq!(
        compile_and_run(
            "type Point { x: Int }\ntype Size { w: Int }\nlet p = Point { x = 1 }\np is Size"
        ),
        "false"
    );
}

#[test]
fn objects_fields_and_methods() {
    assert_eq!(
        compile_and_run(
            "type Point {\n\
               x: Int = 0,\n\
               y: Int = 0\n\
               fun sum(self) { self.x + self.y }\n\
             }\n\
             let p = Point { x = 3, y = 4 }\n\
             p.sum()"
        ),
        "7"
    );
    // Field defaults apply when the literal omits them.
    assert_eq!(
        compile_and_run(
            "type Point { x: Int = 11, y: Int = 31 }\nlet p = Point { x = 2 }\np.x + p.y"
        ),
        "33"
    );
    // Field assignment through member access.
    assert_eq!(
        compile_and_run(
            "type Point { x: Int = 0 }\nlet p = Point { }\np.x = 9\np.x"
        ),
        "9"
    );
}

#[test]
fn impl_blocks_attach_methods() {
    assert_eq!(
        compile_and_run(
            "type Square { side: Int = 0 }\n\
             trait Area { fun area(self): Int }\n\
             impl Area for Square { fun area(self) { self.side * self.side } }\n\
             let s = Square { side = 4 }\n\
             s.area()"
        ),
        "16"
    );
}

#[test]
fn anonymous_objects() {
    assert_eq!(
        compile_and_run("let o = { a = 1, b = 2 }\no.a + o.b"),
        "3"
    );
}

#[test]
fn builtins_are_callable() {
    assert_eq!(compile_and_run("str(42)"), "42");
    assert_eq!(compile_and_run("concat(\"a\", 1, \"b\")"), "a1b");
    assert_eq!(compile_and_run("len([1, 2, 3])"), "3");
    assert_eq!(compile_and_run("len(\"abcd\")"), "4");
    assert_eq!(compile_and_run("grep(\"alpha\\nbeta\", \"bet\")"), "beta");
}

#[test]
fn foreign_failures_are_err_data() {
    // A host-side failure comes back as an Err value, never as an abort.
    assert_eq!(
        compile_and_run("match len(5) { Ok(v) => 0, Err(m) => 1 }"),
        "1"
    );
}

#[test]
fn try_unwraps_ok_and_raises_on_err() {
    // `?` on an Err result aborts with an unwrap error.
    let result = compile_and_run("len(5)?");
    assert!(result.starts_with("Error:"), "got: {}", result);
    assert!(result.contains("Unwrap"), "got: {}", result);
    // Values that are not results pass through unchanged.
    assert_eq!(compile_and_run("let x = 5\nx?"), "5");
}

#[test]
fn blocks_yield_their_last_value() {
    assert_eq!(compile_and_run("let x = if true { 1\n2\n3 } else { 0 }\nx"), "3");
}

#[test]
fn script_args_live_in_slot_zero() {
    assert_eq!(compile_and_run("len(args)"), "0");
}

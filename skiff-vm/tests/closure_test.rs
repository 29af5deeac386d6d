// skiff-vm - Closure and captured-variable tests
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
fn closure_reads_a_captured_local() {
    assert_eq!(
        compile_and_run(
            "fun outer() {\n\
               let x = 42\n\
               fun inner() { x }\n\
               inner()\n\
             }\n\
             outer()"
        ),
        "42"
    );
}

#[test]
fn closure_survives_its_defining_frame() {
    assert_eq!(
        compile_and_run(
            "fun make(n: Int) {\n\
               fun get() { n }\n\
               get\n\
             }\n\
             let g = make(7)\n\
             g()"
        ),
        "7"
    );
}

#[test]
fn closure_mutates_through_the_shared_cell() {
    assert_eq!(
        compile_and_run(
            "fun counter() {\n\
               let mut count = 0\n\
               fun inc() { count = count + 1\n count }\n\
               inc()\n\
               inc()\n\
               inc()\n\
             }\n\
             counter()"
        ),
        "3"
    );
}

#[test]
fn two_closures_share_one_cell() {
    assert_eq!(
        compile_and_run(
            "fun pair() {\n\
               let mut n = 0\n\
               fun bump() { n = n + 1 }\n\
               fun read() { n }\n\
               bump()\n\
               bump()\n\
               read()\n\
             }\n\
             pair()"
        ),
        "2"
    );
}

#[test]
fn enclosing_scope_sees_closure_writes() {
    // The defining scope reads through the same cell the closure wrote.
    assert_eq!(
        compile_and_run(
            "fun run() {\n\
               let mut x = 1\n\
               fun set() { x = 99 }\n\
               set()\n\
               x\n\
             }\n\
             run()"
        ),
        "99"
    );
}

#[test]
fn transitive_capture_reaches_the_grandparent() {
    assert_eq!(
        compile_and_run(
            "fun grand() {\n\
               let x = 5\n\
               fun parent() {\n\
                 fun child() { x }\n\
                 child()\n\
               }\n\
               parent()\n\
             }\n\
             grand()"
        ),
        "5"
    );
}

#[test]
fn returned_closure_keeps_its_own_state() {
    assert_eq!(
        compile_and_run(
            "fun counter() {\n\
               let mut n = 0\n\
               fun inc() { n = n + 1\n n }\n\
               inc\n\
             }\n\
             let a = counter()\n\
             let b = counter()\n\
             a()\n\
             a()\n\
             b()"
        ),
        "1"
    );
}

#[test]
fn loop_variable_capture_shares_a_single_cell() {
    // One cell per declaration: every closure created over the loop
    // variable observes its final value (the last iteration's binding).
    assert_eq!(
        compile_and_run(
            "fun build() {\n\
               let fns = [0, 0, 0]\n\
               for i in 0..3 {\n\
                 fun get() { i }\n\
                 fns[i] = get\n\
               }\n\
               fns\n\
             }\n\
             fun unwrap_call(w: Any) { match w { Some(f) => f(), _ => 0 - 1 } }\n\
             let fns = build()\n\
             let a = unwrap_call(fns[0])\n\
             let b = unwrap_call(fns[1])\n\
             let c = unwrap_call(fns[2])\n\
             a * 100 + b * 10 + c"
        ),
        "222"
    );
}

#[test]
fn lambdas_capture_like_functions() {
    assert_eq!(
        compile_and_run(
            "fun apply(f: Any) { f(10) }\n\
             fun outer() {\n\
               let base = 5\n\
               apply(x => x + base)\n\
             }\n\
             outer()"
        ),
        "15"
    );
}

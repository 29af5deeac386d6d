// skiff-embed - Embedding API tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use skiff_embed::{Engine, Error, Value};

#[test]
fn eval_returns_the_last_value() {
    let mut engine = Engine::new();
    let result = engine.eval("1 + 2 * 3").unwrap();
    assert_eq!(result.to_string(), "7");
}

#[test]
fn globals_persist_across_evals() {
    let mut engine = Engine::new();
    engine.eval("let x = 10").unwrap();
    engine.eval("fun double(n: Int) { n * 2 }").unwrap();
    let result = engine.eval("double(x) + 1").unwrap();
    assert_eq!(result.to_string(), "21");
}

#[test]
fn get_and_set_cross_the_boundary() {
    let mut engine = Engine::new();
    engine.set("threshold", 40i64);
    let result = engine.eval("threshold + 2").unwrap();
    assert_eq!(result.to_string(), "42");

    engine.eval("let answer = 6 * 7").unwrap();
    assert_eq!(engine.get_as::<i64>("answer"), Some(42));
    assert_eq!(engine.get_as::<i64>("missing"), None);
}

#[test]
fn try_get_as_distinguishes_missing_from_mismatched() {
    let mut engine = Engine::new();
    engine.eval("let s = \"text\"").unwrap();

    let missing: Option<i64> = engine.try_get_as("nope").unwrap();
    assert!(missing.is_none());

    let mismatched: Result<Option<i64>, _> = engine.try_get_as("s");
    assert!(mismatched.is_err());
}

#[test]
fn native_functions_are_callable_from_scripts() {
    let mut engine = Engine::new();
    engine.register_native("triple", |args| match args {
        [Value::Int(n)] => Ok(Value::Int(n * 3)),
        _ => Err("triple expects one Int".into()),
    });

    let result = engine.eval("triple(14)").unwrap();
    assert_eq!(result.to_string(), "42");

    // A failing native call surfaces as Err data inside the language.
    let result = engine
        .eval("match triple(\"x\") { Ok(v) => 0, Err(m) => 1 }")
        .unwrap();
    assert_eq!(result.to_string(), "1");
}

#[test]
fn script_functions_are_callable_from_rust() {
    let mut engine = Engine::new();
    engine.eval("fun add(a: Int, b: Int) { a + b }").unwrap();
    let result = engine.call("add", &[Value::Int(2), Value::Int(3)]).unwrap();
    assert_eq!(result.to_string(), "5");
}

#[test]
fn errors_fold_into_one_enum() {
    let mut engine = Engine::new();

    assert!(matches!(engine.eval("let x ="), Err(Error::Parse(_))));
    assert!(matches!(engine.eval("nope + 1"), Err(Error::Compile(_))));
    assert!(matches!(engine.eval("1 + true"), Err(Error::Runtime(_))));
}

#[test]
fn a_failed_eval_does_not_poison_the_next() {
    let mut engine = Engine::new();
    engine.eval("let x = 1").unwrap();
    assert!(engine.eval("1 + true").is_err());
    let result = engine.eval("x + 1").unwrap();
    assert_eq!(result.to_string(), "2");
}

#[test]
fn script_args_are_visible() {
    let mut engine = Engine::new();
    engine.set_args(vec!["one".into(), "two".into()]);
    let result = engine.eval("len(args)").unwrap();
    assert_eq!(result.to_string(), "2");
    let first = engine
        .eval("match args[0] { Some(a) => a, None => \"\" }")
        .unwrap();
    assert_eq!(first.to_string(), "one");
}

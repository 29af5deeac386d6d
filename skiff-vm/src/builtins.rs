// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Built-in foreign functions.
//!
//! Registered into the runtime program's global table at builder
//! construction; all of them go through the same [`NativeCallable`] bridge
//! as user-registered host functions.
//!
//! [`NativeCallable`]: crate::function::NativeCallable

use std::cell::Cell;

use crate::program::ProgramBuilder;
use crate::value::{IntRange, RefValue, Value};

// LCG constants (same as used in glibc).
const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

thread_local! {
    /// Persistent RNG state, seeded lazily from system time.
    static RNG_STATE: Cell<u64> = const { Cell::new(0) };
    static RNG_SEEDED: Cell<bool> = const { Cell::new(false) };
}

fn next_random() -> u64 {
    RNG_SEEDED.with(|seeded| {
        if !seeded.get() {
            use std::time::{SystemTime, UNIX_EPOCH};
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0x5eed);
            RNG_STATE.with(|state| state.set(seed | 1));
            seeded.set(true);
        }
    });
    RNG_STATE.with(|state| {
        let next = state
            .get()
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT);
        state.set(next);
        next
    })
}

/// Register every builtin with the program builder.
pub fn register(builder: &mut ProgramBuilder) {
    builder.define_foreign("print", |args| {
        print_values(args, false);
        Ok(Value::Null)
    });

    builder.define_foreign("println", |args| {
        print_values(args, true);
        Ok(Value::Null)
    });

    // Render one value as a string; the compiler also calls this for
    // interpolated template parts.
    builder.define_foreign("str", |args| match args {
        [value] => Ok(Value::string(value.to_string())),
        _ => Err(format!("str expects one argument, got {}", args.len())),
    });

    // Concatenate the renderings of all arguments.
    builder.define_foreign("concat", |args| {
        let mut out = String::new();
        for value in args {
            out.push_str(&value.to_string());
        }
        Ok(Value::string(out))
    });

    // Range constructor; the compiler emits this for range expressions in
    // value position.
    builder.define_foreign("range", |args| match args {
        [Value::Int(start), Value::Int(end), Value::Bool(inclusive)] => {
            Ok(Value::from_ref(RefValue::Range(IntRange {
                start: *start,
                end: *end,
                inclusive: *inclusive,
            })))
        }
        _ => Err("range expects (start: Int, end: Int, inclusive: Bool)".into()),
    });

    builder.define_foreign("rand", |args| {
        let value = next_random();
        match args {
            [] => Ok(Value::Int((value >> 1) as i64)),
            [Value::Int(max)] if *max > 0 => Ok(Value::Int((value % *max as u64) as i64)),
            [Value::Int(max), Value::Int(min)] if max > min => {
                let spread = (*max - *min) as u64;
                Ok(Value::Int(*min + (value % spread) as i64))
            }
            _ => Err("rand expects no arguments, (max), or (max, min)".into()),
        }
    });

    builder.define_foreign("len", |args| match args {
        [Value::Ref(r)] => match r.as_ref() {
            RefValue::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            RefValue::Array(items) | RefValue::List(items) => {
                Ok(Value::Int(items.borrow().len() as i64))
            }
            RefValue::Range(range) => Ok(Value::Int(range.len())),
            other => Err(format!("len is not defined for {}", other.type_name())),
        },
        [other] => Err(format!("len is not defined for {}", other.type_name())),
        _ => Err(format!("len expects one argument, got {}", args.len())),
    });

    // Line-oriented text helpers.
    builder.define_foreign("first", |args| {
        with_lines(args, "first", |lines| {
            lines.first().map(|s| s.to_string()).unwrap_or_default()
        })
    });

    builder.define_foreign("last", |args| {
        with_lines(args, "last", |lines| {
            lines.last().map(|s| s.to_string()).unwrap_or_default()
        })
    });

    builder.define_foreign("nth", |args| match args {
        [Value::Ref(r), Value::Int(index)] => match r.as_ref() {
            RefValue::Str(s) => {
                let lines = split_lines(s);
                let line = usize::try_from(*index)
                    .ok()
                    .and_then(|i| lines.get(i))
                    .map(|s| s.to_string())
                    .unwrap_or_default();
                Ok(Value::string(line))
            }
            other => Err(format!("nth is not defined for {}", other.type_name())),
        },
        _ => Err("nth expects (text: String, index: Int)".into()),
    });

    builder.define_foreign("grep", |args| match args {
        [Value::Ref(text), Value::Ref(pattern)] => match (text.as_ref(), pattern.as_ref()) {
            (RefValue::Str(text), RefValue::Str(pattern)) => {
                let needle = pattern.to_lowercase();
                let matched: Vec<&str> = split_lines(text)
                    .into_iter()
                    .filter(|line| line.to_lowercase().contains(&needle))
                    .collect();
                Ok(Value::string(matched.join("\n")))
            }
            _ => Err("grep expects (text: String, pattern: String)".into()),
        },
        _ => Err("grep expects (text: String, pattern: String)".into()),
    });
}

fn print_values(args: &[Value], newline: bool) {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    if newline {
        println!("{}", rendered.join(" "));
    } else {
        use std::io::Write;
        print!("{}", rendered.join(" "));
        let _ = std::io::stdout().flush();
    }
}

fn split_lines(input: &str) -> Vec<&str> {
    input
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .collect()
}

fn with_lines(
    args: &[Value],
    name: &str,
    f: impl Fn(&[&str]) -> String,
) -> Result<Value, String> {
    match args {
        [Value::Ref(r)] => match r.as_ref() {
            RefValue::Str(s) => Ok(Value::string(f(&split_lines(s)))),
            other => Err(format!("{} is not defined for {}", name, other.type_name())),
        },
        [other] => Err(format!("{} is not defined for {}", name, other.type_name())),
        _ => Err(format!("{} expects one argument, got {}", name, args.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ProgramBuilder;

    fn invoke(builder: &ProgramBuilder, name: &str, args: &[Value]) -> Result<Value, String> {
        match builder.global_value(name) {
            Some(Value::Ref(r)) => match r.as_ref() {
                RefValue::Foreign(f) => f.invoke(args),
                _ => panic!("{} is not foreign", name),
            },
            _ => panic!("{} not registered", name),
        }
    }

    #[test]
    fn str_renders_values() {
        let builder = ProgramBuilder::new();
        let result = invoke(&builder, "str", &[Value::Int(42)]).unwrap();
        assert_eq!(result.to_string(), "42");
    }

    #[test]
    fn concat_joins_renderings() {
        let builder = ProgramBuilder::new();
        let result = invoke(
            &builder,
            "concat",
            &[Value::string("a"), Value::Int(2), Value::string("b")],
        )
        .unwrap();
        assert_eq!(result.to_string(), "a2b");
    }

    #[test]
    fn len_counts_collections() {
        let builder = ProgramBuilder::new();
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert!(matches!(
            invoke(&builder, "len", &[list]).unwrap(),
            Value::Int(3)
        ));
        assert!(invoke(&builder, "len", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn grep_filters_lines_case_insensitively() {
        let builder = ProgramBuilder::new();
        let text = Value::string("alpha\nBETA\ngamma");
        let result = invoke(&builder, "grep", &[text, Value::string("a")]).unwrap();
        assert_eq!(result.to_string(), "alpha\nBETA\ngamma");

        let text = Value::string("alpha\nBETA\ngamma");
        let result = invoke(&builder, "grep", &[text, Value::string("beta")]).unwrap();
        assert_eq!(result.to_string(), "BETA");
    }
}

// skiff - A lightweight scripting language written in Rust
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use skiff_embed::{Engine, Value};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("Skiff v0.1.0");
        return;
    }

    let dump = take_flag(&mut args, "--dump");
    let trace = take_flag(&mut args, "--trace");

    let mut engine = Engine::new();
    engine.set_trace(trace);

    // Everything after the first file path is handed to the script as args.
    if let Some((file, rest)) = args.split_first() {
        let file = file.clone();
        engine.set_args(rest.to_vec());

        if dump {
            dump_file(&mut engine, &file);
        } else {
            run_file(&mut engine, &file);
        }
    } else {
        run_repl(&mut engine);
    }
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    }
}

fn check_extension(file_path: &str) -> Result<(), String> {
    match Path::new(file_path).extension().and_then(|e| e.to_str()) {
        Some("skf") => Ok(()),
        Some(ext) => Err(format!(
            "Error: unsupported file extension '.{}' for '{}' (expected .skf)",
            ext, file_path
        )),
        None => Err(format!(
            "Error: file '{}' has no extension (expected .skf)",
            file_path
        )),
    }
}

fn run_file(engine: &mut Engine, file_path: &str) {
    if let Err(e) = check_extension(file_path) {
        eprintln!("{}", e);
        process::exit(1);
    }

    if let Err(e) = engine.eval_file(file_path) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

/// Compile and print the disassembly instead of running.
fn dump_file(engine: &mut Engine, file_path: &str) {
    if let Err(e) = check_extension(file_path) {
        eprintln!("{}", e);
        process::exit(1);
    }

    let source = match std::fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading '{}': {}", file_path, e);
            process::exit(1);
        }
    };

    match engine.compile_only(file_path, &source) {
        Ok(function) => print!("{}", skiff_vm::dump::disassemble(&function)),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Run the interactive REPL.
fn run_repl(engine: &mut Engine) {
    println!("Skiff v0.1.0");

    loop {
        print!("skiff> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() {
                    continue;
                }

                match engine.eval(input) {
                    Ok(Value::Null) => {}
                    Ok(result) => println!("{}", result),
                    Err(e) => eprintln!("{}", e),
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}

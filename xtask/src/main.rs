// xtask - Build automation for skiff
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("install") => install(&args[1..]),
        Some("uninstall") => uninstall(&args[1..]),
        Some("samples") => samples(&args[1..]),
        Some("help") | Some("-h") | Some("--help") | None => help(),
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            help();
            exit(1);
        }
    }
}

fn help() {
    println!(
        r#"skiff xtask - Build automation

USAGE:
    cargo xtask <COMMAND>

COMMANDS:
    install [--prefix <PATH>]   Build release and install to ~/.cargo/bin (or PREFIX/bin)
    uninstall [--prefix <PATH>] Remove installed files
    samples [PATTERN]           Build and run the scripts/ sample programs
    help                        Show this message

EXAMPLES:
    cargo xtask samples           Run every sample script
    cargo xtask samples shapes    Run samples whose filename contains "shapes"
"#
    );
}

fn bin_dir_from(args: &[String]) -> PathBuf {
    let prefix = match args.iter().position(|a| a == "--prefix") {
        Some(pos) => args.get(pos + 1).map(PathBuf::from).unwrap_or_else(|| {
            eprintln!("--prefix requires a path argument");
            exit(1);
        }),
        None => {
            let home = env::var("HOME").unwrap_or_else(|_| {
                eprintln!("Could not determine home directory");
                exit(1);
            });
            PathBuf::from(home).join(".cargo")
        }
    };
    prefix.join("bin")
}

fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("xtask lives one level below the workspace root")
        .to_path_buf()
}

fn build_release(root: &Path) {
    println!("Building release...");
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .current_dir(root)
        .status()
        .expect("Failed to run cargo build");
    if !status.success() {
        eprintln!("Build failed");
        exit(1);
    }
}

fn install(args: &[String]) {
    let bin_dir = bin_dir_from(args);
    let root = project_root();

    build_release(&root);
    fs::create_dir_all(&bin_dir).expect("Failed to create bin directory");

    let src = root.join("target/release/skiff");
    let dst = bin_dir.join("skiff");
    println!("Installing {} -> {}", src.display(), dst.display());
    fs::copy(&src, &dst).expect("Failed to copy skiff binary");
    fs::set_permissions(&dst, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");

    println!("\nInstalled skiff to {}", bin_dir.display());
    println!("Ensure {} is in your PATH", bin_dir.display());
}

fn uninstall(args: &[String]) {
    let bin_dir = bin_dir_from(args);

    let skiff = bin_dir.join("skiff");
    if skiff.exists() {
        println!("Removing {}", skiff.display());
        fs::remove_file(&skiff).expect("Failed to remove file");
    }

    println!("Uninstalled skiff from {}", bin_dir.display());
}

/// Build the interpreter and run each `scripts/*.skf` sample, reporting
/// which ones completed and which aborted.
fn samples(args: &[String]) {
    let pattern = args.first().map(String::as_str).unwrap_or("");
    let root = project_root();

    build_release(&root);
    let skiff = root.join("target/release/skiff");

    let scripts_dir = root.join("scripts");
    let mut scripts: Vec<PathBuf> = fs::read_dir(&scripts_dir)
        .unwrap_or_else(|e| {
            eprintln!("Could not read {}: {}", scripts_dir.display(), e);
            exit(1);
        })
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("skf"))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(pattern))
        })
        .collect();
    scripts.sort();

    if scripts.is_empty() {
        println!("No samples match \"{}\"", pattern);
        return;
    }

    let mut failures = 0usize;
    for script in &scripts {
        let name = script
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<sample>");
        let status = Command::new(&skiff)
            .arg(script)
            .status()
            .expect("Failed to run skiff");
        if status.success() {
            println!("  ok   {}", name);
        } else {
            println!("  FAIL {}", name);
            failures += 1;
        }
    }

    println!("\n{} sample(s), {} failure(s)", scripts.len(), failures);
    if failures > 0 {
        exit(1);
    }
}

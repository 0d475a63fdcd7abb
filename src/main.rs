use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tracing::{info, Level};

mod chunk;
mod code_gen;
mod common;
mod compiler;
mod lexer;
mod parser;
mod symbol_table;

/// Compile Jack classes into VM code, one `.vm` file per class.
#[derive(Parser)]
#[command(name = "jackc", version)]
struct Args {
    /// `.jack` files, or directories whose `.jack` files are compiled
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Print VM code to stdout instead of writing `.vm` files
    #[arg(long)]
    stdout: bool,

    /// More logging on stderr; repeat for more detail
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

/// Returns how many files failed to compile.
fn run(args: &Args) -> anyhow::Result<usize> {
    let mut failed = 0;
    for path in &args.paths {
        for file in source_files(path)? {
            if !compile_file(&file, args.stdout)? {
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn source_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path).with_context(|| format!("failed to read {}", path.display()))? {
        let file = entry?.path();
        if file.extension().map_or(false, |ext| ext == "jack") {
            files.push(file);
        }
    }
    files.sort();
    Ok(files)
}

/// Compile errors are reported and skipped; only I/O errors propagate.
fn compile_file(path: &Path, to_stdout: bool) -> anyhow::Result<bool> {
    let source = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    match compiler::compile(&source) {
        Ok(chunk) => {
            if to_stdout {
                print!("{}", chunk);
            } else {
                let output = path.with_extension("vm");
                fs::write(&output, chunk.to_string())
                    .with_context(|| format!("failed to write {}", output.display()))?;
                info!("compiled {} -> {}", path.display(), output.display());
            }
            Ok(true)
        }
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            Ok(false)
        }
    }
}

//! The mimium compiler CLI.
//!
//! `mimiumc <ast.json>` reads a parsed compilation unit (the AST serialized
//! as JSON), runs it through the pipeline and prints the requested stage
//! output.
//!
//! Options:
//! - `--config` - TOML compiler settings (entry function, memory suffix, dumps)
//! - `--emit` - What to print: `types`, `mir` or `memory` (repeatable)
//! - `--source` - Original source text, used to render diagnostics

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};

use mimium_ast::Block;
use mimiumc::{compile, format_memory, CompileError, CompilerConfig};

#[derive(Parser)]
#[command(name = "mimiumc", version, about = "The mimium compiler")]
struct Cli {
    /// Path to the JSON-serialized AST
    input: PathBuf,

    /// Compiler settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stage output to print; defaults to the config's dump flags, then MIR
    #[arg(long, value_enum)]
    emit: Vec<Emit>,

    /// Source file the AST was parsed from
    #[arg(long)]
    source: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    Types,
    Mir,
    Memory,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };
    let program = read_program(&cli.input)?;

    let compiled = match compile(&program, &config) {
        Ok(compiled) => compiled,
        Err(e) => {
            report(&e, cli.source.as_deref());
            return Err("Compilation failed due to errors above.".to_string());
        }
    };

    let mut emit = cli.emit.clone();
    if emit.is_empty() {
        if config.dump.types {
            emit.push(Emit::Types);
        }
        if config.dump.mir {
            emit.push(Emit::Mir);
        }
        if emit.is_empty() {
            emit.push(Emit::Mir);
        }
    }

    for what in emit {
        match what {
            Emit::Types => print!("{}", compiled.env.dump()),
            Emit::Mir => print!("{}", compiled.mir),
            Emit::Memory => match compiled.entry_memory(&config) {
                Some(tree) => print!("{}", format_memory(&compiled.mir, tree)),
                None => eprintln!("  no `{}` function; nothing to allocate", config.entry),
            },
        }
    }
    Ok(())
}

fn read_program(path: &Path) -> Result<Block, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse AST in '{}': {}", path.display(), e))
}

/// Print a pipeline error, with a source excerpt when the source is known.
fn report(error: &CompileError, source: Option<&Path>) {
    let text = source.and_then(|p| std::fs::read_to_string(p).ok().map(|s| (p, s)));
    match (error, text) {
        (CompileError::Type(e), Some((path, src))) => {
            let file_name = path.display().to_string();
            eprint!(
                "{}",
                mimium_typeck::diagnostics::render_diagnostic(e, &src, &file_name)
            );
        }
        (_, Some((path, src))) => {
            eprintln!("error: {}", error.located(&path.display().to_string(), &src))
        }
        (_, None) => eprintln!("error: {}", error),
    }
}

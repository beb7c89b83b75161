//! `ccirc` driver CLI (spec.md §6 "External Interfaces").
//!
//! Grounded on the teacher's `main.rs`: a clap-derive `Cli` struct
//! dispatched from `main`, `run_*` functions doing the actual work,
//! `process::exit(1)` on failure. Unlike the teacher's multi-subcommand
//! `seqc` (`Build`/`Lint`/`Completions`/`Test`/`Venv`), this crate has no
//! REPL/LSP/lint subcommands — those are genuinely out of scope, not
//! merely trimmed — so `Cli` is one flat `Build`-shaped command instead
//! of a `Commands` enum.

use ccirc::{CompileError, CompilerConfig, Diagnostics, OptLevel, WarnLevel};
use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Compile a C11 source file to an object file, assembly, or LLVM IR.
#[derive(Parser)]
#[command(name = "ccirc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "C11 compiler: preprocessor, AST/IR translator, LLVM IR emitter")]
struct Cli {
    /// Input C source file
    input: PathBuf,

    /// Output path (defaults to the input's stem)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Add a directory to the `#include` search path (repeatable)
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Define a macro, optionally with `=VALUE` (repeatable)
    #[arg(short = 'D', value_name = "MACRO[=VAL]")]
    defines: Vec<String>,

    /// Undefine a predefined macro (repeatable)
    #[arg(short = 'U', value_name = "MACRO")]
    undefines: Vec<String>,

    /// `-Wall`, `-Wextra`, or `-Werror`
    #[arg(short = 'W', value_name = "all|extra|error")]
    warn: Option<String>,

    /// Optimization level 0-3 (accepted, recorded only — this compiler
    /// performs no optimization passes of its own)
    #[arg(short = 'O', value_name = "0..3")]
    opt: Option<u8>,

    /// Stop after generating assembly (`.s`)
    #[arg(short = 'S')]
    stop_after_asm: bool,

    /// Strip symbol information from the output (recorded only)
    #[arg(short = 's')]
    strip: bool,

    /// Stop after compiling to an object file, skip linking
    #[arg(short = 'c')]
    stop_after_compile: bool,

    /// Emit debug info (recorded only, no debug info is ever generated)
    #[arg(short = 'g')]
    debug_info: bool,

    /// Link against a library (repeatable)
    #[arg(short = 'l', value_name = "NAME")]
    libraries: Vec<String>,

    /// Emit LLVM IR text instead of compiling
    #[arg(long)]
    emit_llvm: bool,

    /// C standard; `C11` is the only accepted value
    #[arg(long = "std", value_name = "C11")]
    std: Option<String>,

    /// Print the macro-expanded token stream and stop
    #[arg(long)]
    dump_tokens: bool,

    /// Print the parsed AST and stop
    #[arg(long)]
    dump_ast: bool,

    /// Print the translated IR and stop
    #[arg(long)]
    dump_ir: bool,

    /// Path to a `ccir.toml` project file to merge with these flags
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    ccirc::init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("ccirc: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CompileError> {
    if let Some(std) = &cli.std {
        if std != "C11" {
            return Err(CompileError::Cli(format!("unsupported --std={}, only C11 is accepted", std)));
        }
    }

    let warn_level = match cli.warn.as_deref() {
        None => WarnLevel::Normal,
        Some("all") => WarnLevel::All,
        Some("extra") => WarnLevel::Extra,
        Some("error") => WarnLevel::Error,
        Some(other) => return Err(CompileError::Cli(format!("unknown -W{}, expected all|extra|error", other))),
    };
    let opt_level = match cli.opt {
        None => OptLevel::O0,
        Some(n) => OptLevel::from_flag(n).ok_or_else(|| CompileError::Cli(format!("-O{} out of range, expected 0-3", n)))?,
    };

    let mut config = CompilerConfig::new()
        .with_warn_level(warn_level)
        .with_opt_level(opt_level);
    config.include_paths = cli.include_dirs.clone();
    config.libraries = cli.libraries.clone();
    config.debug_info = cli.debug_info;
    for raw in &cli.defines {
        let (name, value) = match raw.split_once('=') {
            Some((n, v)) => (n.to_string(), Some(v.to_string())),
            None => (raw.clone(), None),
        };
        config.defines.push(ccirc::config::CommandLineDefine { name, value });
    }
    config.undefines = cli.undefines.clone();

    if let Some(config_path) = &cli.config {
        let toml_src = std::fs::read_to_string(config_path).map_err(|e| CompileError::Io { path: config_path.display().to_string(), source: e })?;
        config = config.merge_toml(&toml_src).map_err(|e| CompileError::Cli(format!("{}: {}", config_path.display(), e)))?;
    }

    let mut diags = Diagnostics::new(warn_level == WarnLevel::Error);

    if cli.dump_tokens {
        let tokens = ccirc::preprocess_only(&cli.input, &config, &mut diags);
        for t in &tokens {
            println!("{:?}", t.kind);
        }
        return finish(&diags);
    }

    let compiled = match ccirc::compile_unit(&cli.input, &config, &mut diags) {
        Ok(c) => c,
        Err(_) => return finish(&diags),
    };

    if cli.dump_ast {
        println!("{:#?}", compiled.program);
        return finish(&diags);
    }
    if cli.dump_ir {
        let text = ccirc::ir::print_module(&compiled.unit, &cli.input.display().to_string());
        println!("{}", text);
        return finish(&diags);
    }

    let text = ccirc::ir::print_module(&compiled.unit, &cli.input.display().to_string());
    let stem = cli.input.file_stem().unwrap_or_default();
    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(stem));

    if cli.emit_llvm {
        let ir_path = output.with_extension("ll");
        std::fs::write(&ir_path, text).map_err(|e| CompileError::Io { path: ir_path.display().to_string(), source: e })?;
        println!("Wrote {}", ir_path.display());
        return finish(&diags);
    }

    let ir_path = output.with_extension("ll");
    std::fs::write(&ir_path, &text).map_err(|e| CompileError::Io { path: ir_path.display().to_string(), source: e })?;

    if cli.stop_after_asm {
        let asm_path = output.with_extension("s");
        let status = std::process::Command::new("clang")
            .arg(config.opt_level.as_clang_flag())
            .arg("-S")
            .arg(&ir_path)
            .arg("-o")
            .arg(&asm_path)
            .status()
            .map_err(|e| CompileError::Io { path: "clang".to_string(), source: e })?;
        if !status.success() {
            return Err(CompileError::ChildProcess { tool: "clang".to_string(), status: status.code() });
        }
        println!("Wrote {}", asm_path.display());
        return finish(&diags);
    }

    ccirc::assemble_and_link(&ir_path, &output, &config, cli.stop_after_compile)?;
    println!("Compiled {} -> {}", cli.input.display(), output.display());
    finish(&diags)
}

/// Exit status per spec.md §7: non-zero if any error was logged (or any
/// warning under `-Werror`, which `Diagnostics::warn` already upgrades).
fn finish(diags: &Diagnostics) -> Result<(), CompileError> {
    for d in diags.entries() {
        eprintln!("{}", d);
    }
    if diags.exit_ok() {
        Ok(())
    } else {
        Err(CompileError::Diagnosed)
    }
}

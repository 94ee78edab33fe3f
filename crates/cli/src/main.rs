//! `loxc`: file runner, REPL, disassemble-only mode, and shell completions
//! for the Lox bytecode compiler and VM.

mod error;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use error::CliError;
use loxc_compiler::{compile, CompilerConfig};
use loxc_core::Interner;
use loxc_vm::{InterpretOutcome, Vm, VmConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "loxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A bytecode compiler and VM for Lox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print every dispatched instruction as it runs.
    #[arg(long, global = true)]
    trace_execution: bool,

    /// Pretty-print compiled bytecode before running it.
    #[arg(long, global = true)]
    dump_bytecode: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a Lox source file
    Run {
        /// Path to the .lox source file
        path: PathBuf,
    },

    /// Start an interactive REPL
    Repl,

    /// Compile a file and print its bytecode without running it
    Disassemble {
        /// Path to the .lox source file
        path: PathBuf,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let vm_config = vm_config_from_env(&cli);
    let compiler_config = compiler_config_from_env(&cli);

    let result = match cli.command {
        Commands::Run { path } => run_file(&path, vm_config, &compiler_config),
        Commands::Repl => run_repl(vm_config, &compiler_config),
        Commands::Disassemble { path } => run_disassemble(&path, &compiler_config),
        Commands::Completions { shell } => {
            run_completions(shell);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(CliError::EXIT_CODE as u8)
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn vm_config_from_env(cli: &Cli) -> VmConfig {
    VmConfig::new()
        .with_trace_execution(cli.trace_execution || env_flag("LOXC_TRACE_EXECUTION", false))
        .with_stack_max(env_usize("LOXC_STACK_MAX", VmConfig::default().stack_max))
        .with_frames_max(env_usize("LOXC_FRAMES_MAX", VmConfig::default().frames_max))
}

fn compiler_config_from_env(cli: &Cli) -> CompilerConfig {
    CompilerConfig::new()
        .with_dump_bytecode(cli.dump_bytecode || env_flag("LOXC_DUMP_BYTECODE", false))
        .with_trace_bytecode(env_flag("LOXC_TRACE_BYTECODE", false))
}

fn read_source(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path)
        .map_err(|source| CliError::ReadFile { path: path.to_path_buf(), source })?;
    String::from_utf8(bytes).map_err(|_| CliError::NotUtf8 { path: path.to_path_buf() })
}

fn run_file(
    path: &Path,
    vm_config: VmConfig,
    compiler_config: &CompilerConfig,
) -> Result<ExitCode, CliError> {
    let source = read_source(path)?;
    let mut vm = Vm::new(vm_config);
    let outcome: InterpretOutcome = vm.interpret(&source, compiler_config).into();
    Ok(ExitCode::from(outcome.exit_code as u8))
}

fn run_disassemble(path: &Path, compiler_config: &CompilerConfig) -> Result<ExitCode, CliError> {
    let source = read_source(path)?;
    let mut interner = Interner::new();
    let mut stderr = io::stderr();
    let config = compiler_config.clone().with_dump_bytecode(true);
    match compile(&source, &mut interner, &config, &mut stderr) {
        Some(_) => Ok(ExitCode::SUCCESS),
        None => Ok(ExitCode::from(65)),
    }
}

fn run_repl(vm_config: VmConfig, compiler_config: &CompilerConfig) -> Result<ExitCode, CliError> {
    let mut editor =
        rustyline::DefaultEditor::new().map_err(CliError::Repl)?;
    let mut vm = Vm::new(vm_config);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim() == "exit" {
                    break;
                }
                let _ = editor.add_history_entry(line.as_str());
                vm.interpret(&line, compiler_config);
            }
            Err(rustyline::error::ReadlineError::Eof)
            | Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(err) => return Err(CliError::Repl(err)),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

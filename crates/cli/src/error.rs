//! Driver-level errors: anything that goes wrong before source text ever
//! reaches the compiler. Distinct from the compiler's and VM's own
//! line-tagged diagnostics, and mapped to a distinct exit code (74,
//! matching `sysexits.h`'s "cannot open input") so a failed `--help` typo
//! is never confused with a program that actually ran and failed.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum CliError {
    ReadFile { path: PathBuf, source: std::io::Error },
    NotUtf8 { path: PathBuf },
    Repl(rustyline::error::ReadlineError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::ReadFile { path, source } => {
                write!(f, "couldn't read '{}': {source}", path.display())
            }
            CliError::NotUtf8 { path } => {
                write!(f, "'{}' is not valid UTF-8", path.display())
            }
            CliError::Repl(err) => write!(f, "repl error: {err}"),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// `sysexits.h`'s `EX_NOINPUT`.
    pub const EXIT_CODE: i32 = 74;
}

//! Compiler-wide configuration, threaded in from the CLI or environment
//! rather than hard-coded.

/// Knobs that affect how `compile` behaves without changing language
/// semantics.
#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Emit a `tracing` span per opcode as it's written to the chunk.
    pub trace_bytecode: bool,
    /// Pretty-print every finished chunk (top-level and nested functions)
    /// via the disassembler before handing the program to the VM.
    pub dump_bytecode: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_bytecode(mut self, trace_bytecode: bool) -> Self {
        self.trace_bytecode = trace_bytecode;
        self
    }

    pub fn with_dump_bytecode(mut self, dump_bytecode: bool) -> Self {
        self.dump_bytecode = dump_bytecode;
        self
    }
}

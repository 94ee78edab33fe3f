//! VM-wide configuration, mirroring `loxc_compiler::CompilerConfig`'s
//! builder-struct shape.

const DEFAULT_STACK_MAX: usize = 16 * 1024;
const DEFAULT_FRAMES_MAX: usize = 64;

/// Knobs that affect how the VM runs without changing language semantics.
/// The stack/frame arrays are sized from this at construction rather than
/// being compile-time constants, so tests can exercise overflow with
/// small capacities.
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Emit a `tracing` event for every dispatched instruction.
    pub trace_execution: bool,
    pub stack_max: usize,
    pub frames_max: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            trace_execution: false,
            stack_max: DEFAULT_STACK_MAX,
            frames_max: DEFAULT_FRAMES_MAX,
        }
    }
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_execution(mut self, trace_execution: bool) -> Self {
        self.trace_execution = trace_execution;
        self
    }

    pub fn with_stack_max(mut self, stack_max: usize) -> Self {
        self.stack_max = stack_max;
        self
    }

    pub fn with_frames_max(mut self, frames_max: usize) -> Self {
        self.frames_max = frames_max;
        self
    }
}

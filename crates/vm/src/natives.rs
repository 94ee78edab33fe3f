//! Native (Rust-backed) functions exposed to Lox code.
//!
//! `loxc_core::NativeFn` is a plain function pointer with no capture
//! state. A process-wide start marker gives `clock` something to measure
//! from without needing a closure.

use loxc_core::Value;
use std::sync::OnceLock;
use std::time::Instant;

static START: OnceLock<Instant> = OnceLock::new();

/// Seconds elapsed since the first VM in this process was constructed, as
/// a wall-clock measurement. `std` has no portable process-CPU-time clock,
/// so this is a deliberate substitution rather than a silent behavior
/// change.
pub fn clock(_args: &[Value]) -> Result<Value, String> {
    let start = START.get_or_init(Instant::now);
    Ok(Value::Number(start.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_returns_a_nonnegative_number() {
        match clock(&[]).unwrap() {
            Value::Number(seconds) => assert!(seconds >= 0.0),
            other => panic!("expected a number, got {other:?}"),
        }
    }
}

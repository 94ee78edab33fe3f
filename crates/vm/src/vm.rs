//! Call-frame based stack VM: dispatches one compiled function's bytecode,
//! and every function it calls, against a single shared value stack.

use crate::config::VmConfig;
use crate::natives;
use loxc_compiler::{compile, CompilerConfig};
use loxc_core::{Interner, Obj, ObjFunction, ObjNative, OpCode, Table, Value};
use std::io::Write;
use std::rc::Rc;

/// One active call: which function's chunk is executing, where `ip` is
/// within it, and where this call's locals begin on the shared stack.
struct CallFrame {
    function: Rc<ObjFunction>,
    ip: usize,
    /// Index into `Vm::stack` of slot 0 (the callee itself; locals start
    /// at `slots + 1`).
    slots: usize,
}

/// Outcome of running a top-level program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// [`InterpretResult`] plus the process exit code the driver contract
/// assigns to it, so `loxc-cli` never has to re-derive the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpretOutcome {
    pub result: InterpretResult,
    pub exit_code: i32,
}

impl From<InterpretResult> for InterpretOutcome {
    fn from(result: InterpretResult) -> Self {
        let exit_code = match result {
            InterpretResult::Ok => 0,
            InterpretResult::CompileError => 65,
            InterpretResult::RuntimeError => 70,
        };
        Self { result, exit_code }
    }
}

/// The interpreter. Owns every heap object it has ever allocated (the
/// "intrusive object list" is realized here as a plain append-only
/// `Vec<Obj>`; objects are released in one pass, on `Drop`, never mid-run).
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    interner: Interner,
    objects: Vec<Obj>,
    config: VmConfig,
    stdout: Box<dyn Write>,
}

impl Vm {
    /// A VM that prints to real stdout, for the `run`/`repl` CLI paths.
    pub fn new(config: VmConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stdout()))
    }

    /// A VM that prints to a caller-supplied sink, for tests and any
    /// driver that wants to capture output instead of inheriting stdout.
    pub fn with_writer(config: VmConfig, stdout: Box<dyn Write>) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(config.stack_max),
            frames: Vec::with_capacity(config.frames_max),
            globals: Table::new(),
            interner: Interner::new(),
            objects: Vec::new(),
            config,
            stdout,
        };
        vm.define_native("clock", 0, natives::clock);
        vm
    }

    fn define_native(&mut self, name: &'static str, arity: u8, function: loxc_core::NativeFn) {
        let native = Rc::new(ObjNative { name, arity, function });
        let handle = self.interner.intern(name);
        self.objects.push(Obj::Native(Rc::clone(&native)));
        self.globals.set(handle, Value::Obj(Obj::Native(native)));
    }

    /// Compiles and runs `source` against this VM's state. Globals,
    /// interned strings, and allocated objects persist across calls, so a
    /// REPL can interpret one line at a time against the same `Vm`.
    pub fn interpret(&mut self, source: &str, compiler_config: &CompilerConfig) -> InterpretResult {
        let mut stderr = std::io::stderr();
        let function = match compile(source, &mut self.interner, compiler_config, &mut stderr) {
            Some(function) => function,
            None => return InterpretResult::CompileError,
        };

        self.objects.push(Obj::Function(Rc::clone(&function)));
        self.stack.push(Value::Obj(Obj::Function(Rc::clone(&function))));
        if self.call(function, 0).is_err() {
            self.reset_stack();
            return InterpretResult::RuntimeError;
        }

        self.run()
    }

    fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("dispatch loop never pops an empty stack")
    }

    fn peek(&self, distance: usize) -> &Value {
        let len = self.stack.len();
        &self.stack[len - 1 - distance]
    }

    fn runtime_error(&mut self, message: &str) {
        eprintln!("{message}");
        for frame in self.frames.iter().rev() {
            let line = frame.function.chunk.lines[frame.ip.saturating_sub(1)];
            eprintln!("[line {line}] in {}", frame.function.display_name());
        }
        self.reset_stack();
    }

    fn call(&mut self, function: Rc<ObjFunction>, argc: u8) -> Result<(), ()> {
        if argc != function.arity {
            self.runtime_error(&format!(
                "Expected {} arguments but got {}.",
                function.arity, argc
            ));
            return Err(());
        }
        if self.frames.len() == self.config.frames_max {
            self.runtime_error("Stack overflow.");
            return Err(());
        }
        let slots = self.stack.len() - argc as usize - 1;
        self.frames.push(CallFrame { function, ip: 0, slots });
        Ok(())
    }

    fn call_value(&mut self, callee: Value, argc: u8) -> Result<(), ()> {
        match callee {
            Value::Obj(Obj::Function(function)) => self.call(function, argc),
            Value::Obj(Obj::Native(native)) => {
                if argc != native.arity {
                    self.runtime_error(&format!(
                        "Expected {} arguments but got {}.",
                        native.arity, argc
                    ));
                    return Err(());
                }
                let args_start = self.stack.len() - argc as usize;
                let result = (native.function)(&self.stack[args_start..]);
                self.stack.truncate(args_start - 1);
                match result {
                    Ok(value) => {
                        self.push(value);
                        Ok(())
                    }
                    Err(message) => {
                        self.runtime_error(&message);
                        Err(())
                    }
                }
            }
            _ => {
                self.runtime_error("Can only call functions and classes.");
                Err(())
            }
        }
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("run() never dispatches with an empty frame stack");
        let byte = frame.function.chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    fn read_constant(&mut self) -> Value {
        let idx = self.read_byte() as usize;
        let frame = self.frames.last().expect("run() never dispatches with an empty frame stack");
        frame.function.chunk.constants[idx].clone()
    }

    fn read_string_constant(&mut self) -> Rc<loxc_core::ObjString> {
        match self.read_constant() {
            Value::Obj(Obj::String(handle)) => handle,
            _ => unreachable!("identifier constants are always interned strings"),
        }
    }

    fn concatenate(&mut self, a: Rc<loxc_core::ObjString>, b: Rc<loxc_core::ObjString>) {
        let joined = format!("{a}{b}");
        let handle = self.interner.intern(&joined);
        self.objects.push(Obj::String(Rc::clone(&handle)));
        self.push(Value::Obj(Obj::String(handle)));
    }

    fn run(&mut self) -> InterpretResult {
        loop {
            if self.config.trace_execution {
                let frame = self.frames.last().expect("non-empty during run");
                tracing::trace!(
                    ip = frame.ip,
                    stack_depth = self.stack.len(),
                    "dispatch"
                );
            }

            let byte = self.read_byte();
            let Some(op) = OpCode::from_u8(byte) else {
                self.runtime_error("Corrupt bytecode: unknown opcode.");
                return InterpretResult::RuntimeError;
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots;
                    self.push(self.stack[base + slot].clone());
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slots;
                    self.stack[base + slot] = self.peek(0).clone();
                }
                OpCode::GetGlobal => {
                    let name = self.read_string_constant();
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value);
                        }
                        None => {
                            self.runtime_error(&format!("Undefined variable '{name}'."));
                            return InterpretResult::RuntimeError;
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string_constant();
                    let value = self.pop();
                    self.globals.set(name, value);
                }
                OpCode::SetGlobal => {
                    // Probe with `get` first rather than inserting and
                    // then deleting on a miss: same observable behavior
                    // (assigning to an undefined global is an error and
                    // never creates it), no transient tombstone.
                    let name = self.read_string_constant();
                    if self.globals.get(&name).is_none() {
                        self.runtime_error(&format!("Undefined variable '{name}'."));
                        return InterpretResult::RuntimeError;
                    }
                    let value = self.peek(0).clone();
                    self.globals.set(name, value);
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => {
                    if let Err(result) = self.binary_compare(|a, b| a > b) {
                        return result;
                    }
                }
                OpCode::Less => {
                    if let Err(result) = self.binary_compare(|a, b| a < b) {
                        return result;
                    }
                }
                OpCode::Add => {
                    if let Err(result) = self.add() {
                        return result;
                    }
                }
                OpCode::Subtract => {
                    if let Err(result) = self.binary_number(|a, b| a - b) {
                        return result;
                    }
                }
                OpCode::Multiply => {
                    if let Err(result) = self.binary_number(|a, b| a * b) {
                        return result;
                    }
                }
                OpCode::Divide => {
                    if let Err(result) = self.binary_number(|a, b| a / b) {
                        return result;
                    }
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => {
                    if !matches!(self.peek(0), Value::Number(_)) {
                        self.runtime_error("Operand must be a number.");
                        return InterpretResult::RuntimeError;
                    }
                    let value = self.pop().as_number().expect("checked above");
                    self.push(Value::Number(-value));
                }
                OpCode::Print => {
                    let value = self.pop();
                    let _ = writeln!(self.stdout, "{value}");
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize).clone();
                    if self.call_value(callee, argc).is_err() {
                        return InterpretResult::RuntimeError;
                    }
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("run() never dispatches with an empty frame stack");
                    if self.frames.is_empty() {
                        self.stack.pop();
                        return InterpretResult::Ok;
                    }
                    self.stack.truncate(frame.slots);
                    self.push(result);
                }
            }
        }
    }

    fn binary_number(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), InterpretResult> {
        let (Value::Number(_), Value::Number(_)) = (self.peek(0), self.peek(1)) else {
            self.runtime_error("Operands must be numbers.");
            return Err(InterpretResult::RuntimeError);
        };
        let b = self.pop().as_number().expect("checked above");
        let a = self.pop().as_number().expect("checked above");
        self.push(Value::Number(op(a, b)));
        Ok(())
    }

    fn binary_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), InterpretResult> {
        let (Value::Number(_), Value::Number(_)) = (self.peek(0), self.peek(1)) else {
            self.runtime_error("Operands must be numbers.");
            return Err(InterpretResult::RuntimeError);
        };
        let b = self.pop().as_number().expect("checked above");
        let a = self.pop().as_number().expect("checked above");
        self.push(Value::Bool(op(a, b)));
        Ok(())
    }

    fn add(&mut self) -> Result<(), InterpretResult> {
        match (self.peek(0), self.peek(1)) {
            (Value::Number(_), Value::Number(_)) => {
                let b = self.pop().as_number().expect("checked above");
                let a = self.pop().as_number().expect("checked above");
                self.push(Value::Number(a + b));
                Ok(())
            }
            (Value::Obj(Obj::String(_)), Value::Obj(Obj::String(_))) => {
                let b = match self.pop() {
                    Value::Obj(Obj::String(s)) => s,
                    _ => unreachable!(),
                };
                let a = match self.pop() {
                    Value::Obj(Obj::String(s)) => s,
                    _ => unreachable!(),
                };
                self.concatenate(a, b);
                Ok(())
            }
            _ => {
                self.runtime_error("Operands must be two numbers or two strings.");
                Err(InterpretResult::RuntimeError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn run(source: &str) -> (InterpretResult, String) {
        let buffer = SharedBuffer::default();
        let mut vm = Vm::with_writer(VmConfig::default(), Box::new(buffer.clone()));
        let result = vm.interpret(source, &CompilerConfig::new());
        let output = String::from_utf8(buffer.0.borrow().clone()).unwrap();
        (result, output)
    }

    #[test]
    fn prints_arithmetic_result() {
        let (result, output) = run("print 1 + 2 * 3;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn string_concatenation_interns_the_result() {
        let (result, output) = run(r#"print "foo" + "bar";"#);
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "foobar\n");
    }

    #[test]
    fn globals_persist_across_interpret_calls() {
        let buffer = SharedBuffer::default();
        let mut vm = Vm::with_writer(VmConfig::default(), Box::new(buffer.clone()));
        assert_eq!(vm.interpret("var x = 1;", &CompilerConfig::new()), InterpretResult::Ok);
        assert_eq!(vm.interpret("print x;", &CompilerConfig::new()), InterpretResult::Ok);
        assert_eq!(String::from_utf8(buffer.0.borrow().clone()).unwrap(), "1\n");
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let (result, _) = run("print missing;");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn assigning_an_undefined_global_is_a_runtime_error_and_does_not_create_it() {
        let buffer = SharedBuffer::default();
        let mut vm = Vm::with_writer(VmConfig::default(), Box::new(buffer.clone()));
        assert_eq!(vm.interpret("x = 1;", &CompilerConfig::new()), InterpretResult::RuntimeError);
        assert_eq!(vm.interpret("print x;", &CompilerConfig::new()), InterpretResult::RuntimeError);
        assert_eq!(String::from_utf8(buffer.0.borrow().clone()).unwrap(), "");
    }

    #[test]
    fn type_mismatch_in_addition_is_a_runtime_error() {
        let (result, _) = run(r#"print 1 + "two";"#);
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn recursive_function_call_returns_expected_value() {
        let (result, output) = run(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);",
        );
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "55\n");
    }

    #[test]
    fn calling_a_non_callable_value_is_a_runtime_error() {
        let (result, _) = run("var x = 1; x();");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn wrong_arity_is_a_runtime_error() {
        let (result, _) = run("fun f(a, b) { return a; } f(1);");
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn while_loop_accumulates() {
        let (result, output) =
            run("var i = 0; var sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } print sum;");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "10\n");
    }

    #[test]
    fn for_loop_runs_increment_after_body() {
        let (result, output) = run("for (var i = 0; i < 3; i = i + 1) { print i; }");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "0\n1\n2\n");
    }

    #[test]
    fn clock_native_is_callable_and_shadowable() {
        let (result, _) = run("print clock();");
        assert_eq!(result, InterpretResult::Ok);

        let (result, output) = run("fun clock() { return 42; } print clock();");
        assert_eq!(result, InterpretResult::Ok);
        assert_eq!(output, "42\n");
    }

    #[test]
    fn stack_overflow_from_unbounded_recursion_is_a_runtime_error() {
        let buffer = SharedBuffer::default();
        let config = VmConfig::new().with_frames_max(8);
        let mut vm = Vm::with_writer(config, Box::new(buffer));
        let result =
            vm.interpret("fun recurse() { return recurse(); } print recurse();", &CompilerConfig::new());
        assert_eq!(result, InterpretResult::RuntimeError);
    }

    #[test]
    fn compile_error_does_not_panic_and_is_reported() {
        let (result, _) = run("var = ;");
        assert_eq!(result, InterpretResult::CompileError);
    }
}

//! Debug-only bytecode pretty-printer. Never on the hot path, only
//! reached when `CompilerConfig::dump_bytecode` is set or the `disassemble`
//! CLI subcommand asks for it directly.

use loxc_core::{Chunk, Obj, ObjFunction, OpCode, Value};

/// Prints every instruction in `chunk`, one per line, prefixed with its
/// byte offset and source line (`|` when the line repeats the previous
/// instruction's, so repeated line numbers don't clutter the output).
pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    println!("== {name} ==");
    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

/// Disassembles `function`'s own chunk, then recurses into every nested
/// function found in its constant pool, so one call surfaces an entire
/// program's bytecode.
pub fn disassemble_program(function: &ObjFunction) {
    disassemble_chunk(&function.chunk, function.display_name());
    for constant in &function.chunk.constants {
        if let Value::Obj(Obj::Function(nested)) = constant {
            disassemble_program(nested);
        }
    }
}

/// Disassembles one instruction at `offset` and returns the offset of the
/// next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    print!("{offset:04} ");
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        print!("   | ");
    } else {
        print!("{:4} ", chunk.lines[offset]);
    }

    let byte = chunk.code[offset];
    let Some(op) = OpCode::from_u8(byte) else {
        println!("Unknown opcode {byte}");
        return offset + 1;
    };

    match op {
        OpCode::Constant => constant_instruction(chunk, op, offset),
        OpCode::GetLocal | OpCode::SetLocal | OpCode::Call => byte_instruction(chunk, op, offset),
        OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(chunk, op, offset)
        }
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(chunk, op, offset, 1),
        OpCode::Loop => jump_instruction(chunk, op, offset, -1),
        _ => simple_instruction(op, offset),
    }
}

fn simple_instruction(op: OpCode, offset: usize) -> usize {
    println!("{}", op.name());
    offset + 1
}

fn byte_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    println!("{:<16} {:4}", op.name(), slot);
    offset + 2
}

fn constant_instruction(chunk: &Chunk, op: OpCode, offset: usize) -> usize {
    let index = chunk.code[offset + 1] as usize;
    println!("{:<16} {:4} '{}'", op.name(), index, chunk.constants[index]);
    offset + 2
}

fn jump_instruction(chunk: &Chunk, op: OpCode, offset: usize, sign: i32) -> usize {
    let jump = u16::from_be_bytes([chunk.code[offset + 1], chunk.code[offset + 2]]) as i32;
    let target = offset as i32 + 3 + sign * jump;
    println!("{:<16} {:4} -> {}", op.name(), offset, target);
    offset + 3
}

//! Core data model for the Lox bytecode VM.
//!
//! Holds exactly the pieces shared by the compiler and the VM: the tagged
//! [`Value`] union, the heap-[`object`] variants, the bytecode [`chunk`]
//! buffer, the open-addressed [`table`], and the string [`interner`] built
//! on top of it. Nothing in this crate knows how to scan, parse, or
//! execute bytecode.

pub mod chunk;
pub mod interner;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use interner::Interner;
pub use object::{NativeFn, Obj, ObjFunction, ObjNative, ObjString};
pub use table::Table;
pub use value::Value;

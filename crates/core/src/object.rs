//! Heap-object variants.
//!
//! There is no tracing garbage collector in this core: every `Obj` is
//! reference-counted, and the VM keeps one append-only `Vec<Obj>` (its
//! "intrusive object list") holding a strong handle to everything it has
//! ever allocated. Objects are released in one pass when the VM is
//! dropped, never mid-run. See `loxc-vm`'s `Vm` for the owning side of
//! this contract.

use crate::chunk::Chunk;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// An immutable interned string: content plus its cached FNV-1a hash.
///
/// Two `ObjString`s with equal bytes are always the *same* allocation
/// (the interning invariant lives in [`crate::interner::Interner`]), so
/// every place that needs string equality compares `Rc` identity instead
/// of bytes.
#[derive(Debug)]
pub struct ObjString {
    pub bytes: Box<str>,
    pub hash: u32,
}

impl ObjString {
    pub fn as_str(&self) -> &str {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for ObjString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bytes)
    }
}

/// A compiled function: its own chunk, declared arity, and an optional
/// name (`None` for the implicit top-level script function).
#[derive(Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub chunk: Chunk,
    pub name: Option<Rc<ObjString>>,
}

impl ObjFunction {
    pub fn new(name: Option<Rc<ObjString>>) -> Self {
        Self { arity: 0, chunk: Chunk::new(), name }
    }

    /// `"script"` for the implicit top-level function, else the
    /// declared name, used by stack traces and `<fn NAME>` printing.
    pub fn display_name(&self) -> &str {
        match &self.name {
            Some(name) => name.as_str(),
            None => "script",
        }
    }
}

/// Signature every native function must have: the raw argument slice (not
/// including the callee slot), returning either a value or an error
/// message to surface as a runtime error.
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

/// A Rust function exposed to Lox code under a fixed name.
pub struct ObjNative {
    pub name: &'static str,
    pub arity: u8,
    pub function: NativeFn,
}

impl fmt::Debug for ObjNative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjNative").field("name", &self.name).finish()
    }
}

/// A heap-object handle. Cloning an `Obj` clones the `Rc`, not the
/// payload, so identity is preserved. String equality and global/local
/// storage both depend on that.
#[derive(Debug, Clone)]
pub enum Obj {
    String(Rc<ObjString>),
    Function(Rc<ObjFunction>),
    Native(Rc<ObjNative>),
}

impl Obj {
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::String(_) => "string",
            Obj::Function(_) => "function",
            Obj::Native(_) => "native function",
        }
    }
}

impl PartialEq for Obj {
    /// Identity comparison for every variant, per the data model's
    /// "same object handle" equality rule.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Obj::String(a), Obj::String(b)) => Rc::ptr_eq(a, b),
            (Obj::Function(a), Obj::Function(b)) => Rc::ptr_eq(a, b),
            (Obj::Native(a), Obj::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::String(s) => write!(f, "{s}"),
            Obj::Function(func) => write!(f, "<fn {}>", func.display_name()),
            Obj::Native(n) => write!(f, "<native fn {}>", n.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obj_string_identity_not_content() {
        let a = Rc::new(ObjString { bytes: "hi".into(), hash: 1 });
        let b = Rc::new(ObjString { bytes: "hi".into(), hash: 1 });
        assert_ne!(Obj::String(a.clone()), Obj::String(b));
        assert_eq!(Obj::String(a.clone()), Obj::String(a));
    }

    #[test]
    fn display_name_falls_back_to_script() {
        let func = ObjFunction::new(None);
        assert_eq!(func.display_name(), "script");
    }
}

//! Runtime objects shared by the compiler's constant pool and the VM.
//!
//! Heap values are reference counted. Booleans and `Null` are plain enum
//! variants, so comparing them is comparing values.

mod builtins;
mod value;


pub use builtins::{BUILTINS, Builtin, BuiltinError, BuiltinFn, lookup_builtin};
pub use value::{Closure, CompiledFunction, HashKey, HashPair, HashPairs, Object, ObjectType};

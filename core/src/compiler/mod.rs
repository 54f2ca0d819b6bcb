//! Bytecode compiler for Monkey programs.
//!
//! This module turns an AST into a [`Bytecode`](crate::vm::Bytecode) unit: a
//! flat instruction buffer for the top-level program plus a constant pool that
//! holds literals and compiled function bodies.
//!
//! ## Design
//!
//! - Single recursive walk over the AST, emitting into the current
//!   compilation scope
//! - Each function body gets its own scope and child symbol table
//! - Forward jumps are emitted with a placeholder operand and patched in place
//!   once the target is known
//! - The symbol table and constants can be threaded across compiles so that
//!   globals persist between inputs

mod bytecode;
mod error;
mod symbol_table;


pub use bytecode::Compiler;
pub use error::CompileError;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

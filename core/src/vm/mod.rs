//! Binary instruction format and the stack machine that executes it.

mod code;
mod error;
mod frame;
mod globals;
mod instruction_set;
mod runtime;
mod stack;

#[cfg(test)]
mod runtime_test;

pub use code::Bytecode;
pub use error::{EncodingError, VmError};
pub use globals::GlobalStore;
pub use instruction_set::{
    Definition, Instructions, OPCODE_COUNT, Opcode, lookup, make, read_operands, read_u8, read_u16,
};
pub use runtime::VM;
pub use stack::Stack;

//! Instruction encoding and VM execution errors.
//!
//! The VM is fail-fast: the first error aborts `run()` and the VM instance
//! should be discarded. Only the global store may be carried forward.

use miette::Diagnostic;
use thiserror::Error;

use crate::object::{BuiltinError, ObjectType};
use crate::vm::Opcode;

/// Errors from encoding or decoding the binary instruction format.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EncodingError {
    /// Byte does not name any opcode (corrupted or foreign instruction stream).
    #[error("opcode {0} undefined")]
    #[diagnostic(code(monkey::encoding::unknown_opcode))]
    UnknownOpcode(u8),

    #[error("{opcode} expects {expected} operand(s), got {got}")]
    #[diagnostic(code(monkey::encoding::operand_count))]
    OperandCount {
        opcode: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("operand {operand} of {opcode} does not fit in {width} byte(s)")]
    #[diagnostic(code(monkey::encoding::operand_overflow))]
    OperandOverflow {
        opcode: &'static str,
        operand: usize,
        width: usize,
    },

    #[error("{opcode} instruction truncated at operand offset {offset}")]
    #[diagnostic(code(monkey::encoding::truncated))]
    Truncated { opcode: &'static str, offset: usize },
}

/// Errors raised while executing bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum VmError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Encoding(#[from] EncodingError),

    /// Binary operation on operand types it does not support.
    #[error("unsupported types for {op}: {left} {right}")]
    #[diagnostic(code(monkey::vm::type_mismatch))]
    TypeMismatch {
        op: Opcode,
        left: ObjectType,
        right: ObjectType,
    },

    #[error("unsupported type for negation: {0}")]
    #[diagnostic(code(monkey::vm::type_mismatch))]
    UnsupportedNegation(ObjectType),

    #[error("division by zero")]
    #[diagnostic(code(monkey::vm::division_by_zero))]
    DivisionByZero,

    #[error("stack overflow (capacity {capacity})")]
    #[diagnostic(code(monkey::vm::stack_overflow))]
    StackOverflow { capacity: usize },

    #[error("stack underflow")]
    #[diagnostic(code(monkey::vm::stack_underflow))]
    StackUnderflow,

    #[error("stack overflow: call depth exceeds {max_frames} frames")]
    #[diagnostic(
        code(monkey::vm::frame_overflow),
        help("look for unbounded recursion")
    )]
    FrameOverflow { max_frames: usize },

    /// Operand of a load instruction points past its table (corrupted
    /// bytecode or constants from another compile).
    #[error("{opcode} operand {operand} out of range")]
    #[diagnostic(code(monkey::vm::operand_out_of_range))]
    OperandOutOfRange { opcode: Opcode, operand: usize },

    #[error("undefined global at slot {0}")]
    #[diagnostic(code(monkey::vm::undefined_global))]
    UndefinedGlobal(usize),

    #[error("global slot {index} out of range (capacity {capacity})")]
    #[diagnostic(code(monkey::vm::global_out_of_range))]
    GlobalOutOfRange { index: usize, capacity: usize },

    #[error("unusable as hash key: {0}")]
    #[diagnostic(
        code(monkey::vm::unusable_hash_key),
        help("only INTEGER, BOOLEAN and STRING values can be hash keys")
    )]
    UnusableHashKey(ObjectType),

    #[error("index operator not supported: {collection}[{index}]")]
    #[diagnostic(code(monkey::vm::index_not_supported))]
    IndexNotSupported {
        collection: ObjectType,
        index: ObjectType,
    },

    #[error("calling non-function: {0}")]
    #[diagnostic(code(monkey::vm::not_callable))]
    NotCallable(ObjectType),

    #[error("wrong number of arguments: want={want}, got={got}")]
    #[diagnostic(code(monkey::vm::wrong_argument_count))]
    WrongArgumentCount { want: usize, got: usize },

    #[error("constant {0} is not a function")]
    #[diagnostic(code(monkey::vm::not_a_function))]
    NotAFunction(usize),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Builtin(#[from] BuiltinError),
}

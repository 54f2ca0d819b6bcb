//! Bytecode compilation errors.

use miette::Diagnostic;
use thiserror::Error;

use crate::vm::EncodingError;

/// Errors that abort a compilation.
///
/// The first error wins; the partially emitted bytecode is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    #[diagnostic(code(monkey::compiler::undefined_variable))]
    UndefinedVariable(String),

    #[error("unknown operator {0}")]
    #[diagnostic(code(monkey::compiler::unknown_operator))]
    UnknownOperator(String),

    /// More locals in one function than `GetLocal`/`SetLocal` can address.
    #[error("too many local bindings in one function (limit: 256)")]
    #[diagnostic(code(monkey::compiler::too_many_locals))]
    TooManyLocals,

    /// Operand out of range, e.g. more than 65536 constants.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Encoding(#[from] EncodingError),
}

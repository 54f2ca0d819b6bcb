//! Public error type for the Monkey API.

use miette::Diagnostic;
use thiserror::Error;

use crate::{compiler::CompileError, vm::VmError};

/// Error returned by [`Session::eval`](crate::api::Session::eval).
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum Error {
    /// The input did not compile. Nothing from it was kept.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    /// The input compiled but failed while running. Its bindings and any
    /// globals assigned before the failure were kept.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runtime(#[from] VmError),
}

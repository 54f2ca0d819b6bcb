//! Monkey - a small dynamically typed language, compiled to bytecode
//!
//! # Overview
//!
//! This crate is the host-facing entry point. It re-exports the compiler and
//! virtual machine from `monkey-core` and adds error rendering.
//!
//! Programs arrive as an AST built by an external parser (or by hand, with
//! [`ast::builder`]). A [`Session`] compiles and runs them one after another,
//! keeping globals alive in between:
//!
//! ```
//! use monkey::{Object, Session};
//! use monkey::ast::builder::*;
//!
//! let mut session = Session::default();
//!
//! // let add = fn(a, b) { a + b };
//! session
//!     .eval(&program(vec![let_(
//!         "add",
//!         func(&["a", "b"], vec![expr(infix(ident("a"), "+", ident("b")))]),
//!     )]))
//!     .unwrap();
//!
//! // add(1, 2)
//! let result = session.eval(&program(vec![expr(call(ident("add"), vec![int(1), int(2)]))]));
//! assert_eq!(result, Ok(Object::Integer(3)));
//! ```

mod error_renderer;

// Re-export public API from monkey_core
pub use monkey_core::api::{Error, Session, VmOptions, compile, run};
pub use monkey_core::{ast, compiler, object, vm};

// Re-export commonly used types
pub use monkey_core::compiler::{CompileError, Compiler};
pub use monkey_core::object::Object;
pub use monkey_core::vm::{Bytecode, VM, VmError};

pub use error_renderer::{
    render_error, render_error_to, render_error_to_string, render_error_to_string_no_color,
};

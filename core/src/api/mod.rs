//! Public API for evaluating Monkey programs.
//!
//! [`Session`] is the entry point for hosts that evaluate input incrementally
//! (a REPL, a notebook). [`compile`] and [`run`] cover the one-shot case.
//!
//! # Example
//!
//! ```
//! use monkey_core::api::{compile, run};
//! use monkey_core::ast::builder::*;
//! use monkey_core::object::Object;
//!
//! // if (1 < 2) { 10 } else { 20 }
//! let program = program(vec![expr(if_else(
//!     infix(int(1), "<", int(2)),
//!     vec![expr(int(10))],
//!     vec![expr(int(20))],
//! ))]);
//!
//! let bytecode = compile(&program).unwrap();
//! assert_eq!(run(bytecode).unwrap(), Object::Integer(10));
//! ```

pub mod error;
pub mod options;
pub mod session;

pub use error::Error;
pub use options::VmOptions;
pub use session::{Session, compile, run};

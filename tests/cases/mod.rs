//! Shared harness for the integration tests.
//!
//! Each `vm_case!` evaluates a hand-built program in a fresh [`Session`] and
//! checks either the resulting value or the rendered error message.
//!
//! ```ignore
//! vm_case!(
//!     addition,
//!     program: [expr(infix(int(1), "+", int(2)))],
//!     expected: Object::Integer(3),
//! );
//! ```

#![allow(dead_code)]

use monkey::{Error, Object, Session, ast::Program};

pub fn eval(program: &Program) -> Result<Object, Error> {
    Session::default().eval(program)
}

pub fn ints(values: &[i64]) -> Object {
    Object::array(values.iter().copied().map(Object::Integer).collect())
}

macro_rules! vm_case {
    ($name:ident, program: [$($stmt:expr),* $(,)?], expected: $expected:expr $(,)?) => {
        #[test]
        fn $name() {
            let program = monkey::ast::builder::program(vec![$($stmt),*]);
            pretty_assertions::assert_eq!(cases::eval(&program), Ok($expected));
        }
    };
    ($name:ident, program: [$($stmt:expr),* $(,)?], error: $message:expr $(,)?) => {
        #[test]
        fn $name() {
            let program = monkey::ast::builder::program(vec![$($stmt),*]);
            let error = cases::eval(&program).expect_err("evaluation should fail");
            pretty_assertions::assert_eq!(error.to_string(), $message);
        }
    };
}

//! Builtin functions, resolved through the `Builtin` symbol scope.
//!
//! The position of a builtin in [`BUILTINS`] is its `GetBuiltin` operand, so
//! the order is part of the bytecode format.

use std::rc::Rc;

use miette::Diagnostic;
use thiserror::Error;

use crate::object::{Object, ObjectType};

pub type BuiltinFn = fn(&[Object]) -> Result<Object, BuiltinError>;

#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum BuiltinError {
    #[error("wrong number of arguments to `{name}`. got={got}, want={want}")]
    #[diagnostic(code(monkey::builtin::argument_count))]
    WrongArgumentCount {
        name: &'static str,
        want: usize,
        got: usize,
    },

    #[error("argument to `{name}` not supported, got {got}")]
    #[diagnostic(code(monkey::builtin::argument_type))]
    ArgumentNotSupported { name: &'static str, got: ObjectType },

    #[error("argument to `{name}` must be {expected}, got {got}")]
    #[diagnostic(code(monkey::builtin::argument_type))]
    ArgumentMustBe {
        name: &'static str,
        expected: ObjectType,
        got: ObjectType,
    },
}

pub static BUILTINS: [Builtin; 6] = [
    Builtin {
        name: "len",
        func: len,
    },
    Builtin {
        name: "puts",
        func: puts,
    },
    Builtin {
        name: "first",
        func: first,
    },
    Builtin {
        name: "last",
        func: last,
    },
    Builtin {
        name: "rest",
        func: rest,
    },
    Builtin {
        name: "push",
        func: push,
    },
];

/// Find a builtin by name, returning its index as well.
pub fn lookup_builtin(name: &str) -> Option<(usize, &'static Builtin)> {
    BUILTINS
        .iter()
        .enumerate()
        .find(|(_, builtin)| builtin.name == name)
}

fn expect_args(name: &'static str, args: &[Object], want: usize) -> Result<(), BuiltinError> {
    if args.len() != want {
        return Err(BuiltinError::WrongArgumentCount {
            name,
            want,
            got: args.len(),
        });
    }
    Ok(())
}

fn expect_array<'a>(name: &'static str, arg: &'a Object) -> Result<&'a [Object], BuiltinError> {
    arg.as_array().ok_or(BuiltinError::ArgumentMustBe {
        name,
        expected: ObjectType::Array,
        got: arg.object_type(),
    })
}

fn len(args: &[Object]) -> Result<Object, BuiltinError> {
    expect_args("len", args, 1)?;
    match &args[0] {
        Object::String(s) => Ok(Object::Integer(s.chars().count() as i64)),
        Object::Array(elements) => Ok(Object::Integer(elements.len() as i64)),
        other => Err(BuiltinError::ArgumentNotSupported {
            name: "len",
            got: other.object_type(),
        }),
    }
}

fn puts(args: &[Object]) -> Result<Object, BuiltinError> {
    for arg in args {
        println!("{}", arg);
    }
    Ok(Object::Null)
}

fn first(args: &[Object]) -> Result<Object, BuiltinError> {
    expect_args("first", args, 1)?;
    let elements = expect_array("first", &args[0])?;
    Ok(elements.first().cloned().unwrap_or(Object::Null))
}

fn last(args: &[Object]) -> Result<Object, BuiltinError> {
    expect_args("last", args, 1)?;
    let elements = expect_array("last", &args[0])?;
    Ok(elements.last().cloned().unwrap_or(Object::Null))
}

fn rest(args: &[Object]) -> Result<Object, BuiltinError> {
    expect_args("rest", args, 1)?;
    let elements = expect_array("rest", &args[0])?;
    match elements.split_first() {
        Some((_, tail)) => Ok(Object::array(tail.to_vec())),
        None => Ok(Object::Null),
    }
}

fn push(args: &[Object]) -> Result<Object, BuiltinError> {
    expect_args("push", args, 2)?;
    let elements = expect_array("push", &args[0])?;
    let mut pushed = Vec::with_capacity(elements.len() + 1);
    pushed.extend_from_slice(elements);
    pushed.push(args[1].clone());
    Ok(Object::Array(Rc::new(pushed)))
}

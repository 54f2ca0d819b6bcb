//! Shorthand constructors for hand-built trees.
//!
//! ```
//! use monkey_core::ast::builder::*;
//!
//! // let one = 1; one + 2;
//! let program = program(vec![
//!     let_("one", int(1)),
//!     expr(infix(ident("one"), "+", int(2))),
//! ]);
//! assert_eq!(program.statements.len(), 2);
//! ```

use crate::ast::{BlockStatement, Expression, Program, Statement};

pub fn program(statements: Vec<Statement>) -> Program {
    Program::new(statements)
}

pub fn block(statements: Vec<Statement>) -> BlockStatement {
    BlockStatement::new(statements)
}

// === Statements ===

pub fn expr(expression: Expression) -> Statement {
    Statement::Expression(expression)
}

pub fn let_(name: &str, value: Expression) -> Statement {
    Statement::Let {
        name: name.to_string(),
        value,
    }
}

pub fn ret(value: Expression) -> Statement {
    Statement::Return(value)
}

// === Literals ===

pub fn int(value: i64) -> Expression {
    Expression::Integer(value)
}

pub fn boolean(value: bool) -> Expression {
    Expression::Boolean(value)
}

pub fn string(value: &str) -> Expression {
    Expression::String(value.to_string())
}

pub fn ident(name: &str) -> Expression {
    Expression::Identifier(name.to_string())
}

pub fn array(elements: Vec<Expression>) -> Expression {
    Expression::Array(elements)
}

pub fn hash(pairs: Vec<(Expression, Expression)>) -> Expression {
    Expression::Hash(pairs)
}

// === Operators ===

pub fn prefix(operator: &str, right: Expression) -> Expression {
    Expression::Prefix {
        operator: operator.to_string(),
        right: Box::new(right),
    }
}

pub fn infix(left: Expression, operator: &str, right: Expression) -> Expression {
    Expression::Infix {
        left: Box::new(left),
        operator: operator.to_string(),
        right: Box::new(right),
    }
}

pub fn index(left: Expression, index: Expression) -> Expression {
    Expression::Index {
        left: Box::new(left),
        index: Box::new(index),
    }
}

// === Control Flow & Functions ===

pub fn if_(condition: Expression, consequence: Vec<Statement>) -> Expression {
    Expression::If {
        condition: Box::new(condition),
        consequence: block(consequence),
        alternative: None,
    }
}

pub fn if_else(
    condition: Expression,
    consequence: Vec<Statement>,
    alternative: Vec<Statement>,
) -> Expression {
    Expression::If {
        condition: Box::new(condition),
        consequence: block(consequence),
        alternative: Some(block(alternative)),
    }
}

pub fn func(parameters: &[&str], body: Vec<Statement>) -> Expression {
    Expression::Function {
        parameters: parameters.iter().map(|p| p.to_string()).collect(),
        body: block(body),
    }
}

pub fn call(function: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call {
        function: Box::new(function),
        arguments,
    }
}

//! Incremental evaluation with state carried between inputs.

use core::mem;

use tracing::debug;

use crate::{
    api::{Error, VmOptions},
    ast::Program,
    compiler::{CompileError, Compiler, SymbolTable},
    object::Object,
    vm::{Bytecode, GlobalStore, VM, VmError},
};

/// Evaluates programs one after another, the way a REPL does.
///
/// Symbols, constants and globals defined by one [`Session::eval`] are visible
/// to the next.
///
/// # Example
///
/// ```
/// use monkey_core::api::{Session, VmOptions};
/// use monkey_core::ast::builder::*;
/// use monkey_core::object::Object;
///
/// let mut session = Session::new(VmOptions::default());
/// session.eval(&program(vec![let_("one", int(1))])).unwrap();
///
/// let result = session.eval(&program(vec![expr(infix(ident("one"), "+", int(1)))]));
/// assert_eq!(result, Ok(Object::Integer(2)));
/// ```
#[derive(Debug)]
pub struct Session {
    options: VmOptions,
    symbol_table: SymbolTable,
    constants: Vec<Object>,
    globals: GlobalStore,
}

impl Session {
    pub fn new(options: VmOptions) -> Self {
        Self {
            options,
            symbol_table: SymbolTable::with_builtins(),
            constants: Vec::new(),
            globals: GlobalStore::new(options.globals_size),
        }
    }

    /// Compile and run `program`, returning the value of its last expression
    /// statement.
    ///
    /// A compile error leaves the session untouched. A runtime error keeps the
    /// new bindings and every global assigned before the failure.
    pub fn eval(&mut self, program: &Program) -> Result<Object, Error> {
        let mut compiler = Compiler::with_state(self.symbol_table.clone(), self.constants.clone());
        compiler.compile(program)?;
        let (bytecode, symbol_table) = compiler.into_parts();
        self.symbol_table = symbol_table;
        self.constants = bytecode.constants.clone();

        let globals = mem::replace(&mut self.globals, GlobalStore::new(0));
        let mut vm = VM::with_globals(bytecode, globals, self.options);
        let outcome = vm.run();
        let result = vm.last_popped_stack_element().clone();
        self.globals = vm.into_globals();

        if let Err(e) = &outcome {
            debug!(error = %e, "eval failed at runtime");
        }
        outcome?;
        Ok(result)
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn constants(&self) -> &[Object] {
        &self.constants
    }

    pub fn globals(&self) -> &GlobalStore {
        &self.globals
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(VmOptions::default())
    }
}

/// Compile `program` with a fresh symbol table.
pub fn compile(program: &Program) -> Result<Bytecode, CompileError> {
    Compiler::compile_program(program)
}

/// Run `bytecode` with default options, returning the last popped value.
pub fn run(bytecode: Bytecode) -> Result<Object, VmError> {
    let mut vm = VM::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped_stack_element().clone())
}

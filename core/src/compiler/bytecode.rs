//! Bytecode compiler implementation.

use core::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::{
    ast::{BlockStatement, Expression, Program, Statement},
    compiler::{CompileError, Symbol, SymbolScope, SymbolTable},
    object::{CompiledFunction, Object},
    vm::{Bytecode, Instructions, Opcode, make},
};

/// Operand emitted for a forward jump before its target is known.
const JUMP_PLACEHOLDER: usize = 9999;

/// Largest slot index addressable by `GetLocal`/`SetLocal`.
const MAX_LOCAL_INDEX: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Instruction buffer of one function body (or of the top-level program).
///
/// Jump targets and patch positions are offsets into this buffer.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

/// Compiles a [`Program`] into [`Bytecode`].
///
/// The constant pool and the symbol table outlive a single compile: a host
/// that evaluates input incrementally threads them from one compiler to the
/// next with [`Compiler::with_state`] and [`Compiler::into_parts`].
pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,

    /// Scope currently receiving instructions.
    scope: CompilationScope,
    /// Enclosing scopes, outermost first.
    enclosing: Vec<CompilationScope>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A fresh compiler whose global symbol table knows every builtin.
    pub fn new() -> Self {
        Self::with_state(SymbolTable::with_builtins(), Vec::new())
    }

    /// Resume from the symbol table and constants of an earlier compile.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        Self {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    /// Convenience method to compile a program in one call.
    pub fn compile_program(program: &Program) -> Result<Bytecode, CompileError> {
        let mut compiler = Self::new();
        compiler.compile(program)?;
        Ok(compiler.into_parts().0)
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        debug!(
            instructions = self.scope.instructions.len(),
            constants = self.constants.len(),
            "compiled program"
        );
        Ok(())
    }

    /// Snapshot of the top-level instructions and the constant pool.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn into_parts(self) -> (Bytecode, SymbolTable) {
        let bytecode = Bytecode {
            instructions: self.scope.instructions,
            constants: self.constants,
        };
        (bytecode, self.symbol_table)
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    // === Statements ===

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression(expression) => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, &[])?;
            }
            Statement::Let { name, value } => {
                // The binding is not visible to its own initializer, except
                // through the function-name symbol of a function literal.
                match value {
                    Expression::Function { parameters, body } => {
                        self.compile_function(Some(name.as_str()), parameters, body)?
                    }
                    _ => self.compile_expression(value)?,
                }
                let symbol = self.symbol_table.define(name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index])?,
                    _ => {
                        if symbol.index > MAX_LOCAL_INDEX {
                            return Err(CompileError::TooManyLocals);
                        }
                        self.emit(Opcode::SetLocal, &[symbol.index])?
                    }
                };
            }
            Statement::Return(value) => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[])?;
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        Ok(())
    }

    // === Expressions ===

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Integer(value) => {
                let index = self.add_constant(Object::Integer(*value));
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::String(value) => {
                let index = self.add_constant(Object::string(value));
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::Boolean(true) => {
                self.emit(Opcode::True, &[])?;
            }
            Expression::Boolean(false) => {
                self.emit(Opcode::False, &[])?;
            }
            Expression::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol)?;
            }
            Expression::Prefix { operator, right } => {
                let opcode = match operator.as_str() {
                    "!" => Opcode::Bang,
                    "-" => Opcode::Minus,
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
                self.compile_expression(right)?;
                self.emit(opcode, &[])?;
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                // `a < b` is compiled as `b > a`.
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[])?;
                    return Ok(());
                }
                let opcode = match operator.as_str() {
                    "+" => Opcode::Add,
                    "-" => Opcode::Sub,
                    "*" => Opcode::Mul,
                    "/" => Opcode::Div,
                    ">" => Opcode::GreaterThan,
                    "==" => Opcode::Equal,
                    "!=" => Opcode::NotEqual,
                    _ => return Err(CompileError::UnknownOperator(operator.clone())),
                };
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                self.emit(opcode, &[])?;
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
            Expression::Function { parameters, body } => {
                self.compile_function(None, parameters, body)?
            }
            Expression::Call {
                function,
                arguments,
            } => {
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.compile_expression(function)?;
                self.emit(Opcode::Call, &[arguments.len()])?;
            }
            Expression::Array(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()])?;
            }
            Expression::Hash(pairs) => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2])?;
            }
            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[])?;
            }
        }
        Ok(())
    }

    /// Layout:
    /// ```text
    ///     <condition>
    ///     JumpNotTruthy else
    ///     <consequence>
    ///     Jump end
    /// else:
    ///     <alternative> | Null
    /// end:
    /// ```
    fn compile_if(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: Option<&BlockStatement>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[JUMP_PLACEHOLDER])?;

        self.compile_branch(consequence)?;
        let jump = self.emit(Opcode::Jump, &[JUMP_PLACEHOLDER])?;

        let else_label = self.scope.instructions.len();
        self.change_operand(jump_not_truthy, else_label)?;

        match alternative {
            Some(block) => self.compile_branch(block)?,
            None => {
                self.emit(Opcode::Null, &[])?;
            }
        }

        let end_label = self.scope.instructions.len();
        self.change_operand(jump, end_label)?;
        Ok(())
    }

    /// Compile one arm of an `if` so that it leaves exactly one value.
    fn compile_branch(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        let start = self.scope.instructions.len();
        self.compile_block(block)?;
        if self.last_instruction_is(Opcode::Pop) && self.scope.instructions.len() > start {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &BlockStatement,
    ) -> Result<(), CompileError> {
        self.enter_scope();
        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            let symbol = self.symbol_table.define(parameter);
            if symbol.index > MAX_LOCAL_INDEX {
                return Err(CompileError::TooManyLocals);
            }
        }

        self.compile_block(body)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return()?;
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[])?;
        }

        let (instructions, table) = self.leave_scope();
        let free_symbols = table.free_symbols();
        // Captured values are pushed in the enclosing scope, in capture order.
        for symbol in free_symbols {
            self.load_symbol(symbol)?;
        }

        let function = CompiledFunction {
            instructions,
            num_locals: table.num_definitions(),
            num_parameters: parameters.len(),
        };
        trace!(
            name = name.unwrap_or("<anonymous>"),
            locals = function.num_locals,
            free = free_symbols.len(),
            "compiled function"
        );
        let index = self.add_constant(Object::CompiledFunction(Rc::new(function)));

        if free_symbols.is_empty() {
            self.emit(Opcode::Constant, &[index])?;
        } else {
            self.emit(Opcode::Closure, &[index, free_symbols.len()])?;
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<usize, CompileError> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        }
    }

    // === Constant Pool ===

    /// Append to the constant pool, returning the index.
    ///
    /// Indices past `u16::MAX` are caught when the `Constant` operand is
    /// encoded.
    fn add_constant(&mut self, object: Object) -> usize {
        self.constants.push(object);
        self.constants.len() - 1
    }

    // === Instruction Emission ===

    /// Encode and append an instruction, returning its position.
    pub(crate) fn emit(
        &mut self,
        opcode: Opcode,
        operands: &[usize],
    ) -> Result<usize, CompileError> {
        let instruction = make(opcode, operands)?;
        let position = self.scope.instructions.append(&instruction);
        self.scope.previous_instruction = self.scope.last_instruction;
        self.scope.last_instruction = Some(EmittedInstruction { opcode, position });
        Ok(position)
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        matches!(self.scope.last_instruction, Some(last) if last.opcode == opcode)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last_instruction {
            self.scope.instructions.truncate(last.position);
            self.scope.last_instruction = self.scope.previous_instruction;
        }
    }

    fn replace_instruction(&mut self, position: usize, instruction: &Instructions) {
        self.scope.instructions.overwrite(position, instruction);
    }

    fn replace_last_pop_with_return(&mut self) -> Result<(), CompileError> {
        if let Some(last) = self.scope.last_instruction.as_mut() {
            let position = last.position;
            last.opcode = Opcode::ReturnValue;
            let instruction = make(Opcode::ReturnValue, &[])?;
            self.replace_instruction(position, &instruction);
        }
        Ok(())
    }

    // === Jump Patching ===

    /// Rewrite the operand of the instruction at `position` in place.
    ///
    /// Only valid for opcodes with a single fixed-width operand, which covers
    /// every jump.
    pub(crate) fn change_operand(
        &mut self,
        position: usize,
        operand: usize,
    ) -> Result<(), CompileError> {
        let opcode = Opcode::try_from(self.scope.instructions[position])?;
        let instruction = make(opcode, &[operand])?;
        self.replace_instruction(position, &instruction);
        Ok(())
    }

    // === Scope Management ===

    pub(crate) fn enter_scope(&mut self) {
        let outer = mem::take(&mut self.scope);
        self.enclosing.push(outer);
        self.symbol_table.enter();
    }

    /// Pop the current scope, returning its instructions and symbol table.
    pub(crate) fn leave_scope(&mut self) -> (Instructions, SymbolTable) {
        let outer = self.enclosing.pop().unwrap_or_default();
        let finished = mem::replace(&mut self.scope, outer);
        let table = self.symbol_table.leave();
        (finished.instructions, table)
    }

    #[cfg(test)]
    pub(crate) fn scope_depth(&self) -> usize {
        self.enclosing.len()
    }

    #[cfg(test)]
    pub(crate) fn current_instructions(&self) -> &Instructions {
        &self.scope.instructions
    }
}

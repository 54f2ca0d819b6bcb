use core::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::{
    api::VmOptions,
    object::{BUILTINS, Closure, HashPair, HashPairs, Object, ObjectType},
    vm::{
        Bytecode, EncodingError, GlobalStore, Opcode, Stack, VmError,
        frame::Frame,
        instruction_set::{read_u8, read_u16},
    },
};

/// Stack machine executing one [`Bytecode`] unit.
///
/// The operand stack and the call frames belong to this instance for the
/// duration of [`VM::run`]. Only the [`GlobalStore`] is meant to be carried
/// over to the next VM, via [`VM::into_globals`].
pub struct VM {
    constants: Vec<Object>,
    stack: Stack,
    globals: GlobalStore,

    /// Frame currently executing.
    frame: Frame,
    /// Suspended callers, outermost first.
    callers: Vec<Frame>,
    max_frames: usize,
}

impl VM {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_options(bytecode, VmOptions::default())
    }

    pub fn with_options(bytecode: Bytecode, options: VmOptions) -> Self {
        Self::with_globals(bytecode, GlobalStore::new(options.globals_size), options)
    }

    /// Run against globals left behind by an earlier VM.
    pub fn with_globals(bytecode: Bytecode, globals: GlobalStore, options: VmOptions) -> Self {
        Self {
            constants: bytecode.constants,
            stack: Stack::new(options.stack_size),
            globals,
            frame: Frame::main(bytecode.instructions),
            callers: Vec::new(),
            max_frames: options.max_frames,
        }
    }

    /// The value left by the most recent `Pop`: the result of the last
    /// expression statement.
    pub fn last_popped_stack_element(&self) -> &Object {
        self.stack.last_popped()
    }

    pub fn globals(&self) -> &GlobalStore {
        &self.globals
    }

    pub fn into_globals(self) -> GlobalStore {
        self.globals
    }

    #[cfg(test)]
    pub(crate) fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Execute until the top-level program ends.
    ///
    /// The first error aborts the run. Globals assigned before the failure
    /// stay assigned.
    pub fn run(&mut self) -> Result<(), VmError> {
        debug!(
            instructions = self.frame.instructions().len(),
            constants = self.constants.len(),
            "vm run"
        );

        loop {
            let ip = self.frame.ip;
            let Some(&byte) = self.frame.instructions().get(ip) else {
                if self.callers.is_empty() {
                    return Ok(());
                }
                // Falling off the end of a function body returns Null.
                self.return_from_call(Object::Null)?;
                continue;
            };
            let op = Opcode::try_from(byte)?;
            self.frame.ip = ip + 1;
            trace!(ip, opcode = %op, sp = self.stack.len(), "execute");

            match op {
                // ====================================================================
                // Constants & Stack
                // ====================================================================
                Opcode::Constant => {
                    let index = self.read_u16(op)?;
                    let constant = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or(VmError::OperandOutOfRange {
                            opcode: op,
                            operand: index,
                        })?;
                    self.stack.push(constant)?;
                }
                Opcode::Pop => {
                    self.stack.pop()?;
                }
                Opcode::True => self.stack.push(Object::Boolean(true))?,
                Opcode::False => self.stack.push(Object::Boolean(false))?,
                Opcode::Null => self.stack.push(Object::Null)?,

                // ====================================================================
                // Operators
                // ====================================================================
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?
                }
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?
                }
                Opcode::Minus => {
                    let operand = self.stack.pop()?;
                    match operand {
                        Object::Integer(value) => {
                            self.stack.push(Object::Integer(value.wrapping_neg()))?
                        }
                        other => return Err(VmError::UnsupportedNegation(other.object_type())),
                    }
                }
                Opcode::Bang => {
                    let operand = self.stack.pop()?;
                    self.stack.push(Object::Boolean(!operand.is_truthy()))?;
                }

                // ====================================================================
                // Control Flow
                // ====================================================================
                Opcode::Jump => {
                    let target = self.read_u16(op)?;
                    self.frame.ip = target;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16(op)?;
                    let condition = self.stack.pop()?;
                    if !condition.is_truthy() {
                        self.frame.ip = target;
                    }
                }

                // ====================================================================
                // Bindings
                // ====================================================================
                Opcode::SetGlobal => {
                    let index = self.read_u16(op)?;
                    let value = self.stack.pop()?;
                    self.globals.set(index, value)?;
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16(op)?;
                    let value = self.globals.get(index)?.clone();
                    self.stack.push(value)?;
                }
                Opcode::SetLocal => {
                    let index = self.read_u8(op)?;
                    let value = self.stack.pop()?;
                    self.stack.set(self.frame.base_pointer + index, value)?;
                }
                Opcode::GetLocal => {
                    let index = self.read_u8(op)?;
                    let slot = self.frame.base_pointer + index;
                    let value = self
                        .stack
                        .get(slot)
                        .cloned()
                        .ok_or(VmError::StackOverflow {
                            capacity: self.stack.capacity(),
                        })?;
                    self.stack.push(value)?;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8(op)?;
                    let builtin = BUILTINS.get(index).ok_or(VmError::OperandOutOfRange {
                        opcode: op,
                        operand: index,
                    })?;
                    self.stack.push(Object::Builtin(builtin))?;
                }
                Opcode::GetFree => {
                    let index = self.read_u8(op)?;
                    let value = self.frame.closure.free.get(index).cloned().ok_or(
                        VmError::OperandOutOfRange {
                            opcode: op,
                            operand: index,
                        },
                    )?;
                    self.stack.push(value)?;
                }

                // ====================================================================
                // Collections
                // ====================================================================
                Opcode::Array => {
                    let count = self.read_u16(op)?;
                    let elements = self.pop_n(count)?;
                    self.stack.push(Object::array(elements))?;
                }
                Opcode::Hash => {
                    let count = self.read_u16(op)?;
                    let entries = self.pop_n(count)?;
                    let hash = Self::build_hash(entries)?;
                    self.stack.push(hash)?;
                }
                Opcode::Index => {
                    let index = self.stack.pop()?;
                    let collection = self.stack.pop()?;
                    let element = Self::index(&collection, &index)?;
                    self.stack.push(element)?;
                }

                // ====================================================================
                // Functions
                // ====================================================================
                Opcode::Call => {
                    let argc = self.read_u16(op)?;
                    self.execute_call(argc)?;
                }
                Opcode::ReturnValue => {
                    let value = self.stack.pop()?;
                    if self.return_from_call(value)? {
                        return Ok(());
                    }
                }
                Opcode::Return => {
                    if self.return_from_call(Object::Null)? {
                        return Ok(());
                    }
                }
                Opcode::Closure => {
                    let index = self.read_u16(op)?;
                    let free_count = self.read_u8(op)?;
                    let function = match self.constants.get(index) {
                        Some(Object::CompiledFunction(function)) => Rc::clone(function),
                        _ => return Err(VmError::NotAFunction(index)),
                    };
                    let free = self.pop_n(free_count)?;
                    self.stack
                        .push(Object::Closure(Rc::new(Closure { function, free })))?;
                }
                Opcode::CurrentClosure => {
                    let closure = Rc::clone(&self.frame.closure);
                    self.stack.push(Object::Closure(closure))?;
                }
            }
        }
    }

    // === Operand Decoding ===

    fn read_u16(&mut self, op: Opcode) -> Result<usize, VmError> {
        let ip = self.frame.ip;
        let value = read_u16(self.frame.instructions(), ip).ok_or(EncodingError::Truncated {
            opcode: op.name(),
            offset: ip,
        })?;
        self.frame.ip = ip + 2;
        Ok(usize::from(value))
    }

    fn read_u8(&mut self, op: Opcode) -> Result<usize, VmError> {
        let ip = self.frame.ip;
        let value = read_u8(self.frame.instructions(), ip).ok_or(EncodingError::Truncated {
            opcode: op.name(),
            offset: ip,
        })?;
        self.frame.ip = ip + 1;
        Ok(usize::from(value))
    }

    // === Stack Helpers ===

    /// Pop the top `count` values, oldest first.
    fn pop_n(&mut self, count: usize) -> Result<Vec<Object>, VmError> {
        let start = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(VmError::StackUnderflow)?;
        let values = self.stack.top_slice(start).to_vec();
        self.stack.set_len(start)?;
        Ok(values)
    }

    // === Operators ===

    fn execute_binary_operation(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        let result = match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                Object::Integer(integer_arithmetic(op, *l, *r)?)
            }
            (Object::String(l), Object::String(r)) if op == Opcode::Add => {
                let mut concatenated = String::with_capacity(l.len() + r.len());
                concatenated.push_str(l);
                concatenated.push_str(r);
                Object::String(Rc::from(concatenated))
            }
            _ => return Err(type_mismatch(op, &left, &right)),
        };
        self.stack.push(result)
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), VmError> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        let result = match op {
            Opcode::Equal => left.identical(&right),
            Opcode::NotEqual => !left.identical(&right),
            _ => match (&left, &right) {
                (Object::Integer(l), Object::Integer(r)) => l > r,
                _ => return Err(type_mismatch(op, &left, &right)),
            },
        };
        self.stack.push(Object::Boolean(result))
    }

    fn build_hash(entries: Vec<Object>) -> Result<Object, VmError> {
        let mut pairs = HashPairs::with_capacity(entries.len() / 2);
        let mut entries = entries.into_iter();
        while let (Some(key), Some(value)) = (entries.next(), entries.next()) {
            let hash_key = key
                .hash_key()
                .ok_or(VmError::UnusableHashKey(key.object_type()))?;
            pairs.insert(hash_key, HashPair { key, value });
        }
        Ok(Object::Hash(Rc::new(pairs)))
    }

    fn index(collection: &Object, index: &Object) -> Result<Object, VmError> {
        match (collection, index) {
            (Object::Array(elements), Object::Integer(i)) => Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| elements.get(i))
                .cloned()
                .unwrap_or(Object::Null)),
            (Object::Hash(pairs), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or(VmError::UnusableHashKey(key.object_type()))?;
                Ok(pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null))
            }
            _ => Err(VmError::IndexNotSupported {
                collection: collection.object_type(),
                index: index.object_type(),
            }),
        }
    }

    // === Calls ===

    /// Stack on entry: `[..., arg0, ..., argN-1, callee]`.
    fn execute_call(&mut self, argc: usize) -> Result<(), VmError> {
        let callee = self.stack.pop()?;
        let base_pointer = self
            .stack
            .len()
            .checked_sub(argc)
            .ok_or(VmError::StackUnderflow)?;

        match callee {
            Object::Closure(closure) => self.call_closure(closure, argc, base_pointer),
            Object::CompiledFunction(function) => {
                self.call_closure(Rc::new(Closure::bare(function)), argc, base_pointer)
            }
            Object::Builtin(builtin) => {
                let result = (builtin.func)(self.stack.top_slice(base_pointer))?;
                self.stack.set_len(base_pointer)?;
                self.stack.push(result)
            }
            other => Err(VmError::NotCallable(other.object_type())),
        }
    }

    fn call_closure(
        &mut self,
        closure: Rc<Closure>,
        argc: usize,
        base_pointer: usize,
    ) -> Result<(), VmError> {
        let function = &closure.function;
        if argc != function.num_parameters {
            return Err(VmError::WrongArgumentCount {
                want: function.num_parameters,
                got: argc,
            });
        }
        // The main frame counts towards the limit.
        if self.callers.len() + 2 > self.max_frames {
            return Err(VmError::FrameOverflow {
                max_frames: self.max_frames,
            });
        }

        // Arguments already sit in the first locals; clear the rest, which
        // may still hold values from an earlier call.
        let locals_end = base_pointer + function.num_locals;
        for slot in base_pointer + argc..locals_end {
            self.stack.set(slot, Object::Null)?;
        }
        self.stack.set_len(locals_end)?;

        debug!(
            depth = self.callers.len() + 1,
            locals = function.num_locals,
            base_pointer,
            "call"
        );
        let caller = mem::replace(&mut self.frame, Frame::new(closure, base_pointer));
        self.callers.push(caller);
        Ok(())
    }

    /// Pop the current frame and hand `value` to the caller.
    ///
    /// Returns `true` when the frame was the top-level program, which ends the
    /// run with `value` as the last popped element.
    fn return_from_call(&mut self, value: Object) -> Result<bool, VmError> {
        match self.callers.pop() {
            Some(caller) => {
                let callee = mem::replace(&mut self.frame, caller);
                self.stack.set_len(callee.base_pointer)?;
                self.stack.push(value)?;
                Ok(false)
            }
            None => {
                self.stack.push(value)?;
                self.stack.pop()?;
                Ok(true)
            }
        }
    }
}

fn integer_arithmetic(op: Opcode, left: i64, right: i64) -> Result<i64, VmError> {
    match op {
        Opcode::Add => Ok(left.wrapping_add(right)),
        Opcode::Sub => Ok(left.wrapping_sub(right)),
        Opcode::Mul => Ok(left.wrapping_mul(right)),
        Opcode::Div if right == 0 => Err(VmError::DivisionByZero),
        Opcode::Div => Ok(left.wrapping_div(right)),
        _ => Err(VmError::TypeMismatch {
            op,
            left: ObjectType::Integer,
            right: ObjectType::Integer,
        }),
    }
}

fn type_mismatch(op: Opcode, left: &Object, right: &Object) -> VmError {
    VmError::TypeMismatch {
        op,
        left: left.object_type(),
        right: right.object_type(),
    }
}

use std::rc::Rc;

use crate::{
    object::{Closure, CompiledFunction},
    vm::Instructions,
};

/// One active call.
///
/// A frame keeps its own instruction pointer, so the caller's frame resumes
/// exactly where it left off when the callee returns.
#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub closure: Rc<Closure>,
    /// Offset of the next instruction to fetch.
    pub ip: usize,
    /// Stack index of the first local slot. Arguments occupy the first
    /// `num_parameters` locals.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    /// Frame for the top-level program, which runs as a function without
    /// locals.
    pub fn main(instructions: Instructions) -> Self {
        let function = CompiledFunction {
            instructions,
            num_locals: 0,
            num_parameters: 0,
        };
        Self::new(Rc::new(Closure::bare(Rc::new(function))), 0)
    }

    #[inline]
    pub fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }
}

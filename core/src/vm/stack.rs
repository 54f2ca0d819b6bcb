use core::fmt;

use crate::{object::Object, vm::VmError};

/// Fixed-capacity operand stack shared by every frame of one run.
///
/// Popping only moves the stack pointer: the popped slot keeps its value until
/// it is overwritten, which is how the VM exposes the result of the last
/// expression statement.
///
/// # Examples
///
/// ```
/// use monkey_core::{object::Object, vm::Stack};
///
/// let mut stack = Stack::new(4);
/// stack.push(Object::Integer(42)).unwrap();
/// assert_eq!(stack.pop().unwrap(), Object::Integer(42));
/// assert_eq!(stack.last_popped(), &Object::Integer(42));
/// assert_eq!(stack.len(), 0);
/// ```
pub struct Stack {
    items: Vec<Object>,
    /// Index of the next free slot; the top of the stack is `sp - 1`.
    sp: usize,
}

impl Stack {
    /// Creates a stack of `capacity` slots, all initialized to `Null`.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: vec![Object::Null; capacity],
            sp: 0,
        }
    }

    /// Pushes a value onto the stack.
    ///
    /// Fails with [`VmError::StackOverflow`] when every slot is in use.
    #[inline]
    pub fn push(&mut self, value: Object) -> Result<(), VmError> {
        let capacity = self.items.len();
        let slot = self
            .items
            .get_mut(self.sp)
            .ok_or(VmError::StackOverflow { capacity })?;
        *slot = value;
        self.sp += 1;
        Ok(())
    }

    /// Removes and returns the top value.
    #[inline]
    pub fn pop(&mut self) -> Result<Object, VmError> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(self.items[self.sp].clone())
    }

    /// Returns a reference to the top value without removing it.
    #[inline]
    pub fn peek(&self) -> Option<&Object> {
        self.sp.checked_sub(1).map(|top| &self.items[top])
    }

    /// The value in the slot just above the stack pointer.
    pub fn last_popped(&self) -> &Object {
        self.items.get(self.sp).unwrap_or(&Object::Null)
    }

    /// Returns the number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Live slots `[start, sp)`, oldest first.
    pub fn top_slice(&self, start: usize) -> &[Object] {
        &self.items[start.min(self.sp)..self.sp]
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.items.get(index)
    }

    /// Overwrites slot `index`. Slots at or above the stack pointer may be
    /// written; they become live once the pointer moves past them.
    pub fn set(&mut self, index: usize, value: Object) -> Result<(), VmError> {
        let capacity = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(VmError::StackOverflow { capacity })?;
        *slot = value;
        Ok(())
    }

    /// Moves the stack pointer. Growing past the capacity is an overflow.
    pub fn set_len(&mut self, sp: usize) -> Result<(), VmError> {
        if sp > self.items.len() {
            return Err(VmError::StackOverflow {
                capacity: self.items.len(),
            });
        }
        self.sp = sp;
        Ok(())
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("items", &self.top_slice(0))
            .field("capacity", &self.items.len())
            .finish()
    }
}

use crate::{object::Object, vm::VmError};

/// Global variable slots, indexed by the `SetGlobal`/`GetGlobal` operand.
///
/// The store outlives a single run: a host hands it from one VM to the next
/// so that globals defined by earlier input stay visible.
#[derive(Debug, Clone)]
pub struct GlobalStore {
    slots: Vec<Option<Object>>,
}

impl GlobalStore {
    /// A store with `size` unassigned slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, index: usize) -> Result<&Object, VmError> {
        match self.slots.get(index) {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(VmError::UndefinedGlobal(index)),
            None => Err(self.out_of_range(index)),
        }
    }

    pub fn set(&mut self, index: usize, value: Object) -> Result<(), VmError> {
        let error = self.out_of_range(index);
        let slot = self.slots.get_mut(index).ok_or(error)?;
        *slot = Some(value);
        Ok(())
    }

    fn out_of_range(&self, index: usize) -> VmError {
        VmError::GlobalOutOfRange {
            index,
            capacity: self.slots.len(),
        }
    }
}

impl Default for GlobalStore {
    fn default() -> Self {
        Self::new(crate::api::VmOptions::default().globals_size)
    }
}

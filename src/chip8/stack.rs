/// Maximum number of nested subroutine calls.
pub const STACK_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    Overflow,
    Underflow,
}

/// Fixed-capacity return address stack.
#[derive(Debug, Clone)]
pub struct CallStack {
    slots: [u16; STACK_DEPTH],
    sp: u8,
}

impl CallStack {
    pub const fn new() -> Self {
        Self {
            slots: [0; STACK_DEPTH],
            sp: 0,
        }
    }

    pub fn push(&mut self, address: u16) -> Result<(), StackError> {
        let slot = self
            .slots
            .get_mut(self.sp as usize)
            .ok_or(StackError::Overflow)?;
        *slot = address;
        self.sp += 1;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, StackError> {
        self.sp = self.sp.checked_sub(1).ok_or(StackError::Underflow)?;
        Ok(self.slots[self.sp as usize])
    }

    /// Current stack pointer, the number of live return addresses.
    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn is_empty(&self) -> bool {
        self.sp == 0
    }

    /// Live return addresses, oldest first.
    pub fn as_slice(&self) -> &[u16] {
        &self.slots[..self.sp as usize]
    }

    pub fn clear(&mut self) {
        self.slots = [0; STACK_DEPTH];
        self.sp = 0;
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

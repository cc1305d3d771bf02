use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Error)]
#[error("call stack capacity exceeded, pushing of address {address_not_pushed:X} failed")]
pub struct CallStackOverflowError {
    pub address_not_pushed: u16,
}

/// Return addresses of the subroutines currently being executed, innermost last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStack {
    addresses: Vec<u16>,
    capacity: usize,
}

impl CallStack {
    /// Nesting depth of the original CHIP-8 interpreter.
    pub const DEFAULT_CAPACITY: usize = 16;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            addresses: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.addresses.len() >= self.capacity
    }

    pub fn pop(&mut self) -> Option<u16> {
        self.addresses.pop()
    }

    pub fn push(&mut self, address: u16) -> Result<(), CallStackOverflowError> {
        if self.is_full() {
            return Err(CallStackOverflowError {
                address_not_pushed: address,
            });
        }
        self.addresses.push(address);
        Ok(())
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

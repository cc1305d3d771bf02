use std::ops::Range;

use crate::{nibble_ints::U12, screen::Screen};

use super::{CallStack, DataRegister, Key, Keypad, Timers};

/// Whether [`Instruction::WaitForKeyPress`](crate::instruction::Instruction::WaitForKeyPress)
/// is blocking execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum KeyWaitingState {
    NotWaiting,
    /// Waiting for a key that is pressed now and was not pressed in `keypad_at_last_check`.
    Waiting {
        target_register: DataRegister,
        keypad_at_last_check: Keypad,
    },
}

impl Default for KeyWaitingState {
    fn default() -> Self {
        Self::NotWaiting
    }
}

/// Everything a CHIP-8 program can observe or change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    pub(super) data_registers: [u8; DataRegister::COUNT],
    pub(super) address_register: U12,
    pub(super) memory: [u8; MachineState::MEMORY_LEN],
    pub(super) program_counter: u16,
    pub(super) call_stack: CallStack,
    pub(super) timers: Timers,
    pub(super) screen: Screen,
    pub(super) keypad: Keypad,
    pub(super) key_waiting_state: KeyWaitingState,
}

impl MachineState {
    /// Size of the address space in bytes.
    pub const MEMORY_LEN: usize = 0x1000;
    /// Address of the first instruction of a program.
    /// Everything below is reserved for the interpreter and the font.
    pub const PROGRAM_START: u16 = 0x200;
    /// The maximum length of a program in bytes.
    pub const MAX_PROGRAM_LEN: usize = Self::MEMORY_LEN - Self::PROGRAM_START as usize;

    pub(super) fn register(&self, register: DataRegister) -> u8 {
        self.data_registers[register as usize]
    }

    pub(super) fn set_register(&mut self, register: DataRegister, val: u8) {
        self.data_registers[register as usize] = val;
    }

    pub(super) fn is_key_pressed(&self, key: Key) -> bool {
        self.keypad.is_pressed(key)
    }

    /// The `len` bytes of memory starting at `I`,
    /// or `None` if they would extend past the end of memory.
    pub(super) fn range_at_address_register(&self, len: usize) -> Option<Range<usize>> {
        let start = usize::from(self.address_register.into_u16());
        let end = start + len;
        if end <= Self::MEMORY_LEN {
            Some(start..end)
        } else {
            None
        }
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            data_registers: [0; DataRegister::COUNT],
            address_register: U12::MIN,
            memory: [0; Self::MEMORY_LEN],
            program_counter: Self::PROGRAM_START,
            call_stack: CallStack::default(),
            timers: Timers::default(),
            screen: Screen::default(),
            keypad: Keypad::default(),
            key_waiting_state: KeyWaitingState::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_state() {
        let state = MachineState::default();

        assert_eq!(state.program_counter, 0x200);
        assert!(state.data_registers.iter().all(|&v| v == 0));
        assert!(state.memory.iter().all(|&b| b == 0));
        assert!(state.call_stack.is_empty());
        assert!(state.screen.is_blank());
        assert_eq!(state.key_waiting_state, KeyWaitingState::NotWaiting);
    }

    #[test]
    fn range_at_address_register_bounds() {
        let mut state = MachineState {
            address_register: U12::MAX,
            ..MachineState::default()
        };
        assert_eq!(state.range_at_address_register(1), Some(0xFFF..0x1000));
        assert_eq!(state.range_at_address_register(2), None);

        state.address_register = U12::MIN;
        assert_eq!(state.range_at_address_register(0), Some(0..0));
    }
}

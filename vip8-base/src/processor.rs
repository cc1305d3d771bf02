use std::{convert::TryFrom, fmt::Debug};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    font::Font,
    instruction::{Instruction, RawInstruction, UnknownInstructionError},
    nibble_ints::U12,
    screen::Screen,
};

mod call_stack;
mod data_register;
mod key;
mod machine_state;
mod runner;
mod timer;

pub use crate::screen::PartialOffscreenDrawing;
pub use call_stack::{CallStack, CallStackOverflowError};
pub use data_register::DataRegister;
pub use key::{Key, KeyState, Keypad};
pub use machine_state::MachineState;
use machine_state::KeyWaitingState;
pub use runner::{ControlEvent, ProcessorEvent};
pub use timer::{TimerMode, Timers};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("an out of bounds memory access was requested at {program_counter:X}")]
    OutOfBoundsMemoryAccess { program_counter: u16 },
    #[error("the call request at {program_counter:X} exceeds the maximum call stack size")]
    CallStackOverflow { program_counter: u16 },
    #[error("return was requested at {program_counter:X} with an empty call stack")]
    ReturnWithEmptyCallStack { program_counter: u16 },
    #[error("a key with an invalid (greater than 0xF) key id {requested_key_id:X} was referenced at {program_counter:X}")]
    NotAValidKey {
        program_counter: u16,
        requested_key_id: u8,
    },
    #[error("unknown instruction `{instruction:04X}` at {program_counter:X}")]
    UnknownInstruction {
        program_counter: u16,
        instruction: RawInstruction,
    },
}

/// Result of a single [`Processor::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction was executed to completion,
    /// or, for [`Instruction::WaitForKeyPress`], the wait was started or ended.
    Executed(Instruction),
    /// Blocked on [`Instruction::WaitForKeyPress`], nothing was executed.
    WaitingForKeyPress,
}

/// How the program counter moves after an instruction.
enum ProgramCounterUpdate {
    Next,
    SkipNext,
    Jump(u16),
    Hold,
}

impl ProgramCounterUpdate {
    fn skip_if(condition: bool) -> Self {
        if condition {
            Self::SkipNext
        } else {
            Self::Next
        }
    }
}

const INSTRUCTION_LEN: u16 = std::mem::size_of::<u16>() as u16;

pub struct Processor {
    state: MachineState,
    rng: SmallRng,
    partial_offscreen_drawing: PartialOffscreenDrawing,
    timer_mode: TimerMode,
    cycle_rate: u32,
    /// Set when the sound timer goes from zero to nonzero, see [`Processor::take_sound_started`].
    sound_started: bool,
}

impl Default for Processor {
    fn default() -> Self {
        ProcessorBuilder::new().build()
    }
}

impl Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("state", &self.state)
            .field("partial_offscreen_drawing", &self.partial_offscreen_drawing)
            .field("timer_mode", &self.timer_mode)
            .field("cycle_rate", &self.cycle_rate)
            .finish_non_exhaustive()
    }
}

impl Processor {
    /// Screen width in pixels.
    pub const SCREEN_WIDTH: usize = Screen::WIDTH;
    /// Screen height in pixels.
    pub const SCREEN_HEIGHT: usize = Screen::HEIGHT;

    pub fn builder() -> ProcessorBuilder {
        ProcessorBuilder::new()
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    pub fn screen(&self) -> &Screen {
        &self.state.screen
    }

    /// Get the value of a data register.
    pub fn register(&self, register: DataRegister) -> u8 {
        self.state.register(register)
    }

    /// The value of the special address register `I`.
    pub fn address_register(&self) -> u16 {
        self.state.address_register.into_u16()
    }

    pub fn program_counter(&self) -> u16 {
        self.state.program_counter
    }

    pub fn timers(&self) -> Timers {
        self.state.timers
    }

    /// Whether the sound timer is nonzero and a tone should be playing.
    pub fn sound_active(&self) -> bool {
        self.state.timers.sound_active()
    }

    /// Whether the sound timer went from zero to nonzero since the last call,
    /// even if it has run out again in the meantime.
    pub fn take_sound_started(&mut self) -> bool {
        std::mem::take(&mut self.sound_started)
    }

    pub fn is_waiting_for_key(&self) -> bool {
        self.state.key_waiting_state != KeyWaitingState::NotWaiting
    }

    pub fn timer_mode(&self) -> TimerMode {
        self.timer_mode
    }

    /// Instructions per second the processor should be run at.
    pub fn cycle_rate(&self) -> u32 {
        self.cycle_rate
    }

    /// Get the state of a key.
    pub fn key_state(&self, key: Key) -> KeyState {
        self.state.keypad.get(key)
    }

    /// Set the state of a key.
    ///
    /// A pending [`Instruction::WaitForKeyPress`] only sees the change on the next [`Self::step`].
    pub fn set_key_state(&mut self, key: Key, state: KeyState) {
        self.state.keypad.set(key, state);
    }

    /// Decrement the delay and sound timers by one, stopping at zero.
    ///
    /// In [`TimerMode::Fixed60Hz`] this should be called 60 times per second.
    pub fn tick_timers(&mut self) {
        self.state.timers.tick();
    }

    /// Return decimal digits of a u8 value.
    /// The hundreds digit is the first element in the array,
    /// followed by the tens and single digits.
    fn decimal_digits_of_u8(num: u8) -> [u8; 3] {
        [num / 100, num / 10 % 10, num % 10]
    }

    fn fetch(&self) -> Result<RawInstruction, ProcessorError> {
        let program_counter = self.state.program_counter;
        let address = usize::from(program_counter);
        if address + 1 >= MachineState::MEMORY_LEN {
            return Err(ProcessorError::OutOfBoundsMemoryAccess { program_counter });
        }

        Ok(RawInstruction::from_bytes([
            self.state.memory[address],
            self.state.memory[address + 1],
        ]))
    }

    fn out_of_bounds(&self) -> ProcessorError {
        ProcessorError::OutOfBoundsMemoryAccess {
            program_counter: self.state.program_counter,
        }
    }

    /// Run a single instruction cycle.
    ///
    /// On error the state is left as it was before the call.
    pub fn step(&mut self) -> Result<StepOutcome, ProcessorError> {
        if let KeyWaitingState::Waiting {
            target_register,
            keypad_at_last_check,
        } = self.state.key_waiting_state
        {
            return Ok(self.poll_key_press(target_register, keypad_at_last_check));
        }

        let program_counter = self.state.program_counter;
        let raw_instruction = self.fetch()?;
        let instruction = Instruction::try_from(raw_instruction).map_err(
            |UnknownInstructionError(instruction)| ProcessorError::UnknownInstruction {
                program_counter,
                instruction,
            },
        )?;

        trace!(program_counter, ?instruction, "executing instruction");

        let program_counter_update = self.execute(instruction)?;
        self.state.program_counter = match program_counter_update {
            ProgramCounterUpdate::Next => program_counter.wrapping_add(INSTRUCTION_LEN),
            ProgramCounterUpdate::SkipNext => program_counter.wrapping_add(2 * INSTRUCTION_LEN),
            ProgramCounterUpdate::Jump(target_address) => target_address,
            ProgramCounterUpdate::Hold => program_counter,
        };

        if self.timer_mode == TimerMode::PerInstruction && !self.is_waiting_for_key() {
            self.state.timers.tick();
        }

        Ok(StepOutcome::Executed(instruction))
    }

    /// Finish a pending [`Instruction::WaitForKeyPress`] if a key was pressed since the last check.
    fn poll_key_press(
        &mut self,
        target_register: DataRegister,
        keypad_at_last_check: Keypad,
    ) -> StepOutcome {
        match self.state.keypad.first_pressed_since(&keypad_at_last_check) {
            Some(key) => {
                debug!(?key, ?target_register, "key pressed, resuming execution");
                self.state.set_register(target_register, key as u8);
                self.state.key_waiting_state = KeyWaitingState::NotWaiting;
                self.state.program_counter = self
                    .state
                    .program_counter
                    .wrapping_add(INSTRUCTION_LEN);
                if self.timer_mode == TimerMode::PerInstruction {
                    self.state.timers.tick();
                }
                StepOutcome::Executed(Instruction::WaitForKeyPress { target_register })
            }
            None => {
                self.state.key_waiting_state = KeyWaitingState::Waiting {
                    target_register,
                    keypad_at_last_check: self.state.keypad,
                };
                StepOutcome::WaitingForKeyPress
            }
        }
    }

    /// Apply the effects of `instruction`, except for the program counter update,
    /// which is returned instead.
    ///
    /// All error checks happen before the first mutation.
    fn execute(&mut self, instruction: Instruction) -> Result<ProgramCounterUpdate, ProcessorError> {
        let program_counter = self.state.program_counter;
        let state = &mut self.state;

        let update = match instruction {
            Instruction::ClearDisplay => {
                state.screen.clear();
                ProgramCounterUpdate::Next
            }
            Instruction::Return => {
                let return_address = state
                    .call_stack
                    .pop()
                    .ok_or(ProcessorError::ReturnWithEmptyCallStack { program_counter })?;
                ProgramCounterUpdate::Jump(return_address)
            }
            Instruction::Jump { target_address } => {
                ProgramCounterUpdate::Jump(target_address.into_u16())
            }
            Instruction::CallSubroutine { target_address } => {
                state
                    .call_stack
                    .push(program_counter.wrapping_add(INSTRUCTION_LEN))
                    .map_err(|CallStackOverflowError { .. }| {
                        ProcessorError::CallStackOverflow { program_counter }
                    })?;
                ProgramCounterUpdate::Jump(target_address.into_u16())
            }
            Instruction::SkipIfEqConst { register, constant } => {
                ProgramCounterUpdate::skip_if(state.register(register) == constant)
            }
            Instruction::SkipIfNeqConst { register, constant } => {
                ProgramCounterUpdate::skip_if(state.register(register) != constant)
            }
            Instruction::SkipIfEq {
                register1,
                register2,
            } => ProgramCounterUpdate::skip_if(state.register(register1) == state.register(register2)),
            Instruction::SkipIfNeq {
                register1,
                register2,
            } => ProgramCounterUpdate::skip_if(state.register(register1) != state.register(register2)),
            Instruction::AssignConst {
                target_register,
                constant,
            } => {
                state.set_register(target_register, constant);
                ProgramCounterUpdate::Next
            }
            Instruction::AddAssignConst {
                target_register,
                constant,
            } => {
                state.set_register(
                    target_register,
                    state.register(target_register).wrapping_add(constant),
                );
                ProgramCounterUpdate::Next
            }
            Instruction::Assign {
                target_register,
                source_register,
            } => {
                state.set_register(target_register, state.register(source_register));
                ProgramCounterUpdate::Next
            }
            Instruction::OrAssign {
                target_register,
                source_register,
            } => {
                state.set_register(
                    target_register,
                    state.register(target_register) | state.register(source_register),
                );
                ProgramCounterUpdate::Next
            }
            Instruction::AndAssign {
                target_register,
                source_register,
            } => {
                state.set_register(
                    target_register,
                    state.register(target_register) & state.register(source_register),
                );
                ProgramCounterUpdate::Next
            }
            Instruction::XorAssign {
                target_register,
                source_register,
            } => {
                state.set_register(
                    target_register,
                    state.register(target_register) ^ state.register(source_register),
                );
                ProgramCounterUpdate::Next
            }
            // For the flag-setting arithmetic, VF is written before the result,
            // so with `target_register == VF` the result wins.
            Instruction::AddAssign {
                target_register,
                source_register,
            } => {
                let (res, carry) = state
                    .register(target_register)
                    .overflowing_add(state.register(source_register));
                state.set_register(DataRegister::VF, carry as u8);
                state.set_register(target_register, res);
                ProgramCounterUpdate::Next
            }
            Instruction::SubAssign {
                target_register,
                source_register,
            } => {
                let (minuend, subtrahend) =
                    (state.register(target_register), state.register(source_register));
                state.set_register(DataRegister::VF, (minuend >= subtrahend) as u8);
                state.set_register(target_register, minuend.wrapping_sub(subtrahend));
                ProgramCounterUpdate::Next
            }
            Instruction::ShrAssign {
                target_register, ..
            } => {
                let val = state.register(target_register);
                state.set_register(DataRegister::VF, val & 0b1);
                state.set_register(target_register, val >> 1);
                ProgramCounterUpdate::Next
            }
            Instruction::RevSubAssign {
                target_register,
                source_register,
            } => {
                let (minuend, subtrahend) =
                    (state.register(source_register), state.register(target_register));
                state.set_register(DataRegister::VF, (minuend >= subtrahend) as u8);
                state.set_register(target_register, minuend.wrapping_sub(subtrahend));
                ProgramCounterUpdate::Next
            }
            Instruction::ShlAssign {
                target_register, ..
            } => {
                let val = state.register(target_register);
                state.set_register(DataRegister::VF, val >> 7);
                state.set_register(target_register, val << 1);
                ProgramCounterUpdate::Next
            }
            Instruction::AssignAddrToI { address } => {
                state.address_register = address;
                ProgramCounterUpdate::Next
            }
            Instruction::JumpOffset { address } => ProgramCounterUpdate::Jump(
                address
                    .into_u16()
                    .wrapping_add(u16::from(state.register(DataRegister::V0))),
            ),
            Instruction::AssignRandomMasked {
                target_register,
                mask,
            } => {
                let random_byte: u8 = self.rng.gen();
                state.set_register(target_register, random_byte & mask);
                ProgramCounterUpdate::Next
            }
            Instruction::DrawSprite {
                position_x_register,
                position_y_register,
                height,
            } => {
                let sprite = state
                    .range_at_address_register(usize::from(height.into_u8()))
                    .ok_or(ProcessorError::OutOfBoundsMemoryAccess { program_counter })?;
                let x = state.register(position_x_register);
                let y = state.register(position_y_register);
                let set_pixel_unset = state.screen.draw_sprite(
                    x,
                    y,
                    &state.memory[sprite],
                    self.partial_offscreen_drawing,
                );
                state.set_register(DataRegister::VF, set_pixel_unset as u8);
                ProgramCounterUpdate::Next
            }
            Instruction::SkipIfKeyPressed { key_register } => {
                let key = Self::key_in_register(state, key_register, program_counter)?;
                ProgramCounterUpdate::skip_if(state.is_key_pressed(key))
            }
            Instruction::SkipIfKeyNotPressed { key_register } => {
                let key = Self::key_in_register(state, key_register, program_counter)?;
                ProgramCounterUpdate::skip_if(!state.is_key_pressed(key))
            }
            Instruction::AssignDelayTimerVal { target_register } => {
                state.set_register(target_register, state.timers.delay);
                ProgramCounterUpdate::Next
            }
            Instruction::WaitForKeyPress { target_register } => {
                debug!(?target_register, "waiting for key press");
                state.key_waiting_state = KeyWaitingState::Waiting {
                    target_register,
                    keypad_at_last_check: state.keypad,
                };
                ProgramCounterUpdate::Hold
            }
            Instruction::SetDelayTimer { source_register } => {
                state.timers.delay = state.register(source_register);
                ProgramCounterUpdate::Next
            }
            Instruction::SetSoundTimer { source_register } => {
                let sound = state.register(source_register);
                if !state.timers.sound_active() && sound > 0 {
                    self.sound_started = true;
                }
                state.timers.sound = sound;
                ProgramCounterUpdate::Next
            }
            Instruction::AddAssignI { source_register } => {
                state.address_register = state
                    .address_register
                    .wrapping_add(u16::from(state.register(source_register)));
                ProgramCounterUpdate::Next
            }
            Instruction::AssignHexCharSpriteAddrToI { hex_char_register } => {
                let hex_char = u16::from(state.register(hex_char_register) & 0xF);
                state.address_register =
                    U12::from_u16_masked(hex_char * Font::GLYPH_LEN as u16);
                ProgramCounterUpdate::Next
            }
            Instruction::StoreBCD { source_register } => {
                let digits = state
                    .range_at_address_register(3)
                    .ok_or(ProcessorError::OutOfBoundsMemoryAccess { program_counter })?;
                let val = state.register(source_register);
                state.memory[digits].copy_from_slice(&Self::decimal_digits_of_u8(val));
                ProgramCounterUpdate::Next
            }
            Instruction::StoreRegisterValues { last_register } => {
                let target = state
                    .range_at_address_register(last_register as usize + 1)
                    .ok_or(ProcessorError::OutOfBoundsMemoryAccess { program_counter })?;
                state.memory[target]
                    .copy_from_slice(&state.data_registers[..=last_register as usize]);
                ProgramCounterUpdate::Next
            }
            Instruction::LoadRegisterValues { last_register } => {
                let source = state
                    .range_at_address_register(last_register as usize + 1)
                    .ok_or(ProcessorError::OutOfBoundsMemoryAccess { program_counter })?;
                state.data_registers[..=last_register as usize]
                    .copy_from_slice(&state.memory[source]);
                ProgramCounterUpdate::Next
            }
        };

        Ok(update)
    }

    fn key_in_register(
        state: &MachineState,
        key_register: DataRegister,
        program_counter: u16,
    ) -> Result<Key, ProcessorError> {
        let key_id = state.register(key_register);
        Key::try_from(key_id).map_err(|_| ProcessorError::NotAValidKey {
            program_counter,
            requested_key_id: key_id,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorBuilderError {
    #[error(
        "a program with a length ({program_len:#X}) greater than the usable length of memory ({:#X}) was supplied",
        MachineState::MAX_PROGRAM_LEN
    )]
    ProgramTooLarge { program_len: usize },
}

pub struct ProcessorBuilder {
    /// The partially initialized processor state
    state: MachineState,
    font: Font,
    partial_offscreen_drawing: PartialOffscreenDrawing,
    timer_mode: TimerMode,
    rng_seed: Option<u64>,
    cycle_rate: u32,
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorBuilder {
    /// Default for [`Self::cycle_rate`].
    pub const DEFAULT_CYCLE_RATE: u32 = 700;

    pub fn new() -> Self {
        Self {
            state: MachineState::default(),
            font: Font::default(),
            partial_offscreen_drawing: PartialOffscreenDrawing::default(),
            timer_mode: TimerMode::default(),
            rng_seed: None,
            cycle_rate: Self::DEFAULT_CYCLE_RATE,
        }
    }

    /// Copies the program into the processor's memory, starting at
    /// [`MachineState::PROGRAM_START`].
    pub fn program(mut self, program: &[u8]) -> Result<Self, ProcessorBuilderError> {
        if program.len() > MachineState::MAX_PROGRAM_LEN {
            return Err(ProcessorBuilderError::ProgramTooLarge {
                program_len: program.len(),
            });
        }

        let start = usize::from(MachineState::PROGRAM_START);
        self.state.memory[start..start + program.len()].copy_from_slice(program);

        Ok(self)
    }

    /// Set the font the processor should use.
    /// The font will be stored in processor memory starting at address 0x0.
    /// See also [`Font`].
    pub fn font(mut self, font: Font) -> Self {
        self.font = font;
        self
    }

    /// Set the partial offscreen drawing behavior for sprites.
    /// See also [`PartialOffscreenDrawing`].
    pub fn partial_offscreen_drawing(
        mut self,
        partial_offscreen_drawing: PartialOffscreenDrawing,
    ) -> Self {
        self.partial_offscreen_drawing = partial_offscreen_drawing;
        self
    }

    /// See [`TimerMode`].
    pub fn timer_mode(mut self, timer_mode: TimerMode) -> Self {
        self.timer_mode = timer_mode;
        self
    }

    /// Seed the random number generator used by
    /// [`Instruction::AssignRandomMasked`] for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Set the number of instructions per second [`Processor::start`] runs at.
    /// Values below 1 are raised to 1.
    pub fn cycle_rate(mut self, cycle_rate: u32) -> Self {
        self.cycle_rate = cycle_rate.max(1);
        self
    }

    pub fn build(mut self) -> Processor {
        self.state.memory[0..Font::LEN].copy_from_slice(self.font.bytes());
        Processor {
            state: self.state,
            rng: match self.rng_seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_entropy(),
            },
            partial_offscreen_drawing: self.partial_offscreen_drawing,
            timer_mode: self.timer_mode,
            cycle_rate: self.cycle_rate,
            sound_started: false,
        }
    }
}

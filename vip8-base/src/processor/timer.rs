/// When the delay and sound timers count down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    /// The timers are only decremented by [`Processor::tick_timers`](super::Processor::tick_timers),
    /// which the host calls at 60Hz independently of the instruction rate.
    Fixed60Hz,
    /// The timers are decremented once after every executed instruction,
    /// except while blocked on [`Instruction::WaitForKeyPress`](crate::instruction::Instruction::WaitForKeyPress).
    /// Timer speed then depends on the instruction rate.
    PerInstruction,
}

impl Default for TimerMode {
    fn default() -> Self {
        Self::Fixed60Hz
    }
}

impl TimerMode {
    /// Rate of the timer tick in [`TimerMode::Fixed60Hz`].
    pub const FIXED_RATE_HZ: u32 = 60;
}

/// Delay and sound timer, both counting down to zero and stopping there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    /// Decrement each nonzero timer by one.
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    /// Whether the sound timer is nonzero, i.e. a tone should be playing.
    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tick_saturates_at_zero() {
        let mut timers = Timers { delay: 1, sound: 0 };

        timers.tick();
        assert_eq!(timers, Timers { delay: 0, sound: 0 });

        timers.tick();
        assert_eq!(timers, Timers { delay: 0, sound: 0 });
    }

    #[test]
    fn tick_decrements_independently() {
        let mut timers = Timers { delay: 5, sound: 2 };

        timers.tick();
        assert_eq!(timers, Timers { delay: 4, sound: 1 });
        assert!(timers.sound_active());

        timers.tick();
        assert_eq!(timers, Timers { delay: 3, sound: 0 });
        assert!(!timers.sound_active());
    }
}

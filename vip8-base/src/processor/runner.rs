use std::{
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use flume::{Receiver, Sender, TryRecvError};
use tracing::{debug, error, info, instrument};

use crate::screen::Screen;

use super::{Key, KeyState, Processor, ProcessorError, TimerMode};

/// Events sent from the host to a running processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    KeyStateChange { key: Key, new_state: KeyState },
}

/// Events sent from a running processor to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorEvent {
    /// The screen differs from the one sent with the previous update.
    ScreenUpdate { new_screen: Screen },
    /// The processor is blocked until a key is pressed.
    WaitForKeyPress,
    /// The sound timer became nonzero.
    StartPlayingSound,
    /// The sound timer reached zero.
    StopPlayingSound,
    /// The processor stopped because of `error`.
    ErrorEncountered { error: ProcessorError },
}

enum RunState {
    Running,
    Stopped,
}

struct Runner {
    processor: Processor,
    control_event_receiver: Receiver<ControlEvent>,
    processor_event_sender: Sender<ProcessorEvent>,
    presented_screen: Screen,
    sound_playing: bool,
}

impl Processor {
    /// Run the processor on its own thread at [`Processor::cycle_rate`] instructions per second.
    ///
    /// Dropping the returned [`Sender`] stops the processor,
    /// the [`JoinHandle`] then yields `Ok(())`.
    /// If a [`ProcessorError`] occurs, it is sent as [`ProcessorEvent::ErrorEncountered`]
    /// and returned from the thread.
    pub fn start(
        self,
    ) -> io::Result<(
        Sender<ControlEvent>,
        Receiver<ProcessorEvent>,
        JoinHandle<Result<(), ProcessorError>>,
    )> {
        let (control_event_sender, control_event_receiver) = flume::unbounded();
        let (processor_event_sender, processor_event_receiver) = flume::unbounded();

        let runner = Runner {
            presented_screen: *self.screen(),
            sound_playing: false,
            processor: self,
            control_event_receiver,
            processor_event_sender,
        };
        let join_handle = thread::Builder::new()
            .name("processor".to_owned())
            .spawn(move || runner.run())?;

        Ok((control_event_sender, processor_event_receiver, join_handle))
    }
}

impl Runner {
    const TIMER_PERIOD: Duration =
        Duration::from_nanos(1_000_000_000 / TimerMode::FIXED_RATE_HZ as u64);

    #[instrument(
        name = "processor",
        skip(self),
        fields(cycle_rate = self.processor.cycle_rate(), timer_mode = ?self.processor.timer_mode())
    )]
    fn run(mut self) -> Result<(), ProcessorError> {
        info!("processor started");

        let cycle_period = Duration::from_secs(1) / self.processor.cycle_rate();
        let mut next_cycle = Instant::now();
        let mut next_timer_tick = next_cycle + Self::TIMER_PERIOD;

        loop {
            if let RunState::Stopped = self.cycle()? {
                info!("processor stopped");
                return Ok(());
            }

            if let RunState::Stopped = self.publish_changes() {
                info!("processor stopped");
                return Ok(());
            }

            if self.processor.timer_mode() == TimerMode::Fixed60Hz {
                while Instant::now() >= next_timer_tick {
                    self.processor.tick_timers();
                    next_timer_tick += Self::TIMER_PERIOD;
                }
            }

            next_cycle += cycle_period;
            let now = Instant::now();
            if next_cycle > now {
                spin_sleep::sleep(next_cycle - now);
            } else {
                // Running behind, don't try to catch up with a burst of cycles.
                next_cycle = now;
            }
        }
    }

    /// Apply pending control events, then step the processor once.
    ///
    /// While waiting for a key press, a press ends the batch of applied events,
    /// so a release queued right behind it can't hide it from the step.
    fn cycle(&mut self) -> Result<RunState, ProcessorError> {
        loop {
            match self.control_event_receiver.try_recv() {
                Ok(ControlEvent::KeyStateChange { key, new_state }) => {
                    debug!(?key, ?new_state, "key state changed");
                    self.processor.set_key_state(key, new_state);
                    if new_state == KeyState::Pressed && self.processor.is_waiting_for_key() {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("control event sender dropped");
                    return Ok(RunState::Stopped);
                }
            }
        }

        let was_waiting_for_key = self.processor.is_waiting_for_key();

        if let Err(error) = self.processor.step() {
            error!(%error, "error occurred running the CHIP-8 program");
            // The host may already be gone, the error is returned from the thread either way.
            let _ = self
                .processor_event_sender
                .send(ProcessorEvent::ErrorEncountered {
                    error: error.clone(),
                });
            return Err(error);
        }

        if !was_waiting_for_key && self.processor.is_waiting_for_key() {
            return Ok(self.send(ProcessorEvent::WaitForKeyPress));
        }

        Ok(RunState::Running)
    }

    /// Send screen and sound changes since the last call.
    fn publish_changes(&mut self) -> RunState {
        let screen = *self.processor.screen();
        if screen != self.presented_screen {
            self.presented_screen = screen;
            if let RunState::Stopped = self.send(ProcessorEvent::ScreenUpdate { new_screen: screen })
            {
                return RunState::Stopped;
            }
        }

        if self.processor.take_sound_started() {
            // The timer may have run out and been set again since the last call.
            if self.sound_playing {
                if let RunState::Stopped = self.set_sound_playing(false) {
                    return RunState::Stopped;
                }
            }
            if let RunState::Stopped = self.set_sound_playing(true) {
                return RunState::Stopped;
            }
        }

        let sound_active = self.processor.sound_active();
        if sound_active != self.sound_playing {
            return self.set_sound_playing(sound_active);
        }

        RunState::Running
    }

    fn set_sound_playing(&mut self, sound_playing: bool) -> RunState {
        self.sound_playing = sound_playing;
        debug!(sound_playing, "sound state changed");
        self.send(if sound_playing {
            ProcessorEvent::StartPlayingSound
        } else {
            ProcessorEvent::StopPlayingSound
        })
    }

    fn send(&self, event: ProcessorEvent) -> RunState {
        match self.processor_event_sender.send(event) {
            Ok(()) => RunState::Running,
            Err(_) => {
                debug!("processor event receiver dropped");
                RunState::Stopped
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{font::Font, processor::ProcessorBuilder};

    const TIMEOUT: Duration = Duration::from_secs(5);

    type Started = (
        Sender<ControlEvent>,
        Receiver<ProcessorEvent>,
        JoinHandle<Result<(), ProcessorError>>,
    );

    fn start_with(builder: ProcessorBuilder, program: &[u8]) -> Started {
        builder.program(program).unwrap().build().start().unwrap()
    }

    fn start(program: &[u8]) -> Started {
        start_with(ProcessorBuilder::new().cycle_rate(10_000), program)
    }

    fn assert_glyph_drawn(event: ProcessorEvent, glyph: usize) {
        match event {
            ProcessorEvent::ScreenUpdate { new_screen } => {
                let glyph_bytes =
                    &Font::Cosmac.bytes()[glyph * Font::GLYPH_LEN..(glyph + 1) * Font::GLYPH_LEN];
                for (y, glyph_byte) in glyph_bytes.iter().enumerate() {
                    assert_eq!(new_screen.row(y), u64::from(*glyph_byte) << 56);
                }
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn screen_update_then_stop_on_sender_drop() {
        // I = 0x000, draw glyph "0" at (V0, V0), spin
        let (control_event_sender, processor_event_receiver, join_handle) =
            start(&[0xA0, 0x00, 0xD0, 0x05, 0x12, 0x04]);

        assert_glyph_drawn(processor_event_receiver.recv_timeout(TIMEOUT).unwrap(), 0);

        drop(control_event_sender);
        assert_eq!(join_handle.join().unwrap(), Ok(()));
    }

    #[test]
    fn sound_starts_and_stops_once() {
        // V0 = 3, ST = V0, spin
        let (_control_event_sender, processor_event_receiver, _join_handle) =
            start(&[0x60, 0x03, 0xF0, 0x18, 0x12, 0x04]);

        assert_eq!(
            processor_event_receiver.recv_timeout(TIMEOUT),
            Ok(ProcessorEvent::StartPlayingSound)
        );
        assert_eq!(
            processor_event_receiver.recv_timeout(TIMEOUT),
            Ok(ProcessorEvent::StopPlayingSound)
        );
        assert!(processor_event_receiver
            .recv_timeout(Duration::from_millis(200))
            .is_err());
    }

    #[test]
    fn error_is_sent_and_returned() {
        let (_control_event_sender, processor_event_receiver, join_handle) = start(&[0x00, 0xEE]);

        let expected_error = ProcessorError::ReturnWithEmptyCallStack {
            program_counter: 0x200,
        };
        assert_eq!(
            processor_event_receiver.recv_timeout(TIMEOUT),
            Ok(ProcessorEvent::ErrorEncountered {
                error: expected_error.clone()
            })
        );
        assert_eq!(join_handle.join().unwrap(), Err(expected_error));
    }

    #[test]
    fn key_press_resumes_wait() {
        // V3 = key, I = glyph of V3, draw at (V0, V0), spin
        let (control_event_sender, processor_event_receiver, _join_handle) =
            start(&[0xF3, 0x0A, 0xF3, 0x29, 0xD0, 0x05, 0x12, 0x06]);

        assert_eq!(
            processor_event_receiver.recv_timeout(TIMEOUT),
            Ok(ProcessorEvent::WaitForKeyPress)
        );

        control_event_sender
            .send(ControlEvent::KeyStateChange {
                key: Key::K7,
                new_state: KeyState::Pressed,
            })
            .unwrap();

        assert_glyph_drawn(processor_event_receiver.recv_timeout(TIMEOUT).unwrap(), 7);
    }

    #[test]
    fn key_tapped_between_cycles_resumes_wait() {
        // Slow enough for the press and the release to be queued for the same cycle.
        let (control_event_sender, processor_event_receiver, _join_handle) = start_with(
            ProcessorBuilder::new().cycle_rate(20),
            &[0xF3, 0x0A, 0xF3, 0x29, 0xD0, 0x05, 0x12, 0x06],
        );

        assert_eq!(
            processor_event_receiver.recv_timeout(TIMEOUT),
            Ok(ProcessorEvent::WaitForKeyPress)
        );

        for new_state in [KeyState::Pressed, KeyState::NotPressed].iter().copied() {
            control_event_sender
                .send(ControlEvent::KeyStateChange {
                    key: Key::KA,
                    new_state,
                })
                .unwrap();
        }

        assert_glyph_drawn(processor_event_receiver.recv_timeout(TIMEOUT).unwrap(), 0xA);
    }

    mod single_tick_sound {
        use super::*;

        // V0 = 1, ST = V0, spin
        const PROGRAM: [u8; 6] = [0x60, 0x01, 0xF0, 0x18, 0x12, 0x04];

        fn assert_sound_starts_and_stops(timer_mode: TimerMode) {
            let (_control_event_sender, processor_event_receiver, _join_handle) = start_with(
                ProcessorBuilder::new()
                    .timer_mode(timer_mode)
                    .cycle_rate(1_000),
                &PROGRAM,
            );

            assert_eq!(
                processor_event_receiver.recv_timeout(TIMEOUT),
                Ok(ProcessorEvent::StartPlayingSound)
            );
            assert_eq!(
                processor_event_receiver.recv_timeout(TIMEOUT),
                Ok(ProcessorEvent::StopPlayingSound)
            );
        }

        #[test]
        fn per_instruction() {
            assert_sound_starts_and_stops(TimerMode::PerInstruction);
        }

        #[test]
        fn fixed_60hz() {
            assert_sound_starts_and_stops(TimerMode::Fixed60Hz);
        }
    }
}

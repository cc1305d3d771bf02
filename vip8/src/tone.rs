use std::time::Duration;

use rodio::Source;

/// An infinite, single channel square wave, the classic CHIP-8 buzzer.
///
/// The edges are softened by a short linear ramp to avoid clicking.
#[derive(Clone, Debug)]
pub struct EmulatorTone {
    /// Samples per period of the wave.
    period_len: f32,
    current_sample: u64,
}

impl EmulatorTone {
    const SAMPLE_RATE: u32 = 44_100;
    const AMPLITUDE: f32 = 0.25;
    /// Fraction of a half period spent ramping between high and low.
    const RAMP: f32 = 0.05;

    pub fn new(frequency: f32) -> Self {
        Self {
            period_len: Self::SAMPLE_RATE as f32 / frequency,
            current_sample: 0,
        }
    }

    /// The wave at `phase` in `[0, 1)` of a period.
    fn sample_at(phase: f32) -> f32 {
        let (half_phase, sign) = if phase < 0.5 {
            (phase * 2.0, 1.0)
        } else {
            ((phase - 0.5) * 2.0, -1.0)
        };
        let envelope = (half_phase / Self::RAMP).min(1.0);
        sign * envelope * Self::AMPLITUDE
    }
}

impl Iterator for EmulatorTone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let phase = (self.current_sample as f32 % self.period_len) / self.period_len;
        self.current_sample = self.current_sample.wrapping_add(1);

        Some(Self::sample_at(phase))
    }
}

impl Source for EmulatorTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        Self::SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn square_wave_halves() {
        assert_eq!(EmulatorTone::sample_at(0.25), EmulatorTone::AMPLITUDE);
        assert_eq!(EmulatorTone::sample_at(0.75), -EmulatorTone::AMPLITUDE);
        assert_eq!(EmulatorTone::sample_at(0.0), 0.0);
    }

    #[test]
    fn stays_within_amplitude() {
        let tone = EmulatorTone::new(440.0);

        assert!(tone
            .take(EmulatorTone::SAMPLE_RATE as usize)
            .all(|sample| sample.abs() <= EmulatorTone::AMPLITUDE));
    }
}

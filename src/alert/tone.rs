use rodio::Source;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FREQ_HZ: f32 = 880.0;
const PULSE_SECS: f32 = 0.55;

/// Classic pulsed alarm beep: an 880 Hz tone gated on and off once a second.
/// The source is infinite, so appending it to a sink loops it forever.
pub struct BeepTone {
    sample_rate: u32,
    samples: u64,
}

impl BeepTone {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            samples: 0,
        }
    }
}

impl Default for BeepTone {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for BeepTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.samples as f32 / self.sample_rate as f32;
        self.samples = self.samples.wrapping_add(1);

        let phase = t.fract();
        if phase < PULSE_SECS {
            // Short attack/decay ramps keep the gate from clicking.
            let edge = (phase / 0.01).min(1.0) * ((PULSE_SECS - phase) / 0.01).min(1.0);
            let value = (t * FREQ_HZ * std::f32::consts::TAU).sin();
            Some(value * edge * 0.8)
        } else {
            Some(0.0)
        }
    }
}

impl Source for BeepTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

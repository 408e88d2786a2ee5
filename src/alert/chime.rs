use rodio::Source;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Softer two-note chime: C5 and E5 played together under a slow tremolo.
pub struct Chime {
    sample_rate: u32,
    samples: u64,
}

impl Chime {
    pub fn new() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            samples: 0,
        }
    }
}

impl Default for Chime {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let t = self.samples as f32 / self.sample_rate as f32;
        self.samples = self.samples.wrapping_add(1);

        let tau = std::f32::consts::TAU;
        let pair = (t * 523.25 * tau).sin() + (t * 659.25 * tau).sin();
        let tremolo = 0.6 + 0.4 * (t * 0.8 * tau).sin();

        Some(pair * 0.5 * tremolo * 0.6)
    }
}

impl Source for Chime {
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

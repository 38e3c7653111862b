//! Periodic oscillator for tone voices

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Waveform types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
}

/// Frequency of a tone, either fixed or gliding over the tone's duration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frequency {
    /// Constant pitch in Hz
    Fixed(f64),
    /// Exponential glide from `from` Hz to `to` Hz
    Sweep { from: f64, to: f64 },
}

impl Frequency {
    /// Frequency at `t` seconds into a tone lasting `duration` seconds
    pub fn at(&self, t: f64, duration: f64) -> f64 {
        match *self {
            Frequency::Fixed(hz) => hz,
            Frequency::Sweep { from, to } => {
                if duration <= 0.0 {
                    return to;
                }
                let progress = (t / duration).clamp(0.0, 1.0);
                from * (to / from).powf(progress)
            }
        }
    }

    /// Starting frequency
    pub fn initial(&self) -> f64 {
        match *self {
            Frequency::Fixed(hz) => hz,
            Frequency::Sweep { from, .. } => from,
        }
    }

    /// Whether every frequency involved is finite and positive
    pub fn is_valid(&self) -> bool {
        let ok = |hz: f64| hz.is_finite() && hz > 0.0;
        match *self {
            Frequency::Fixed(hz) => ok(hz),
            Frequency::Sweep { from, to } => ok(from) && ok(to),
        }
    }
}

impl From<f64> for Frequency {
    fn from(hz: f64) -> Self {
        Frequency::Fixed(hz)
    }
}

/// A phase-accumulating oscillator
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f64,
    frequency: f64,
    sample_rate: f64,
}

impl Oscillator {
    /// Create a new oscillator
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Self {
            waveform,
            phase: 0.0,
            frequency,
            sample_rate,
        }
    }

    /// Set the frequency
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Get the current frequency
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Generate the next sample in -1.0..=1.0
    pub fn generate(&mut self) -> f64 {
        let p = self.phase;
        let sample = match self.waveform {
            Waveform::Sine => (p * 2.0 * PI).sin(),
            Waveform::Triangle => {
                if p < 0.25 {
                    4.0 * p
                } else if p < 0.75 {
                    2.0 - 4.0 * p
                } else {
                    4.0 * p - 4.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
            Waveform::Square => {
                if p < 0.5 { 1.0 } else { -1.0 }
            }
        };

        self.phase = (self.phase + self.frequency / self.sample_rate).fract();
        sample
    }
}

//! Resonant biquad filter
//!
//! Colors noise bursts. A narrow band-pass around a few kHz gives a "pop",
//! a low-pass gives a soft whoosh.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[serde(alias = "low_pass")]
    Lowpass,
    #[serde(alias = "high_pass")]
    Highpass,
    #[serde(alias = "band_pass")]
    Bandpass,
}

/// Filter parameters as they appear in a sound definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,

    /// Cutoff (low/high-pass) or center (band-pass) frequency in Hz
    pub frequency: f64,

    /// Resonance
    #[serde(default = "default_q")]
    pub q: f64,
}

fn default_q() -> f64 { 0.707 }

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

/// Biquad filter, Direct Form II transposed
#[derive(Debug, Clone)]
pub struct Filter {
    kind: FilterKind,
    frequency: f64,
    q: f64,
    coeffs: Coefficients,
    z1: f64,
    z2: f64,
}

impl Filter {
    /// Build a filter for the given sample rate.
    ///
    /// Fails when the frequency is not finite or falls outside
    /// (0, Nyquist). Resonance is clamped to 0.1..=20 to keep the filter
    /// stable.
    pub fn new(spec: &FilterSpec, sample_rate: f64) -> Result<Self> {
        let nyquist = sample_rate / 2.0;
        if !spec.frequency.is_finite() || spec.frequency <= 0.0 || spec.frequency >= nyquist {
            return Err(AudioError::SynthesisFailure(format!(
                "filter frequency {} Hz is outside 0..{} Hz",
                spec.frequency, nyquist
            )));
        }

        let frequency = spec.frequency.clamp(20.0, sample_rate * 0.45);
        let q = if spec.q.is_finite() { spec.q.clamp(0.1, 20.0) } else { default_q() };

        Ok(Self {
            kind: spec.kind,
            frequency,
            q,
            coeffs: coefficients(spec.kind, frequency, q, sample_rate),
            z1: 0.0,
            z2: 0.0,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Effective frequency after clamping
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Effective resonance after clamping
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Process a single sample
    pub fn process(&mut self, input: f64) -> f64 {
        let c = self.coeffs;
        let output = c.b0 * input + self.z1;

        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;

        output
    }

    /// Filter a buffer in place
    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

// RBJ cookbook coefficients, normalized by a0
fn coefficients(kind: FilterKind, frequency: f64, q: f64, sample_rate: f64) -> Coefficients {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = omega.cos();
    let alpha = omega.sin() / (2.0 * q);

    let (b0, b1, b2) = match kind {
        FilterKind::Lowpass => {
            let b1 = 1.0 - cos_omega;
            (b1 / 2.0, b1, b1 / 2.0)
        }
        FilterKind::Highpass => {
            let b1 = -(1.0 + cos_omega);
            (-b1 / 2.0, b1, -b1 / 2.0)
        }
        FilterKind::Bandpass => (alpha, 0.0, -alpha),
    };
    let a0 = 1.0 + alpha;

    Coefficients {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: -2.0 * cos_omega / a0,
        a2: (1.0 - alpha) / a0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f64 = 44100.0;

    fn spec(kind: FilterKind, frequency: f64, q: f64) -> FilterSpec {
        FilterSpec { kind, frequency, q }
    }

    fn rms_of_sine(filter: &mut Filter, freq: f64) -> f64 {
        let mut sum = 0.0;
        let mut count = 0;
        for i in 0..8820 {
            let input = (2.0 * PI * freq * i as f64 / RATE).sin();
            let output = filter.process(input);
            // Skip the settling period
            if i > 2000 {
                sum += output * output;
                count += 1;
            }
        }
        (sum / count as f64).sqrt()
    }

    #[test]
    fn test_rejects_out_of_range_frequency() {
        assert!(Filter::new(&spec(FilterKind::Lowpass, 0.0, 1.0), RATE).is_err());
        assert!(Filter::new(&spec(FilterKind::Lowpass, 30000.0, 1.0), RATE).is_err());
        assert!(Filter::new(&spec(FilterKind::Bandpass, f64::INFINITY, 1.0), RATE).is_err());
    }

    #[test]
    fn test_resonance_clamping() {
        let filter = Filter::new(&spec(FilterKind::Bandpass, 1000.0, 500.0), RATE).unwrap();
        assert_eq!(filter.q(), 20.0);

        let filter = Filter::new(&spec(FilterKind::Bandpass, 1000.0, 0.0), RATE).unwrap();
        assert_eq!(filter.q(), 0.1);
    }

    #[test]
    fn test_lowpass_attenuates_high_frequencies() {
        let mut filter = Filter::new(&spec(FilterKind::Lowpass, 200.0, 0.707), RATE).unwrap();
        let rms = rms_of_sine(&mut filter, 5000.0);
        assert!(rms < 0.05, "Expected attenuation, got rms={}", rms);
    }

    #[test]
    fn test_highpass_attenuates_low_frequencies() {
        let mut filter = Filter::new(&spec(FilterKind::Highpass, 2000.0, 0.707), RATE).unwrap();
        let rms = rms_of_sine(&mut filter, 100.0);
        assert!(rms < 0.05, "Expected attenuation, got rms={}", rms);
    }

    #[test]
    fn test_bandpass_passes_center() {
        let mut center = Filter::new(&spec(FilterKind::Bandpass, 1000.0, 5.0), RATE).unwrap();
        let mut off = center.clone();

        let at_center = rms_of_sine(&mut center, 1000.0);
        let off_center = rms_of_sine(&mut off, 4000.0);
        assert!(at_center > 0.6, "center rms={}", at_center);
        assert!(off_center < at_center * 0.2, "off={} center={}", off_center, at_center);
    }

    #[test]
    fn test_process_buffer_matches_process() {
        let mut a = Filter::new(&spec(FilterKind::Lowpass, 800.0, 1.0), RATE).unwrap();
        let mut b = a.clone();

        let mut buffer: Vec<f64> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let expected: Vec<f64> = buffer.iter().map(|&s| b.process(s)).collect();
        a.process_buffer(&mut buffer);

        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_filter_kind_aliases() {
        let kind: FilterKind = serde_yaml::from_str("band_pass").unwrap();
        assert_eq!(kind, FilterKind::Bandpass);
        let kind: FilterKind = serde_yaml::from_str("lowpass").unwrap();
        assert_eq!(kind, FilterKind::Lowpass);
    }
}

//! A single time-bounded synthesis instance
//!
//! A voice is a small signal graph: source -> optional filter -> gain. The
//! gain stage follows an [`EnvelopeCurve`]. Voices are built with a start
//! frame relative to "now" and anchored onto the rendering clock when the
//! mixer accepts them.

use super::{EnvelopeCurve, Filter, Frequency, Oscillator};

/// Longest duration, start offset or envelope a single voice may have
pub const MAX_VOICE_MS: f64 = 60_000.0;

/// Which strategy produced the voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceKind {
    Tone,
    Noise,
}

#[derive(Debug, Clone)]
enum Source {
    Tone {
        oscillator: Oscillator,
        frequency: Frequency,
        duration: f64,
    },
    Noise {
        samples: Vec<f64>,
    },
}

/// One scheduled voice
#[derive(Debug, Clone)]
pub struct Voice {
    source: Source,
    filter: Option<Filter>,
    envelope: EnvelopeCurve,
    sample_rate: f64,
    start_frame: u64,
    length: u64,
    position: u64,
}

impl Voice {
    /// Periodic tone voice. `duration` is the tone's nominal length in
    /// seconds; the voice lasts until the envelope ends.
    pub fn tone(
        oscillator: Oscillator,
        frequency: Frequency,
        duration: f64,
        envelope: EnvelopeCurve,
        start_frame: u64,
        sample_rate: f64,
    ) -> Self {
        let length = secs_to_frames(envelope.end(), sample_rate);
        Self {
            source: Source::Tone {
                oscillator,
                frequency,
                duration,
            },
            filter: None,
            envelope,
            sample_rate,
            start_frame,
            length,
            position: 0,
        }
    }

    /// Noise voice over a pre-rendered buffer. The voice ends with the
    /// buffer.
    pub fn noise(
        samples: Vec<f64>,
        filter: Option<Filter>,
        envelope: EnvelopeCurve,
        start_frame: u64,
        sample_rate: f64,
    ) -> Self {
        let length = samples.len() as u64;
        Self {
            source: Source::Noise { samples },
            filter,
            envelope,
            sample_rate,
            start_frame,
            length,
            position: 0,
        }
    }

    pub fn kind(&self) -> VoiceKind {
        match self.source {
            Source::Tone { .. } => VoiceKind::Tone,
            Source::Noise { .. } => VoiceKind::Noise,
        }
    }

    /// First frame the voice sounds on
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// Frame after the last one the voice sounds on
    pub fn stop_frame(&self) -> u64 {
        self.start_frame.saturating_add(self.length)
    }

    /// Length in frames
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Initial frequency for tone voices
    pub fn frequency(&self) -> Option<f64> {
        match &self.source {
            Source::Tone { frequency, .. } => Some(frequency.initial()),
            Source::Noise { .. } => None,
        }
    }

    pub fn envelope(&self) -> &EnvelopeCurve {
        &self.envelope
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Whether every frame has been rendered
    pub fn is_finished(&self) -> bool {
        self.position >= self.length
    }

    /// Move the voice onto the rendering clock
    pub(crate) fn anchor(&mut self, now: u64) {
        self.start_frame = self.start_frame.saturating_add(now);
    }

    /// Generate the next sample
    pub fn process(&mut self) -> f64 {
        if self.is_finished() {
            return 0.0;
        }

        let t = self.position as f64 / self.sample_rate;
        let raw = match &mut self.source {
            Source::Tone {
                oscillator,
                frequency,
                duration,
            } => {
                if let Frequency::Sweep { .. } = frequency {
                    oscillator.set_frequency(frequency.at(t, *duration));
                }
                oscillator.generate()
            }
            Source::Noise { samples } => samples.get(self.position as usize).copied().unwrap_or(0.0),
        };

        let filtered = match &mut self.filter {
            Some(filter) => filter.process(raw),
            None => raw,
        };

        self.position += 1;
        filtered * self.envelope.gain_at(t)
    }
}

/// Convert seconds to a whole number of frames, rounding to the nearest
pub fn secs_to_frames(secs: f64, sample_rate: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * sample_rate).round() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::{EnvelopeSpec, Waveform};

    const RATE: f64 = 1000.0;

    #[test]
    fn test_tone_length_follows_envelope() {
        let env = EnvelopeCurve::for_duration(&EnvelopeSpec::new(10.0, 10.0, 0.5, 30.0), 0.5, 0.1);
        let osc = Oscillator::new(Waveform::Sine, 100.0, RATE);
        let voice = Voice::tone(osc, Frequency::Fixed(100.0), 0.1, env, 5, RATE);

        assert_eq!(voice.kind(), VoiceKind::Tone);
        assert_eq!(voice.start_frame(), 5);
        assert_eq!(voice.length(), 100);
        assert_eq!(voice.stop_frame(), 105);
    }

    #[test]
    fn test_noise_length_follows_buffer() {
        let env = EnvelopeCurve::flat(1.0, 0.05);
        let voice = Voice::noise(vec![0.5; 50], None, env, 0, RATE);

        assert_eq!(voice.kind(), VoiceKind::Noise);
        assert_eq!(voice.length(), 50);
        assert_eq!(voice.frequency(), None);
    }

    #[test]
    fn test_voice_finishes_and_goes_silent() {
        let env = EnvelopeCurve::flat(1.0, 0.01);
        let mut voice = Voice::noise(vec![1.0; 10], None, env, 0, RATE);

        for _ in 0..10 {
            voice.process();
        }
        assert!(voice.is_finished());
        assert_eq!(voice.process(), 0.0);
    }

    #[test]
    fn test_gain_stage_scales_source() {
        let env = EnvelopeCurve::flat(0.25, 1.0);
        let mut voice = Voice::noise(vec![1.0; 1000], None, env, 0, RATE);
        assert!((voice.process() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_shifts_start() {
        let env = EnvelopeCurve::flat(1.0, 0.01);
        let mut voice = Voice::noise(vec![0.0; 10], None, env, 20, RATE);
        voice.anchor(1000);
        assert_eq!(voice.start_frame(), 1020);
        assert_eq!(voice.stop_frame(), 1030);
    }

    #[test]
    fn test_far_start_saturates_instead_of_overflowing() {
        let env = EnvelopeCurve::flat(1.0, 0.01);
        let mut voice = Voice::noise(vec![0.0; 10], None, env, u64::MAX - 5, RATE);
        assert_eq!(voice.stop_frame(), u64::MAX);

        voice.anchor(1000);
        assert_eq!(voice.start_frame(), u64::MAX);
        assert_eq!(voice.stop_frame(), u64::MAX);
    }

    #[test]
    fn test_secs_to_frames() {
        assert_eq!(secs_to_frames(0.1, 44100.0), 4410);
        assert_eq!(secs_to_frames(-1.0, 44100.0), 0);
        assert_eq!(secs_to_frames(f64::NAN, 44100.0), 0);
    }
}

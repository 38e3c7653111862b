//! ADSR envelope generator
//!
//! Attack-Decay-Sustain-Release gain curve for amplitude shaping. The curve
//! is a pure function of time since the voice started, so every voice can
//! evaluate it on its own local timeline.

use serde::{Deserialize, Serialize};

/// Lowest gain an exponential segment aims for. Exponential curves cannot
/// target zero.
pub const GAIN_FLOOR: f64 = 0.0001;

/// Fade-out applied to voices that have no envelope, to avoid a click when
/// the voice stops
pub const DEFAULT_FADE_SECS: f64 = 0.01;

/// Envelope parameters as they appear in a sound definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    /// Attack time in milliseconds
    #[serde(default)]
    pub attack_ms: f64,

    /// Decay time in milliseconds
    #[serde(default)]
    pub decay_ms: f64,

    /// Sustain level as a ratio of the peak (0.0-1.0)
    #[serde(default = "default_sustain")]
    pub sustain: f64,

    /// Release time in milliseconds
    #[serde(default)]
    pub release_ms: f64,
}

fn default_sustain() -> f64 { 1.0 }

impl EnvelopeSpec {
    /// Create an envelope spec from millisecond timings
    pub fn new(attack_ms: f64, decay_ms: f64, sustain: f64, release_ms: f64) -> Self {
        Self {
            attack_ms,
            decay_ms,
            sustain,
            release_ms,
        }
    }
}

/// Envelope stage at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvelopeStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// A fully resolved gain curve (times in seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeCurve {
    attack: f64,
    decay: f64,
    sustain: f64,
    release: f64,
    peak: f64,
    release_start: f64,
}

impl EnvelopeCurve {
    /// Build a curve that releases straight after the decay stage
    pub fn new(spec: &EnvelopeSpec, peak: f64) -> Self {
        Self::for_duration(spec, peak, 0.0)
    }

    /// Build a curve for a voice that should sound for `duration` seconds.
    ///
    /// The sustain stage holds until `duration - release`, but never starts
    /// the release before attack and decay have finished.
    pub fn for_duration(spec: &EnvelopeSpec, peak: f64, duration: f64) -> Self {
        let attack = ms_to_secs(spec.attack_ms);
        let decay = ms_to_secs(spec.decay_ms);
        let release = ms_to_secs(spec.release_ms);

        Self {
            attack,
            decay,
            sustain: sanitize(spec.sustain),
            release,
            peak: sanitize(peak),
            release_start: (attack + decay).max(duration - release),
        }
    }

    /// Flat gain at `peak` with a short exponential fade at the end
    pub fn flat(peak: f64, duration: f64) -> Self {
        let fade = DEFAULT_FADE_SECS.min(duration.max(0.0));
        Self {
            attack: 0.0,
            decay: 0.0,
            sustain: 1.0,
            release: fade,
            peak: sanitize(peak),
            release_start: (duration - fade).max(0.0),
        }
    }

    /// Peak gain
    pub fn peak(&self) -> f64 {
        self.peak
    }

    /// Time (seconds) at which the release stage begins
    pub fn release_start(&self) -> f64 {
        self.release_start
    }

    /// Total length of the curve in seconds
    pub fn end(&self) -> f64 {
        self.release_start + self.release
    }

    /// Stage the curve is in at time `t`
    pub fn stage_at(&self, t: f64) -> EnvelopeStage {
        if t < self.attack {
            EnvelopeStage::Attack
        } else if t < self.attack + self.decay {
            EnvelopeStage::Decay
        } else if t < self.release_start {
            EnvelopeStage::Sustain
        } else if t < self.end() {
            EnvelopeStage::Release
        } else {
            EnvelopeStage::Done
        }
    }

    /// Gain at `t` seconds after the voice started
    pub fn gain_at(&self, t: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }

        match self.stage_at(t) {
            // Linear 0 -> peak
            EnvelopeStage::Attack => self.peak * t / self.attack,

            // Linear peak -> peak * sustain
            EnvelopeStage::Decay => {
                let progress = (t - self.attack) / self.decay;
                self.peak + (self.sustain_level() - self.peak) * progress
            }

            EnvelopeStage::Sustain => self.sustain_level(),

            // Exponential approach to the floor
            EnvelopeStage::Release => {
                let from = self.level_before_release().max(GAIN_FLOOR);
                let progress = (t - self.release_start) / self.release;
                from * (GAIN_FLOOR / from).powf(progress)
            }

            EnvelopeStage::Done => 0.0,
        }
    }

    fn sustain_level(&self) -> f64 {
        self.peak * self.sustain
    }

    // The release may begin mid-attack or mid-decay when the voice is short
    fn level_before_release(&self) -> f64 {
        let t = self.release_start;
        if t < self.attack {
            self.peak * t / self.attack
        } else if t < self.attack + self.decay {
            let progress = (t - self.attack) / self.decay;
            self.peak + (self.sustain_level() - self.peak) * progress
        } else {
            self.sustain_level()
        }
    }
}

fn ms_to_secs(ms: f64) -> f64 {
    if ms.is_finite() {
        ms.max(0.0) / 1000.0
    } else {
        0.0
    }
}

fn sanitize(level: f64) -> f64 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

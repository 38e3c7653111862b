//! Sound definition schema
//!
//! Definitions are plain data. They can be written in Rust (see
//! `catalog.rs`) or loaded from YAML with the same shape.

use crate::error::{AudioError, Result};
use crate::synth::{EnvelopeSpec, FilterSpec, Frequency, Waveform, MAX_VOICE_MS};
use serde::{Deserialize, Serialize};

/// Sound category, used by the settings gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Clicks, taps and other UI feedback
    #[serde(rename = "ui_feedback", alias = "feedback")]
    Feedback,
    /// Lesson rewards and hints
    Educational,
    /// Background beds
    Ambient,
    /// Alerts
    Notification,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Feedback,
        Category::Educational,
        Category::Ambient,
        Category::Notification,
    ];

    /// Name used in settings and catalogs
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Feedback => "ui_feedback",
            Category::Educational => "educational",
            Category::Ambient => "ambient",
            Category::Notification => "notification",
        }
    }

    /// Parse a category name (the `feedback` shorthand is accepted too)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ui_feedback" | "feedback" => Some(Category::Feedback),
            "educational" => Some(Category::Educational),
            "ambient" => Some(Category::Ambient),
            "notification" => Some(Category::Notification),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable, registry-owned sound description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundDefinition {
    /// Unique id, e.g. `ui_click`
    pub id: String,

    pub category: Category,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Base volume 0.0-1.0 (default: 0.5)
    #[serde(default = "default_base_volume")]
    pub base_volume: f32,

    /// Informational only; playback length comes from the parameters
    #[serde(default)]
    pub nominal_duration_ms: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub parameters: SoundParameters,
}

fn default_base_volume() -> f32 { 0.5 }
fn default_enabled() -> bool { true }

/// The synthesis parameter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundParameters {
    pub source: SoundSource,

    /// Shared envelope for every voice the source produces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeSpec>,

    /// Sequence scheduled separately after the main source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUp>,
}

/// Exactly one signal source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SoundSource {
    Tone(ToneSpec),
    Noise(NoiseSpec),
    Sequence(SequenceSpec),
}

/// A single periodic tone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneSpec {
    #[serde(default)]
    pub waveform: Waveform,
    pub frequency: Frequency,
    pub duration_ms: f64,
}

/// A burst of white noise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSpec {
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterSpec>,
}

/// An ordered list of notes, each realized as its own tone voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSpec {
    #[serde(default)]
    pub waveform: Waveform,
    pub notes: Vec<NoteSpec>,
}

/// One note of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteSpec {
    pub frequency: f64,
    /// Start relative to the sequence start
    #[serde(default)]
    pub offset_ms: f64,
    pub duration_ms: f64,
    /// Volume relative to the sound's effective volume
    #[serde(default = "default_note_volume")]
    pub volume: f32,
}

fn default_note_volume() -> f32 { 1.0 }

impl NoteSpec {
    pub fn new(frequency: f64, offset_ms: f64, duration_ms: f64, volume: f32) -> Self {
        Self {
            frequency,
            offset_ms,
            duration_ms,
            volume,
        }
    }
}

/// Deferred sequence played after the main source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    /// Delay after the main source starts
    pub delay_ms: f64,

    pub sequence: SequenceSpec,

    /// Overrides the shared envelope for the follow-up notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeSpec>,
}

impl SoundDefinition {
    /// Base volume clamped to 0.0-1.0
    pub fn volume(&self) -> f32 {
        clamp_volume(self.base_volume)
    }

    /// Check the definition for values no strategy could render
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(AudioError::InvalidCatalog(format!("'{}': {}", self.id, msg)));

        if self.id.trim().is_empty() {
            return Err(AudioError::InvalidCatalog("sound id must not be empty".to_string()));
        }
        if !self.base_volume.is_finite() {
            return fail("base_volume must be a number".to_string());
        }

        match &self.parameters.source {
            SoundSource::Tone(tone) => {
                if !tone.frequency.is_valid() {
                    return fail("tone frequency must be positive".to_string());
                }
                if !is_duration(tone.duration_ms) {
                    return fail(format!("tone duration must be within (0, {}] ms", MAX_VOICE_MS));
                }
            }
            SoundSource::Noise(noise) => {
                if !is_duration(noise.duration_ms) {
                    return fail(format!("noise duration must be within (0, {}] ms", MAX_VOICE_MS));
                }
                if let Some(filter) = &noise.filter {
                    if !is_positive(filter.frequency) {
                        return fail("filter frequency must be positive".to_string());
                    }
                }
            }
            SoundSource::Sequence(sequence) => {
                if let Err(msg) = validate_sequence(sequence, 0.0) {
                    return fail(msg);
                }
            }
        }

        if let Some(envelope) = &self.parameters.envelope {
            if let Err(msg) = validate_envelope(envelope) {
                return fail(msg);
            }
        }

        if let Some(follow_up) = &self.parameters.follow_up {
            if !is_offset(follow_up.delay_ms) {
                return fail(format!("follow-up delay must be within [0, {}] ms", MAX_VOICE_MS));
            }
            if let Err(msg) = validate_sequence(&follow_up.sequence, follow_up.delay_ms) {
                return fail(format!("follow-up {}", msg));
            }
            if let Some(envelope) = &follow_up.envelope {
                if let Err(msg) = validate_envelope(envelope) {
                    return fail(format!("follow-up {}", msg));
                }
            }
        }

        Ok(())
    }
}

/// `start_ms` is where the sequence sits relative to the sound's start
fn validate_sequence(sequence: &SequenceSpec, start_ms: f64) -> std::result::Result<(), String> {
    if sequence.notes.is_empty() {
        return Err("sequence must contain at least one note".to_string());
    }
    for (i, note) in sequence.notes.iter().enumerate() {
        if !is_positive(note.frequency) {
            return Err(format!("note {} frequency must be positive", i));
        }
        if !is_duration(note.duration_ms) {
            return Err(format!("note {} duration must be within (0, {}] ms", i, MAX_VOICE_MS));
        }
        if !is_offset(note.offset_ms) || !is_offset(start_ms + note.offset_ms) {
            return Err(format!("note {} must start within {} ms", i, MAX_VOICE_MS));
        }
    }
    Ok(())
}

fn validate_envelope(envelope: &EnvelopeSpec) -> std::result::Result<(), String> {
    let total = envelope.attack_ms + envelope.decay_ms + envelope.release_ms;
    if !is_offset(envelope.attack_ms) || !is_offset(envelope.decay_ms) || !is_offset(envelope.release_ms) {
        return Err("envelope times must not be negative".to_string());
    }
    if total > MAX_VOICE_MS {
        return Err(format!("envelope must finish within {} ms", MAX_VOICE_MS));
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_duration(ms: f64) -> bool {
    is_positive(ms) && ms <= MAX_VOICE_MS
}

fn is_offset(ms: f64) -> bool {
    (0.0..=MAX_VOICE_MS).contains(&ms)
}

/// Clamp a volume to 0.0-1.0, mapping NaN to silence
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

//! Synthesis for procedural sounds
//!
//! Contains the oscillator, biquad filter, envelope generator, the voice
//! signal graph and the strategies that build voices from definitions.

mod envelope;
mod filter;
mod oscillator;
pub mod strategy;
mod voice;

pub use envelope::{EnvelopeCurve, EnvelopeSpec, EnvelopeStage, DEFAULT_FADE_SECS, GAIN_FLOOR};
pub use filter::{Filter, FilterKind, FilterSpec};
pub use oscillator::{Frequency, Oscillator, Waveform};
pub use voice::{secs_to_frames, Voice, VoiceKind, MAX_VOICE_MS};

//! Voice mixer
//!
//! The mixer owns the rendering clock and the arena of active voices. The
//! output callback pulls frames from it. Callers only push voices in; the
//! callback reaps them once the clock passes their stop frame.

use crate::synth::Voice;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default cap on simultaneous voices
pub const DEFAULT_MAX_VOICES: usize = 32;

/// Identifier of a voice in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

/// Master gain stage, shared between callers and the output callback
#[derive(Debug)]
pub struct MasterGain(AtomicU32);

impl MasterGain {
    pub fn new(volume: f32) -> Self {
        Self(AtomicU32::new(clamp(volume).to_bits()))
    }

    /// Set the gain, clamped to 0.0-1.0. Takes effect on the next frame
    /// for every voice.
    pub fn set(&self, volume: f32) {
        self.0.store(clamp(volume).to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl Default for MasterGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

fn clamp(volume: f32) -> f32 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

struct ActiveVoice {
    id: VoiceId,
    voice: Voice,
}

/// Sums active voices into a mono signal
pub struct Mixer {
    sample_rate: f64,
    clock: u64,
    voices: Vec<ActiveVoice>,
    next_id: u64,
    max_voices: usize,
    master: Arc<MasterGain>,
}

impl Mixer {
    /// Create a new mixer
    pub fn new(sample_rate: f64, max_voices: usize, master: Arc<MasterGain>) -> Self {
        Self {
            sample_rate,
            clock: 0,
            voices: Vec::with_capacity(max_voices),
            next_id: 0,
            max_voices,
            master,
        }
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Current position of the rendering clock, in frames
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    pub fn master(&self) -> &Arc<MasterGain> {
        &self.master
    }

    /// Restart the clock at a new sample rate, dropping every voice
    pub fn reset(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.clock = 0;
        self.voices.clear();
    }

    /// Anchor voices at the current clock and add them to the arena.
    ///
    /// Voices beyond the cap are dropped, newest first. Returns the ids of
    /// the voices that were accepted.
    pub fn schedule(&mut self, voices: Vec<Voice>) -> Vec<VoiceId> {
        let now = self.clock;
        let mut accepted = Vec::with_capacity(voices.len());

        for mut voice in voices {
            if self.voices.len() >= self.max_voices {
                debug!(limit = self.max_voices, "voice limit reached, dropping voice");
                continue;
            }
            voice.anchor(now);
            let id = VoiceId(self.next_id);
            self.next_id += 1;
            self.voices.push(ActiveVoice { id, voice });
            accepted.push(id);
        }

        accepted
    }

    /// Number of voices that are playing or waiting to start
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Look up a voice still in the arena
    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        self.voices.iter().find(|v| v.id == id).map(|v| &v.voice)
    }

    /// Voices currently in the arena, oldest first
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter().map(|v| &v.voice)
    }

    /// Silence and release every voice
    pub fn stop_all(&mut self) {
        if !self.voices.is_empty() {
            debug!(count = self.voices.len(), "stopping all voices");
        }
        self.voices.clear();
    }

    /// Generate the next frame and advance the clock
    pub fn process(&mut self) -> f64 {
        let now = self.clock;
        let mut output = 0.0;

        for active in &mut self.voices {
            if active.voice.start_frame() <= now && !active.voice.is_finished() {
                output += active.voice.process();
            }
        }

        self.clock += 1;
        output * self.master.get() as f64
    }

    /// Fill a mono buffer, then reap voices that have finished
    pub fn fill_buffer(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process().clamp(-1.0, 1.0) as f32;
        }
        self.reap();
    }

    /// Drop voices whose stop frame the clock has passed
    pub fn reap(&mut self) {
        let now = self.clock;
        self.voices.retain(|active| active.voice.stop_frame() > now);
    }

    /// Advance the clock without producing output
    pub fn advance(&mut self, frames: u64) {
        for _ in 0..frames {
            self.process();
        }
        self.reap();
    }
}

//! Offline rendering to WAV
//!
//! Pulls frames out of a mixer the way the output callback would and
//! writes them as mono 32-bit float WAV.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::Mixer;

/// Frames rendered per block when pulling from a mixer
const BLOCK_FRAMES: usize = 512;

/// Renders a mixer into a WAV file
pub struct Recorder {
    wav: WavWriter<BufWriter<File>>,
    rate: u32,
    frames: u64,
    block: Vec<f32>,
}

impl Recorder {
    /// Open `path` for writing at `sample_rate`
    pub fn new(path: &Path, sample_rate: u32) -> Result<Self> {
        let format = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let wav = WavWriter::create(path, format)
            .with_context(|| format!("cannot create {}", path.display()))?;

        Ok(Self {
            wav,
            rate: sample_rate,
            frames: 0,
            block: vec![0.0; BLOCK_FRAMES],
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.rate
    }

    /// Frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.rate as f64
    }

    /// Render exactly `frames` frames from the mixer
    pub fn record(&mut self, mixer: &mut Mixer, frames: u64) -> Result<()> {
        let mut left = frames;
        while left > 0 {
            let n = left.min(BLOCK_FRAMES as u64) as usize;
            mixer.fill_buffer(&mut self.block[..n]);
            for &sample in &self.block[..n] {
                self.wav.write_sample(sample).context("WAV write failed")?;
            }
            self.frames += n as u64;
            left -= n as u64;
        }
        Ok(())
    }

    /// Render whole blocks until the mixer has no voices left, then
    /// `tail_frames` of silence. Never writes more than `max_frames`.
    pub fn record_until_idle(&mut self, mixer: &mut Mixer, tail_frames: u64, max_frames: u64) -> Result<()> {
        let limit = self.frames + max_frames;

        while mixer.active_count() > 0 && self.frames < limit {
            let n = (limit - self.frames).min(BLOCK_FRAMES as u64);
            self.record(mixer, n)?;
        }
        let tail = tail_frames.min(limit - self.frames);
        self.record(mixer, tail)
    }

    /// Write the header and close the file. Without this the file is
    /// truncated.
    pub fn finalize(self) -> Result<Duration> {
        let length = Duration::from_secs_f64(self.duration_secs());
        self.wav.finalize().context("cannot finalize WAV file")?;
        debug!(frames = self.frames, "recording finished");
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MasterGain;
    use crate::synth::{EnvelopeCurve, Voice};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn mixer_with_dc(frames: usize, level: f64) -> Mixer {
        let mut mixer = Mixer::new(8000.0, 4, Arc::new(MasterGain::default()));
        let envelope = EnvelopeCurve::flat(level, frames as f64 / 8000.0 * 2.0);
        mixer.schedule(vec![Voice::noise(vec![1.0; frames], None, envelope, 0, 8000.0)]);
        mixer
    }

    #[test]
    fn test_record_exact_frames() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::new(&dir.path().join("out.wav"), 8000).unwrap();
        let mut mixer = mixer_with_dc(2000, 0.5);

        recorder.record(&mut mixer, 1300).unwrap();

        assert_eq!(recorder.frames(), 1300);
        assert_eq!(mixer.clock(), 1300);
        assert_eq!(recorder.sample_rate(), 8000);
    }

    #[test]
    fn test_idle_detection_then_tail() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::new(&dir.path().join("out.wav"), 8000).unwrap();
        let mut mixer = mixer_with_dc(1000, 0.5);

        recorder.record_until_idle(&mut mixer, 100, 8000).unwrap();

        assert_eq!(mixer.active_count(), 0);
        // Two blocks until the voice is reaped, then the tail
        assert_eq!(recorder.frames(), 1024 + 100);
    }

    #[test]
    fn test_idle_render_is_capped() {
        let dir = tempdir().unwrap();
        let mut recorder = Recorder::new(&dir.path().join("out.wav"), 8000).unwrap();
        let mut mixer = mixer_with_dc(10_000, 0.5);

        recorder.record_until_idle(&mut mixer, 100, 2000).unwrap();
        assert_eq!(recorder.frames(), 2000);
    }

    #[test]
    fn test_finalized_file_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut recorder = Recorder::new(&path, 8000).unwrap();
        let mut mixer = mixer_with_dc(800, 0.5);
        recorder.record(&mut mixer, 800).unwrap();
        let length = recorder.finalize().unwrap();
        assert!((length.as_secs_f64() - 0.1).abs() < 1e-6);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.spec().sample_format, SampleFormat::Float);

        let samples: Vec<f32> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 800);
        assert!((samples[0] - 0.5).abs() < 1e-6);
    }
}

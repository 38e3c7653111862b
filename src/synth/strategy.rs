//! Synthesis strategies
//!
//! Turn a definition's parameter tree into voices. Every voice is built
//! separately and reports its own error, so one bad note never takes the
//! rest of a sound down with it.

use super::voice::{secs_to_frames, MAX_VOICE_MS};
use super::{EnvelopeCurve, EnvelopeSpec, Filter, Frequency, Oscillator, Voice};
use crate::error::{AudioError, Result};
use crate::registry::{NoiseSpec, SequenceSpec, SoundParameters, SoundSource, ToneSpec};
use oorandom::Rand32;

/// Build the voices for the main source of a sound.
///
/// `level` is the effective volume (0.0-1.0). Start frames are relative to
/// the moment the mixer accepts the voices.
pub fn synthesize(
    params: &SoundParameters,
    level: f64,
    sample_rate: f64,
    rng: &mut Rand32,
) -> Vec<Result<Voice>> {
    let envelope = params.envelope.as_ref();
    match &params.source {
        SoundSource::Tone(spec) => vec![tone(spec, envelope, level, 0.0, sample_rate)],
        SoundSource::Noise(spec) => vec![noise_burst(spec, envelope, level, 0.0, sample_rate, rng)],
        SoundSource::Sequence(spec) => sequence(spec, envelope, level, 0.0, sample_rate),
    }
}

/// Build the deferred follow-up sequence, if the sound has one
pub fn follow_up(params: &SoundParameters, level: f64, sample_rate: f64) -> Option<Vec<Result<Voice>>> {
    params.follow_up.as_ref().map(|follow_up| {
        let envelope = follow_up.envelope.as_ref().or(params.envelope.as_ref());
        sequence(&follow_up.sequence, envelope, level, follow_up.delay_ms, sample_rate)
    })
}

/// Oscillator tone strategy: one periodic voice
pub fn tone(
    spec: &ToneSpec,
    envelope: Option<&EnvelopeSpec>,
    level: f64,
    start_ms: f64,
    sample_rate: f64,
) -> Result<Voice> {
    build_tone(spec.waveform, spec.frequency, spec.duration_ms, envelope, level, start_ms, sample_rate)
}

/// Noise burst strategy: uniform white noise, optionally filtered
pub fn noise_burst(
    spec: &NoiseSpec,
    envelope: Option<&EnvelopeSpec>,
    level: f64,
    start_ms: f64,
    sample_rate: f64,
    rng: &mut Rand32,
) -> Result<Voice> {
    let duration = checked_secs(spec.duration_ms, "noise duration")?;
    let frames = secs_to_frames(duration, sample_rate);
    if frames == 0 {
        return Err(AudioError::SynthesisFailure(format!(
            "noise duration {} ms is shorter than one frame",
            spec.duration_ms
        )));
    }

    let samples: Vec<f64> = (0..frames)
        .map(|_| rng.rand_float() as f64 * 2.0 - 1.0)
        .collect();

    let filter = spec
        .filter
        .as_ref()
        .map(|filter| Filter::new(filter, sample_rate))
        .transpose()?;

    Ok(Voice::noise(
        samples,
        filter,
        curve(envelope, level, duration),
        start_frame(start_ms, sample_rate)?,
        sample_rate,
    ))
}

/// Note sequence strategy: one tone voice per note, each with its own copy
/// of the shared envelope
pub fn sequence(
    spec: &SequenceSpec,
    envelope: Option<&EnvelopeSpec>,
    level: f64,
    start_ms: f64,
    sample_rate: f64,
) -> Vec<Result<Voice>> {
    spec.notes
        .iter()
        .map(|note| {
            let note_level = level * note.volume.clamp(0.0, 1.0) as f64;
            build_tone(
                spec.waveform,
                Frequency::Fixed(note.frequency),
                note.duration_ms,
                envelope,
                note_level,
                start_ms + note.offset_ms,
                sample_rate,
            )
        })
        .collect()
}

fn build_tone(
    waveform: super::Waveform,
    frequency: Frequency,
    duration_ms: f64,
    envelope: Option<&EnvelopeSpec>,
    level: f64,
    start_ms: f64,
    sample_rate: f64,
) -> Result<Voice> {
    if !frequency.is_valid() {
        return Err(AudioError::SynthesisFailure(format!(
            "invalid tone frequency {:?}",
            frequency
        )));
    }
    let duration = checked_secs(duration_ms, "tone duration")?;
    let shape = curve(envelope, level, duration);
    let end_ms = shape.end() * 1000.0;
    if !end_ms.is_finite() || end_ms > MAX_VOICE_MS {
        return Err(AudioError::SynthesisFailure(format!(
            "envelope runs for {} ms, longer than {} ms",
            end_ms, MAX_VOICE_MS
        )));
    }
    let oscillator = Oscillator::new(waveform, frequency.initial(), sample_rate);

    Ok(Voice::tone(
        oscillator,
        frequency,
        duration,
        shape,
        start_frame(start_ms, sample_rate)?,
        sample_rate,
    ))
}

fn curve(envelope: Option<&EnvelopeSpec>, level: f64, duration: f64) -> EnvelopeCurve {
    match envelope {
        Some(spec) => EnvelopeCurve::for_duration(spec, level, duration),
        None => EnvelopeCurve::flat(level, duration),
    }
}

fn checked_secs(ms: f64, what: &str) -> Result<f64> {
    if ms.is_finite() && ms > 0.0 && ms <= MAX_VOICE_MS {
        Ok(ms / 1000.0)
    } else {
        Err(AudioError::SynthesisFailure(format!(
            "{} must be within (0, {}] ms, got {} ms",
            what, MAX_VOICE_MS, ms
        )))
    }
}

fn start_frame(start_ms: f64, sample_rate: f64) -> Result<u64> {
    if !(0.0..=MAX_VOICE_MS).contains(&start_ms) {
        return Err(AudioError::SynthesisFailure(format!("invalid start offset {} ms", start_ms)));
    }
    Ok(secs_to_frames(start_ms / 1000.0, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FollowUp, NoteSpec};
    use crate::synth::{FilterKind, FilterSpec, VoiceKind, Waveform};

    const RATE: f64 = 44100.0;

    fn three_notes() -> SequenceSpec {
        SequenceSpec {
            waveform: Waveform::Sine,
            notes: vec![
                NoteSpec::new(523.25, 0.0, 80.0, 1.0),
                NoteSpec::new(659.25, 100.0, 80.0, 0.5),
                NoteSpec::new(783.99, 200.0, 80.0, 0.25),
            ],
        }
    }

    #[test]
    fn test_sequence_offsets_become_start_frames() {
        let voices: Vec<Voice> = sequence(&three_notes(), None, 1.0, 0.0, RATE)
            .into_iter()
            .map(|v| v.unwrap())
            .collect();

        let starts: Vec<u64> = voices.iter().map(|v| v.start_frame()).collect();
        assert_eq!(starts, vec![0, 4410, 8820]);
        assert!(voices.iter().all(|v| v.kind() == VoiceKind::Tone));
    }

    #[test]
    fn test_sequence_applies_note_volume() {
        let voices: Vec<Voice> = sequence(&three_notes(), None, 0.8, 0.0, RATE)
            .into_iter()
            .map(|v| v.unwrap())
            .collect();

        assert!((voices[0].envelope().peak() - 0.8).abs() < 1e-6);
        assert!((voices[1].envelope().peak() - 0.4).abs() < 1e-6);
        assert!((voices[2].envelope().peak() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_sequence_envelope_is_per_note() {
        let env = EnvelopeSpec::new(5.0, 20.0, 0.5, 40.0);
        let voices: Vec<Voice> = sequence(&three_notes(), Some(&env), 1.0, 0.0, RATE)
            .into_iter()
            .map(|v| v.unwrap())
            .collect();

        // Same local timing for every note despite different start times
        for voice in &voices[1..] {
            assert_eq!(voice.envelope().release_start(), voices[0].envelope().release_start());
            assert_eq!(voice.envelope().end(), voices[0].envelope().end());
            assert_eq!(voice.length(), voices[0].length());
        }

        // Peaks follow the note volumes
        let first = voices[0].envelope().peak();
        assert!((voices[1].envelope().peak() / first - 0.5).abs() < 1e-6);
        assert!((voices[2].envelope().peak() / first - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        let spec = ToneSpec {
            waveform: Waveform::Sine,
            frequency: Frequency::Fixed(440.0),
            duration_ms: 1e20,
        };
        assert!(matches!(tone(&spec, None, 1.0, 0.0, RATE), Err(AudioError::SynthesisFailure(_))));

        let mut rng = Rand32::new(5);
        let noise = NoiseSpec {
            duration_ms: 1e15,
            filter: None,
        };
        assert!(matches!(
            noise_burst(&noise, None, 1.0, 0.0, RATE, &mut rng),
            Err(AudioError::SynthesisFailure(_))
        ));
    }

    #[test]
    fn test_far_start_and_long_release_are_rejected() {
        let mut spec = three_notes();
        spec.notes[2].offset_ms = 1e20;
        let results = sequence(&spec, None, 1.0, 0.0, RATE);
        assert!(results[0].is_ok());
        assert!(matches!(results[2], Err(AudioError::SynthesisFailure(_))));

        let env = EnvelopeSpec::new(0.0, 0.0, 1.0, 1e12);
        let results = sequence(&three_notes(), Some(&env), 1.0, 0.0, RATE);
        assert!(results.iter().all(|r| r.is_err()));
    }

    #[test]
    fn test_bad_note_does_not_affect_others() {
        let mut spec = three_notes();
        spec.notes[1].frequency = 0.0;

        let results = sequence(&spec, None, 1.0, 0.0, RATE);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(AudioError::SynthesisFailure(_))));
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_noise_buffer_sized_to_duration() {
        let mut rng = Rand32::new(7);
        let spec = NoiseSpec {
            duration_ms: 100.0,
            filter: None,
        };
        let voice = noise_burst(&spec, None, 0.5, 0.0, RATE, &mut rng).unwrap();

        assert_eq!(voice.kind(), VoiceKind::Noise);
        assert_eq!(voice.length(), 4410);
        assert!(!voice.has_filter());
    }

    #[test]
    fn test_noise_samples_are_uniform_in_range() {
        let mut rng = Rand32::new(42);
        let spec = NoiseSpec {
            duration_ms: 200.0,
            filter: None,
        };
        let mut voice = noise_burst(&spec, None, 1.0, 0.0, RATE, &mut rng).unwrap();

        let mut sum = 0.0;
        let mut count = 0;
        while !voice.is_finished() {
            let s = voice.process();
            assert!((-1.0..=1.0).contains(&s));
            sum += s;
            count += 1;
        }
        assert!((sum / count as f64).abs() < 0.05);
    }

    #[test]
    fn test_noise_with_invalid_filter_fails() {
        let mut rng = Rand32::new(1);
        let spec = NoiseSpec {
            duration_ms: 50.0,
            filter: Some(FilterSpec {
                kind: FilterKind::Bandpass,
                frequency: 40000.0,
                q: 2.0,
            }),
        };
        assert!(noise_burst(&spec, None, 1.0, 0.0, RATE, &mut rng).is_err());
    }

    #[test]
    fn test_tone_sweep_keeps_initial_frequency() {
        let spec = ToneSpec {
            waveform: Waveform::Square,
            frequency: Frequency::Sweep { from: 440.0, to: 220.0 },
            duration_ms: 150.0,
        };
        let voice = tone(&spec, None, 0.5, 0.0, RATE).unwrap();
        assert_eq!(voice.frequency(), Some(440.0));
        assert_eq!(voice.length(), secs_to_frames(0.15, RATE));
    }

    #[test]
    fn test_follow_up_is_delayed() {
        let params = SoundParameters {
            source: SoundSource::Noise(NoiseSpec {
                duration_ms: 100.0,
                filter: None,
            }),
            envelope: None,
            follow_up: Some(FollowUp {
                delay_ms: 100.0,
                sequence: three_notes(),
                envelope: None,
            }),
        };

        let mut rng = Rand32::new(3);
        let main = synthesize(&params, 0.3, RATE, &mut rng);
        assert_eq!(main.len(), 1);

        let tail: Vec<Voice> = follow_up(&params, 0.3, RATE)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect();
        let starts: Vec<u64> = tail.iter().map(|v| v.start_frame()).collect();
        assert_eq!(starts, vec![4410, 8820, 13230]);
    }

    #[test]
    fn test_no_follow_up() {
        let params = SoundParameters {
            source: SoundSource::Sequence(three_notes()),
            envelope: None,
            follow_up: None,
        };
        assert!(follow_up(&params, 1.0, RATE).is_none());
    }
}

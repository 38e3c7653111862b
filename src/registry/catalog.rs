//! Built-in sound catalog

use super::{Category, FollowUp, NoiseSpec, NoteSpec, SequenceSpec, SoundDefinition, SoundParameters, SoundSource, ToneSpec};
use crate::synth::{EnvelopeSpec, FilterKind, FilterSpec, Frequency, Waveform};

// Equal-tempered pitches used below
const C5: f64 = 523.25;
const E5: f64 = 659.25;
const G5: f64 = 783.99;
const A5: f64 = 880.0;
const C6: f64 = 1046.5;
const E6: f64 = 1318.51;
const G6: f64 = 1567.98;

/// The standard set of UI and lesson sounds
pub fn builtin_sounds() -> Vec<SoundDefinition> {
    vec![
        ui_click(),
        ui_tap(),
        ui_clear(),
        ui_pop(),
        ui_error(),
        success_chime(),
        level_complete(),
        celebration(),
        letter_sound_hint(),
        notification_ping(),
        ambient_swell(),
    ]
}

fn define(
    id: &str,
    category: Category,
    name: &str,
    description: &str,
    base_volume: f32,
    nominal_duration_ms: u32,
    parameters: SoundParameters,
) -> SoundDefinition {
    SoundDefinition {
        id: id.to_string(),
        category,
        name: name.to_string(),
        description: description.to_string(),
        base_volume,
        nominal_duration_ms,
        enabled: true,
        parameters,
    }
}

fn params(source: SoundSource, envelope: Option<EnvelopeSpec>) -> SoundParameters {
    SoundParameters {
        source,
        envelope,
        follow_up: None,
    }
}

fn tone(waveform: Waveform, frequency: Frequency, duration_ms: f64) -> SoundSource {
    SoundSource::Tone(ToneSpec {
        waveform,
        frequency,
        duration_ms,
    })
}

fn notes(waveform: Waveform, notes: &[(f64, f64, f64, f32)]) -> SequenceSpec {
    SequenceSpec {
        waveform,
        notes: notes
            .iter()
            .map(|&(frequency, offset, duration, volume)| NoteSpec::new(frequency, offset, duration, volume))
            .collect(),
    }
}

fn ui_click() -> SoundDefinition {
    define(
        "ui_click",
        Category::Feedback,
        "Click",
        "Short high click for buttons",
        0.25,
        40,
        params(
            tone(Waveform::Sine, Frequency::Fixed(1000.0), 30.0),
            Some(EnvelopeSpec::new(1.0, 20.0, 0.0, 10.0)),
        ),
    )
}

fn ui_tap() -> SoundDefinition {
    define(
        "ui_tap",
        Category::Feedback,
        "Tap",
        "Soft tap for selecting a tile",
        0.3,
        60,
        params(
            tone(Waveform::Triangle, Frequency::Fixed(660.0), 50.0),
            Some(EnvelopeSpec::new(2.0, 30.0, 0.2, 20.0)),
        ),
    )
}

fn ui_clear() -> SoundDefinition {
    let mut parameters = params(
        SoundSource::Noise(NoiseSpec {
            duration_ms: 100.0,
            filter: Some(FilterSpec {
                kind: FilterKind::Bandpass,
                frequency: 2500.0,
                q: 3.0,
            }),
        }),
        Some(EnvelopeSpec::new(0.0, 50.0, 0.1, 100.0)),
    );
    parameters.follow_up = Some(FollowUp {
        delay_ms: 100.0,
        sequence: notes(
            Waveform::Sine,
            &[(C6, 0.0, 60.0, 0.4), (G5, 50.0, 60.0, 0.35), (C5, 100.0, 80.0, 0.3)],
        ),
        envelope: Some(EnvelopeSpec::new(2.0, 30.0, 0.3, 40.0)),
    });

    define(
        "ui_clear",
        Category::Feedback,
        "Clear",
        "Pop followed by a falling three-note tail",
        0.3,
        300,
        parameters,
    )
}

fn ui_pop() -> SoundDefinition {
    let mut parameters = params(
        SoundSource::Noise(NoiseSpec {
            duration_ms: 40.0,
            filter: Some(FilterSpec {
                kind: FilterKind::Bandpass,
                frequency: 1200.0,
                q: 8.0,
            }),
        }),
        Some(EnvelopeSpec::new(0.0, 20.0, 0.2, 30.0)),
    );
    parameters.follow_up = Some(FollowUp {
        delay_ms: 50.0,
        sequence: notes(Waveform::Sine, &[(600.0, 0.0, 60.0, 0.3)]),
        envelope: None,
    });

    define(
        "ui_pop",
        Category::Feedback,
        "Pop",
        "Bubble pop with a quiet tail",
        0.35,
        110,
        parameters,
    )
}

fn ui_error() -> SoundDefinition {
    define(
        "ui_error",
        Category::Feedback,
        "Error",
        "Low falling buzz for a wrong answer",
        0.25,
        280,
        params(
            tone(Waveform::Square, Frequency::Sweep { from: 220.0, to: 110.0 }, 200.0),
            Some(EnvelopeSpec::new(5.0, 100.0, 0.5, 80.0)),
        ),
    )
}

fn success_chime() -> SoundDefinition {
    define(
        "success_chime",
        Category::Educational,
        "Success",
        "Rising major arpeggio for a correct answer",
        0.4,
        400,
        params(
            SoundSource::Sequence(notes(
                Waveform::Sine,
                &[(C5, 0.0, 200.0, 1.0), (E5, 80.0, 200.0, 0.9), (G5, 160.0, 240.0, 0.8)],
            )),
            Some(EnvelopeSpec::new(5.0, 100.0, 0.4, 200.0)),
        ),
    )
}

fn level_complete() -> SoundDefinition {
    define(
        "level_complete",
        Category::Educational,
        "Level complete",
        "Four-note fanfare at the end of a lesson",
        0.45,
        800,
        params(
            SoundSource::Sequence(notes(
                Waveform::Triangle,
                &[
                    (C5, 0.0, 150.0, 0.9),
                    (E5, 120.0, 150.0, 0.9),
                    (G5, 240.0, 150.0, 0.9),
                    (C6, 360.0, 400.0, 1.0),
                ],
            )),
            Some(EnvelopeSpec::new(5.0, 60.0, 0.6, 150.0)),
        ),
    )
}

fn celebration() -> SoundDefinition {
    define(
        "celebration",
        Category::Educational,
        "Celebration",
        "Bright melody for finishing a unit",
        0.5,
        1200,
        params(
            SoundSource::Sequence(notes(
                Waveform::Sine,
                &[
                    (C5, 0.0, 120.0, 0.8),
                    (E5, 100.0, 120.0, 0.8),
                    (G5, 200.0, 120.0, 0.8),
                    (C6, 300.0, 200.0, 0.9),
                    (G5, 500.0, 120.0, 0.7),
                    (C6, 600.0, 120.0, 0.8),
                    (E6, 700.0, 120.0, 0.9),
                    (G6, 800.0, 400.0, 1.0),
                ],
            )),
            Some(EnvelopeSpec::new(5.0, 80.0, 0.5, 150.0)),
        ),
    )
}

fn letter_sound_hint() -> SoundDefinition {
    define(
        "letter_sound_hint",
        Category::Educational,
        "Hint",
        "Gentle upward glide when a hint is shown",
        0.3,
        250,
        params(
            tone(Waveform::Sine, Frequency::Sweep { from: 440.0, to: 660.0 }, 150.0),
            Some(EnvelopeSpec::new(10.0, 50.0, 0.6, 100.0)),
        ),
    )
}

fn notification_ping() -> SoundDefinition {
    define(
        "notification_ping",
        Category::Notification,
        "Ping",
        "Two-tone ping for new messages",
        0.35,
        300,
        params(
            SoundSource::Sequence(notes(Waveform::Sine, &[(A5, 0.0, 150.0, 1.0), (E6, 120.0, 150.0, 0.8)])),
            Some(EnvelopeSpec::new(2.0, 40.0, 0.5, 120.0)),
        ),
    )
}

fn ambient_swell() -> SoundDefinition {
    define(
        "ambient_swell",
        Category::Ambient,
        "Swell",
        "Slow filtered-noise swell between activities",
        0.15,
        1500,
        params(
            SoundSource::Noise(NoiseSpec {
                duration_ms: 1500.0,
                filter: Some(FilterSpec {
                    kind: FilterKind::Lowpass,
                    frequency: 600.0,
                    q: 0.7,
                }),
            }),
            Some(EnvelopeSpec::new(600.0, 300.0, 0.5, 600.0)),
        ),
    )
}

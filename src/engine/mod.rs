//! Audio engine for Chime
//!
//! `Engine` ties the registry, the settings gate and the output device
//! together. Callers hold one handle and fire sounds by id; rendering
//! happens on the audio callback, pulled from the shared mixer.

mod device;
mod host;
mod mixer;
mod offline;
mod player;
mod recorder;

pub use device::{DeviceState, InitStatus, OutputDevice, FALLBACK_SAMPLE_RATE};
pub use host::{AcquireError, AudioHost, GestureSignal, Sink, Subscription};
pub use mixer::{MasterGain, Mixer, VoiceId, DEFAULT_MAX_VOICES};
pub use offline::OfflineHost;
pub use player::{default_device_name, list_output_devices, CpalHost};
pub use recorder::Recorder;

use crate::config::ChimeConfig;
use crate::error::{AudioError, Result};
use crate::registry::{clamp_volume, SoundRegistry};
use crate::settings::{PlaybackSettings, SettingsGate, SettingsPatch, SettingsStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-call playback options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayOptions {
    /// Scales the definition's base volume (default: 1.0)
    pub volume: Option<f32>,
}

impl PlayOptions {
    pub fn volume(volume: f32) -> Self {
        Self { volume: Some(volume) }
    }
}

/// Handle to the sound engine
pub struct Engine {
    registry: Arc<SoundRegistry>,
    gate: SettingsGate,
    device: OutputDevice,
}

impl Engine {
    /// Create an engine from configuration. Loads the configured catalog,
    /// or the built-in sounds when none is set.
    pub fn new(config: &ChimeConfig, host: Arc<dyn AudioHost>, store: Box<dyn SettingsStore>) -> Result<Self> {
        let registry = match &config.catalog {
            Some(path) => SoundRegistry::load(path)?,
            None => SoundRegistry::builtin(),
        };
        Ok(Self::with_registry(config, Arc::new(registry), host, store))
    }

    /// Create an engine around an existing registry
    pub fn with_registry(
        config: &ChimeConfig,
        registry: Arc<SoundRegistry>,
        host: Arc<dyn AudioHost>,
        store: Box<dyn SettingsStore>,
    ) -> Self {
        Self {
            registry,
            gate: SettingsGate::new(store),
            device: OutputDevice::new(host, config.audio.max_voices),
        }
    }

    /// Acquire the output. `Pending` means the host waits for a user
    /// gesture; acquisition then completes on its own.
    pub fn initialize(&self) -> Result<InitStatus> {
        self.device.initialize()
    }

    /// Fire a sound by id. Never fails: unknown ids, disabled sounds and a
    /// missing output are all silent. Returns the number of voices started.
    pub fn play(&self, id: &str, options: PlayOptions) -> usize {
        match self.try_play(id, options) {
            Ok(voices) => voices,
            Err(AudioError::UnknownSoundId(id)) => {
                warn!(sound = %id, "unknown sound id");
                0
            }
            Err(e @ (AudioError::DeviceSuspended | AudioError::DeviceUnavailable)) => {
                debug!(sound = id, "sound dropped: {}", e);
                0
            }
            Err(e) => {
                warn!(sound = id, "sound failed: {}", e);
                0
            }
        }
    }

    /// Like `play`, but reports why nothing was scheduled
    pub fn try_play(&self, id: &str, options: PlayOptions) -> Result<usize> {
        let definition = self.registry.get(id)?;
        let settings = self.gate.get();

        if !crate::settings::should_play(&definition, &settings) {
            debug!(sound = id, "sound disabled by settings");
            return Ok(0);
        }

        let scale = clamp_volume(options.volume.unwrap_or(1.0)) * settings.master_volume;
        self.device.play(&definition, scale)
    }

    /// Set the device master gain, applied to every voice immediately
    pub fn set_master_volume(&self, volume: f32) {
        self.device.set_master_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.device.master_volume()
    }

    /// Current playback settings
    pub fn settings(&self) -> Arc<PlaybackSettings> {
        self.gate.get()
    }

    /// Change playback settings; affects sounds played afterwards
    pub fn update_settings(&self, patch: &SettingsPatch) -> Result<()> {
        self.gate.update(patch)
    }

    pub fn stop_all(&self) {
        self.device.stop_all();
    }

    pub fn suspend(&self) {
        self.device.suspend();
    }

    pub fn resume(&self) -> Result<InitStatus> {
        self.device.resume()
    }

    /// Release the output. The next `play` re-acquires it.
    pub fn destroy(&self) {
        self.device.destroy();
    }

    /// Report a user gesture to the host
    pub fn notify_gesture(&self) {
        self.device.gestures().notify();
    }

    pub fn registry(&self) -> &Arc<SoundRegistry> {
        &self.registry
    }

    pub fn device(&self) -> &OutputDevice {
        &self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Category, SoundDefinition, SoundSource};
    use crate::settings::MemoryStore;
    use crate::synth::{secs_to_frames, VoiceKind};
    use float_cmp::approx_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn full_volume() -> Box<dyn SettingsStore> {
        let settings = PlaybackSettings {
            master_volume: 1.0,
            ..Default::default()
        };
        Box::new(MemoryStore::new(Some(settings)))
    }

    fn engine_on(host: OfflineHost) -> (Engine, Arc<OfflineHost>) {
        let host = Arc::new(host);
        let engine = Engine::new(&ChimeConfig::default(), host.clone(), full_volume()).unwrap();
        (engine, host)
    }

    fn engine() -> Engine {
        engine_on(OfflineHost::new(44100)).0
    }

    fn start_frames(engine: &Engine) -> Vec<u64> {
        let mixer = engine.device().mixer();
        let mixer = mixer.lock().unwrap();
        mixer.voices().map(|v| v.start_frame()).collect()
    }

    #[test]
    fn test_ui_clear_noise_with_follow_up() {
        let engine = engine();
        assert_eq!(engine.play("ui_clear", PlayOptions::default()), 4);

        let mixer = engine.device().mixer();
        let mixer = mixer.lock().unwrap();
        let voices: Vec<_> = mixer.voices().collect();

        assert_eq!(voices[0].kind(), VoiceKind::Noise);
        assert_eq!(voices[0].length(), 4410);
        assert!(voices[0].has_filter());

        let follow_up: Vec<u64> = voices[1..].iter().map(|v| v.start_frame()).collect();
        assert_eq!(follow_up.len(), 3);
        assert_eq!(follow_up[0], 4410);
        assert!(follow_up.windows(2).all(|w| w[0] < w[1]));
        assert!(voices[1..].iter().all(|v| v.kind() == VoiceKind::Tone));
    }

    #[test]
    fn test_disabled_category_plays_nothing() {
        let engine = engine();
        engine
            .update_settings(&SettingsPatch::default().category(Category::Feedback, false))
            .unwrap();

        assert_eq!(engine.play("ui_clear", PlayOptions::default()), 0);
        assert_eq!(engine.device().active_voices(), 0);

        // Other categories are unaffected
        assert!(engine.play("success_chime", PlayOptions::default()) > 0);
    }

    #[test]
    fn test_global_switch_off_plays_nothing() {
        let engine = engine();
        engine.update_settings(&SettingsPatch::default().sounds_enabled(false)).unwrap();
        assert_eq!(engine.play("ui_click", PlayOptions::default()), 0);
    }

    #[test]
    fn test_disabled_definition_plays_nothing() {
        let mut def = SoundRegistry::builtin().get("ui_click").unwrap().as_ref().clone();
        def.enabled = false;
        let registry = Arc::new(SoundRegistry::new(vec![def]).unwrap());
        let engine = Engine::with_registry(
            &ChimeConfig::default(),
            registry,
            Arc::new(OfflineHost::new(44100)),
            full_volume(),
        );

        assert_eq!(engine.play("ui_click", PlayOptions::default()), 0);
    }

    #[test]
    fn test_unknown_id_is_silent() {
        let engine = engine();
        assert_eq!(engine.play("does_not_exist", PlayOptions::default()), 0);
        assert_eq!(
            engine.try_play("does_not_exist", PlayOptions::default()),
            Err(AudioError::UnknownSoundId("does_not_exist".to_string()))
        );
        assert_eq!(engine.device().active_voices(), 0);
    }

    #[test]
    fn test_initialize_twice_acquires_once() {
        let (engine, host) = engine_on(OfflineHost::new(44100));
        assert_eq!(engine.initialize().unwrap(), InitStatus::Ready);
        assert_eq!(engine.initialize().unwrap(), InitStatus::Ready);

        assert_eq!(engine.device().acquisitions(), 1);
        assert_eq!(host.acquisitions(), 1);
    }

    #[test]
    fn test_sequence_offsets_in_frames() {
        let yaml = r#"
- id: steps
  category: educational
  name: Steps
  parameters:
    source:
      kind: sequence
      waveform: sine
      notes:
        - { frequency: 440.0, offset_ms: 0, duration_ms: 80 }
        - { frequency: 550.0, offset_ms: 100, duration_ms: 80 }
        - { frequency: 660.0, offset_ms: 200, duration_ms: 80 }
"#;
        let registry = Arc::new(SoundRegistry::from_yaml_str(yaml).unwrap());
        let engine = Engine::with_registry(
            &ChimeConfig::default(),
            registry,
            Arc::new(OfflineHost::new(44100)),
            full_volume(),
        );

        assert_eq!(engine.play("steps", PlayOptions::default()), 3);
        let expected: Vec<u64> = [0.0, 0.1, 0.2].iter().map(|&s| secs_to_frames(s, 44100.0)).collect();
        assert_eq!(start_frames(&engine), expected);
    }

    #[test]
    fn test_master_volume_is_clamped() {
        let engine = engine();
        for (input, expected) in [(0.4f32, 0.4f32), (3.0, 1.0), (-1.0, 0.0)] {
            engine.set_master_volume(input);
            assert!(approx_eq!(f32, engine.master_volume(), expected));
        }
    }

    #[test]
    fn test_settings_volume_scales_new_voices() {
        let engine = engine();
        engine.update_settings(&SettingsPatch::default().master_volume(0.5)).unwrap();
        engine.play("ui_tap", PlayOptions::volume(0.5));

        let base = engine.registry().get("ui_tap").unwrap().volume() as f64;
        let mixer = engine.device().mixer();
        let mixer = mixer.lock().unwrap();
        let peak = mixer.voices().next().unwrap().envelope().peak();
        assert!(approx_eq!(f64, peak, base * 0.25, epsilon = 1e-6));
    }

    #[test]
    fn test_gesture_gated_host() {
        let (engine, host) = engine_on(OfflineHost::new(44100).gesture_gated());

        assert_eq!(engine.initialize().unwrap(), InitStatus::Pending);
        assert_eq!(engine.play("ui_click", PlayOptions::default()), 0);

        engine.notify_gesture();
        assert_eq!(engine.device().state(), DeviceState::Ready);
        assert_eq!(host.acquisitions(), 1);
        assert_eq!(engine.play("ui_click", PlayOptions::default()), 1);
    }

    #[test]
    fn test_no_audio_host() {
        let (engine, _) = engine_on(OfflineHost::new(44100).without_output());

        assert_eq!(engine.initialize(), Err(AudioError::DeviceUnavailable));
        assert_eq!(engine.play("ui_click", PlayOptions::default()), 0);
        assert_eq!(engine.device().state(), DeviceState::Unavailable);
    }

    #[test]
    fn test_destroy_then_play_reacquires() {
        let (engine, host) = engine_on(OfflineHost::new(44100));
        engine.play("ui_click", PlayOptions::default());
        engine.destroy();

        assert_eq!(engine.device().state(), DeviceState::Closed);
        assert_eq!(engine.play("ui_click", PlayOptions::default()), 1);
        assert_eq!(host.acquisitions(), 2);
    }

    #[test]
    fn test_voices_reaped_by_rendering_clock() {
        let engine = engine();
        engine.play("ui_click", PlayOptions::default());

        let mixer = engine.device().mixer();
        let mut mixer = mixer.lock().unwrap();
        let stop = mixer.voices().next().unwrap().stop_frame();
        mixer.advance(stop + 1);
        assert_eq!(mixer.active_count(), 0);
    }

    #[test]
    fn test_failed_burst_keeps_follow_up() {
        let mut def: SoundDefinition = SoundRegistry::builtin().get("ui_clear").unwrap().as_ref().clone();
        if let SoundSource::Noise(noise) = &mut def.parameters.source {
            if let Some(filter) = noise.filter.as_mut() {
                // Above Nyquist, so the filter cannot be built
                filter.frequency = 30_000.0;
            }
        }
        let engine = Engine::with_registry(
            &ChimeConfig::default(),
            Arc::new(SoundRegistry::new(vec![def]).unwrap()),
            Arc::new(OfflineHost::new(44100)),
            full_volume(),
        );

        assert_eq!(engine.play("ui_clear", PlayOptions::default()), 3);
        assert_eq!(start_frames(&engine)[0], 4410);
    }

    #[test]
    fn test_concurrent_plays_share_mixer() {
        let (engine, host) = engine_on(OfflineHost::new(44100));
        let mixer = engine.device().mixer();
        let rendering = AtomicBool::new(true);

        let engine = &engine;
        let mixer = &mixer;
        let rendering = &rendering;

        std::thread::scope(|s| {
            let players: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        (0..25)
                            .map(|_| engine.try_play("celebration", PlayOptions::default()))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            let renderer = s.spawn(move || {
                let mut buffer = vec![0.0f32; 256];
                let mut blocks = 0;
                while rendering.load(Ordering::SeqCst) || blocks == 0 {
                    mixer.lock().unwrap().fill_buffer(&mut buffer);
                    assert!(buffer.iter().all(|x| x.is_finite()));
                    blocks += 1;
                }
                blocks
            });

            for player in players {
                for result in player.join().unwrap() {
                    assert!(result.unwrap() <= 8);
                }
            }
            rendering.store(false, Ordering::SeqCst);
            assert!(renderer.join().unwrap() > 0);
        });

        assert!(engine.device().active_voices() <= ChimeConfig::default().audio.max_voices);
        assert_eq!(host.acquisitions(), 1);
    }
}

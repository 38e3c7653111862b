//! Output device
//!
//! The single hardware-facing component. It owns the master gain stage and
//! the mixer, acquires the sink lazily, waits for a user gesture when the
//! host demands one, and degrades to a silent no-op when the host has no
//! audio at all.

use super::host::{AcquireError, AudioHost, GestureSignal, Sink, Subscription};
use super::{MasterGain, Mixer};
use crate::error::{AudioError, Result};
use crate::registry::{clamp_volume, SoundDefinition};
use crate::synth::{strategy, Voice};
use oorandom::Rand32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

/// Sample rate assumed until a sink reports its own
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Lifecycle of the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Uninitialized,
    Initializing,
    Ready,
    /// Paused, or waiting for a gesture before the sink can be acquired
    Suspended,
    /// Sink released by `destroy`; the next play re-acquires it
    Closed,
    /// The host has no audio output; every play is a no-op
    Unavailable,
}

/// Result of a successful `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Ready,
    /// Waiting for a user gesture; acquisition resumes on its own
    Pending,
}

struct Core {
    state: DeviceState,
    sink: Option<Box<dyn Sink>>,
    acquisitions: usize,
    gesture_subscription: Option<u64>,
}

struct Shared {
    host: Arc<dyn AudioHost>,
    mixer: Arc<Mutex<Mixer>>,
    master: Arc<MasterGain>,
    core: Mutex<Core>,
    seed: AtomicU64,
}

/// Handle to the hardware sink and master gain stage
pub struct OutputDevice {
    shared: Arc<Shared>,
}

impl OutputDevice {
    /// Create an uninitialized device. Nothing is acquired until
    /// `initialize` or the first `play`.
    pub fn new(host: Arc<dyn AudioHost>, max_voices: usize) -> Self {
        let master = Arc::new(MasterGain::default());
        let mixer = Mixer::new(FALLBACK_SAMPLE_RATE as f64, max_voices, Arc::clone(&master));

        Self {
            shared: Arc::new(Shared {
                host,
                mixer: Arc::new(Mutex::new(mixer)),
                master,
                core: Mutex::new(Core {
                    state: DeviceState::Uninitialized,
                    sink: None,
                    acquisitions: 0,
                    gesture_subscription: None,
                }),
                seed: AtomicU64::new(initial_seed()),
            }),
        }
    }

    /// Acquire the sink. Idempotent: a ready device is left alone.
    pub fn initialize(&self) -> Result<InitStatus> {
        let mut core = self.shared.lock_core();
        let state = core.state;
        match state {
            DeviceState::Ready => Ok(InitStatus::Ready),
            DeviceState::Unavailable => Err(AudioError::DeviceUnavailable),
            DeviceState::Suspended if core.sink.is_some() => {
                Shared::resume_sink(&mut core);
                Ok(InitStatus::Ready)
            }
            DeviceState::Suspended | DeviceState::Initializing => Ok(InitStatus::Pending),
            DeviceState::Uninitialized | DeviceState::Closed => Shared::acquire(&self.shared, &mut core),
        }
    }

    /// Schedule a sound. Returns the number of voices accepted by the
    /// mixer. Never blocks on the rendering side.
    pub fn play(&self, definition: &SoundDefinition, volume_scale: f32) -> Result<usize> {
        self.ensure_ready()?;

        let effective = clamp_volume(definition.volume() * clamp_volume(volume_scale)) as f64;
        let sample_rate = self.sample_rate() as f64;
        let params = &definition.parameters;

        let mut rng = Rand32::new(self.shared.seed.fetch_add(1, Ordering::Relaxed));
        let mut voices = collect_voices(&definition.id, strategy::synthesize(params, effective, sample_rate, &mut rng));

        // The follow-up is its own synthesis call; a failed burst keeps it
        if let Some(results) = strategy::follow_up(params, effective, sample_rate) {
            voices.extend(collect_voices(&definition.id, results));
        }

        // One lock so both parts share the same anchor frame
        let scheduled = self.schedule(voices);

        debug!(sound = %definition.id, voices = scheduled, volume = effective, "sound scheduled");
        Ok(scheduled)
    }

    /// Set the master gain, clamped to 0.0-1.0
    pub fn set_master_volume(&self, volume: f32) {
        self.shared.master.set(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.shared.master.get()
    }

    /// Silence and release every active voice
    pub fn stop_all(&self) {
        self.shared.lock_mixer().stop_all();
    }

    /// Pause the hardware stream (Ready -> Suspended)
    pub fn suspend(&self) {
        let mut core = self.shared.lock_core();
        if core.state == DeviceState::Ready {
            if let Some(sink) = core.sink.as_mut() {
                sink.pause();
            }
            core.state = DeviceState::Suspended;
            debug!("output device suspended");
        }
    }

    /// Resume after `suspend`, or retry a gesture-gated acquisition
    pub fn resume(&self) -> Result<InitStatus> {
        self.initialize()
    }

    /// Release the sink. A later `play` re-acquires it.
    pub fn destroy(&self) {
        let mut core = self.shared.lock_core();
        if core.state == DeviceState::Unavailable {
            return;
        }
        if let Some(id) = core.gesture_subscription.take() {
            self.shared.host.gestures().unsubscribe(id);
        }
        core.sink = None;
        core.state = DeviceState::Closed;
        drop(core);

        self.shared.lock_mixer().stop_all();
        info!("output device closed");
    }

    pub fn state(&self) -> DeviceState {
        self.shared.lock_core().state
    }

    /// Sample rate of the current sink
    pub fn sample_rate(&self) -> u32 {
        self.shared.lock_mixer().sample_rate() as u32
    }

    /// Voices playing or waiting to start
    pub fn active_voices(&self) -> usize {
        self.shared.lock_mixer().active_count()
    }

    /// Number of sinks acquired over the device's lifetime
    pub fn acquisitions(&self) -> usize {
        self.shared.lock_core().acquisitions
    }

    /// The mixer the sink renders from
    pub fn mixer(&self) -> Arc<Mutex<Mixer>> {
        Arc::clone(&self.shared.mixer)
    }

    /// Gesture signal of the underlying host
    pub fn gestures(&self) -> Arc<GestureSignal> {
        self.shared.host.gestures()
    }

    fn ensure_ready(&self) -> Result<()> {
        let mut core = self.shared.lock_core();
        let state = core.state;
        match state {
            DeviceState::Ready => Ok(()),
            DeviceState::Uninitialized | DeviceState::Closed => {
                match Shared::acquire(&self.shared, &mut core)? {
                    InitStatus::Ready => Ok(()),
                    InitStatus::Pending => Err(AudioError::DeviceSuspended),
                }
            }
            DeviceState::Suspended | DeviceState::Initializing => Err(AudioError::DeviceSuspended),
            DeviceState::Unavailable => Err(AudioError::DeviceUnavailable),
        }
    }

    fn schedule(&self, voices: Vec<Voice>) -> usize {
        if voices.is_empty() {
            return 0;
        }
        self.shared.lock_mixer().schedule(voices).len()
    }
}

impl Shared {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_mixer(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(shared: &Arc<Shared>, core: &mut Core) -> Result<InitStatus> {
        core.state = DeviceState::Initializing;

        match shared.host.acquire(Arc::clone(&shared.mixer)) {
            Ok(sink) => {
                let sample_rate = sink.sample_rate();
                shared.lock_mixer().reset(sample_rate as f64);
                core.sink = Some(sink);
                core.acquisitions += 1;
                core.state = DeviceState::Ready;
                info!(sample_rate, "output device ready");
                Ok(InitStatus::Ready)
            }
            Err(AcquireError::GestureRequired) => {
                core.state = DeviceState::Suspended;
                if core.gesture_subscription.is_none() {
                    core.gesture_subscription = Some(Shared::subscribe_gesture(shared));
                }
                debug!("output device waiting for a user gesture");
                Ok(InitStatus::Pending)
            }
            Err(AcquireError::NoOutput) => {
                core.state = DeviceState::Unavailable;
                error!("no audio output available, sounds are disabled");
                Err(AudioError::DeviceUnavailable)
            }
            Err(AcquireError::Backend(msg)) => {
                core.state = DeviceState::Uninitialized;
                warn!("failed to open audio output: {}", msg);
                Err(AudioError::Backend(msg))
            }
        }
    }

    fn subscribe_gesture(shared: &Arc<Shared>) -> u64 {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        shared.host.gestures().subscribe(move || {
            let Some(shared) = weak.upgrade() else {
                return Subscription::Cancel;
            };
            let mut core = shared.lock_core();

            // Someone else already acquired or closed the device
            if core.state != DeviceState::Suspended || core.sink.is_some() {
                core.gesture_subscription = None;
                return Subscription::Cancel;
            }

            match Shared::acquire(&shared, &mut core) {
                Ok(InitStatus::Ready) => {
                    core.gesture_subscription = None;
                    Subscription::Cancel
                }
                Ok(InitStatus::Pending) => Subscription::Keep,
                Err(_) => {
                    core.gesture_subscription = None;
                    Subscription::Cancel
                }
            }
        })
    }

    fn resume_sink(core: &mut Core) {
        if let Some(sink) = core.sink.as_mut() {
            sink.resume();
        }
        core.state = DeviceState::Ready;
        debug!("output device resumed");
    }
}

// Failures are logged and dropped one voice at a time
fn collect_voices(sound: &str, results: Vec<Result<Voice>>) -> Vec<Voice> {
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(voice) => Some(voice),
            Err(e) => {
                warn!(sound, "voice dropped: {}", e);
                None
            }
        })
        .collect()
}

fn initial_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED)
}

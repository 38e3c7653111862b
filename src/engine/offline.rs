//! Offline audio host
//!
//! A host with no hardware behind it. Nothing renders on its own: whoever
//! owns the mixer pulls frames by hand. Used to render sounds to WAV files
//! and to exercise the device lifecycle in tests, including hosts without
//! audio and hosts that wait for a user gesture.

use super::host::{AcquireError, AudioHost, GestureSignal, Sink};
use super::Mixer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Audio host that renders nowhere until asked
#[derive(Debug)]
pub struct OfflineHost {
    sample_rate: u32,
    has_output: bool,
    gesture_gated: bool,
    gestures: Arc<GestureSignal>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl OfflineHost {
    /// Host with an output at the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            has_output: true,
            gesture_gated: false,
            gestures: Arc::new(GestureSignal::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Host without any audio capability
    pub fn without_output(mut self) -> Self {
        self.has_output = false;
        self
    }

    /// Host that refuses to open a sink until a gesture has been reported
    pub fn gesture_gated(mut self) -> Self {
        self.gesture_gated = true;
        self
    }

    /// Total sinks ever opened
    pub fn acquisitions(&self) -> usize {
        self.counters.acquired.load(Ordering::SeqCst)
    }

    /// Sinks currently open
    pub fn live_sinks(&self) -> usize {
        self.acquisitions() - self.counters.released.load(Ordering::SeqCst)
    }
}

impl AudioHost for OfflineHost {
    fn acquire(&self, _mixer: Arc<Mutex<Mixer>>) -> Result<Box<dyn Sink>, AcquireError> {
        if !self.has_output {
            return Err(AcquireError::NoOutput);
        }
        if self.gesture_gated && !self.gestures.has_fired() {
            return Err(AcquireError::GestureRequired);
        }

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(OfflineSink {
            sample_rate: self.sample_rate,
            paused: false,
            counters: Arc::clone(&self.counters),
        }))
    }

    fn gestures(&self) -> Arc<GestureSignal> {
        Arc::clone(&self.gestures)
    }
}

struct OfflineSink {
    sample_rate: u32,
    paused: bool,
    counters: Arc<Counters>,
}

impl Sink for OfflineSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }
}

impl Drop for OfflineSink {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

//! Host audio capability
//!
//! The output device never talks to an audio API directly. It asks an
//! `AudioHost` for a `Sink`, and the sink keeps the hardware stream alive
//! until it is dropped.

use super::Mixer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Why a sink could not be acquired
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireError {
    /// The host has no audio output at all
    NoOutput,
    /// The host only grants audio after a user gesture
    GestureRequired,
    /// The backend failed while opening the stream
    Backend(String),
}

/// A live hardware output. Dropping it releases the hardware.
pub trait Sink: Send {
    /// Sample rate the stream runs at
    fn sample_rate(&self) -> u32;

    /// Pause rendering
    fn pause(&mut self);

    /// Resume rendering after `pause`
    fn resume(&mut self);
}

/// A provider of audio output
pub trait AudioHost: Send + Sync {
    /// Open an output stream that renders from `mixer`
    fn acquire(&self, mixer: Arc<Mutex<Mixer>>) -> Result<Box<dyn Sink>, AcquireError>;

    /// Signal fired when the user interacts with the host
    fn gestures(&self) -> Arc<GestureSignal>;
}

/// Return value of a gesture subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    Keep,
    Cancel,
}

type Subscriber = Box<dyn FnMut() -> Subscription + Send>;

/// Broadcasts "the user interacted with the host" to subscribers.
///
/// Subscribers run on the thread that calls `notify` and decide themselves
/// whether to stay subscribed.
#[derive(Default)]
pub struct GestureSignal {
    subscribers: Mutex<Vec<(u64, Subscriber)>>,
    next_id: AtomicU64,
    fired: AtomicBool,
}

impl GestureSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber, returning its id
    pub fn subscribe(&self, subscriber: impl FnMut() -> Subscription + Send + 'static) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push((id, Box::new(subscriber)));
        id
    }

    /// Remove a subscriber
    pub fn unsubscribe(&self, id: u64) {
        self.lock().retain(|(sid, _)| *sid != id);
    }

    /// Report a gesture and run every subscriber
    pub fn notify(&self) {
        self.fired.store(true, Ordering::SeqCst);

        // Run subscribers outside the lock so they may subscribe again
        let mut current = std::mem::take(&mut *self.lock());
        current.retain_mut(|(_, subscriber)| subscriber() == Subscription::Keep);

        let mut subscribers = self.lock();
        current.append(&mut subscribers);
        *subscribers = current;
    }

    /// Whether a gesture has ever been reported
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Subscriber)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for GestureSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GestureSignal")
            .field("subscribers", &self.subscriber_count())
            .field("fired", &self.has_fired())
            .finish()
    }
}

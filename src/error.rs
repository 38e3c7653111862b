//! Error taxonomy for the playback engine
//!
//! Audio is an enhancement layer: almost every variant here ends up as a
//! log line and silence. Only `DeviceUnavailable` (from `initialize()`) and
//! `Persist` (from settings updates) reach callers.

use thiserror::Error;

/// Errors raised inside the engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AudioError {
    /// The host has no audio output capability at all
    #[error("no audio output device is available on this host")]
    DeviceUnavailable,

    /// Hardware access is waiting on a user gesture
    #[error("audio output is suspended until a user gesture is received")]
    DeviceSuspended,

    /// The requested sound is not in the registry
    #[error("unknown sound id '{0}'")]
    UnknownSoundId(String),

    /// A single voice could not be built
    #[error("synthesis failed: {0}")]
    SynthesisFailure(String),

    /// The settings store rejected a write
    #[error("failed to persist settings: {0}")]
    Persist(String),

    /// A sound catalog failed validation or parsing
    #[error("invalid sound catalog: {0}")]
    InvalidCatalog(String),

    /// The audio backend failed while opening a stream
    #[error("audio backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

//! Chime - Procedural UI sound effects
//!
//! Every sound is synthesized when it is played: oscillators, filtered noise
//! and short note sequences shaped by ADSR envelopes. Nothing is loaded from
//! audio files.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod settings;
pub mod synth;

pub use config::ChimeConfig;
pub use engine::{Engine, PlayOptions};
pub use error::{AudioError, Result};

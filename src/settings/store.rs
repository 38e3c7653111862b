//! Settings persistence
//!
//! The engine never decides where settings live. It talks to a
//! `SettingsStore`, and the embedding application picks the backend.

use super::PlaybackSettings;
use crate::error::{AudioError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// External persistence for playback settings
pub trait SettingsStore: Send + Sync {
    /// Load the stored record; `None` when nothing has been saved yet
    fn load(&self) -> Result<Option<PlaybackSettings>>;

    /// Persist a complete record
    fn save(&self, settings: &PlaybackSettings) -> Result<()>;
}

/// Keeps settings in memory only
#[derive(Debug, Default)]
pub struct MemoryStore {
    saved: Mutex<Option<PlaybackSettings>>,
}

impl MemoryStore {
    pub fn new(initial: Option<PlaybackSettings>) -> Self {
        Self {
            saved: Mutex::new(initial),
        }
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<PlaybackSettings>> {
        Ok(self.saved.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, settings: &PlaybackSettings) -> Result<()> {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}

/// Stores settings as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<PlaybackSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| persist_error(&self.path, e))?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| persist_error(&self.path, e))
    }

    fn save(&self, settings: &PlaybackSettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persist_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(settings).map_err(|e| persist_error(&self.path, e))?;
        std::fs::write(&self.path, json).map_err(|e| persist_error(&self.path, e))
    }
}

fn persist_error(path: &Path, err: impl std::fmt::Display) -> AudioError {
    AudioError::Persist(format!("{}: {}", path.display(), err))
}

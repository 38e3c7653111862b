//! Settings gate
//!
//! Decides whether a sound may play and owns the playback settings record.
//! The record is read-mostly: readers get an `Arc` snapshot, writers build
//! a new record and swap it in whole.

mod store;

pub use store::{JsonFileStore, MemoryStore, SettingsStore};

use crate::error::Result;
use crate::registry::{clamp_volume, Category, SoundDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, warn};

/// User-facing playback settings, persisted by an external store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    /// Master volume 0.0-1.0 (default: 0.7)
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,

    /// Global on/off switch
    #[serde(default = "default_enabled")]
    pub sounds_enabled: bool,

    /// Per-category switches; missing categories are enabled
    #[serde(default)]
    pub categories: BTreeMap<Category, bool>,
}

fn default_master_volume() -> f32 { 0.7 }
fn default_enabled() -> bool { true }

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            master_volume: default_master_volume(),
            sounds_enabled: true,
            categories: BTreeMap::new(),
        }
    }
}

impl PlaybackSettings {
    pub fn category_enabled(&self, category: Category) -> bool {
        self.categories.get(&category).copied().unwrap_or(true)
    }

    /// Copy with every value brought back into range
    fn normalized(mut self) -> Self {
        self.master_volume = clamp_volume(self.master_volume);
        self
    }
}

/// A partial update; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default)]
    pub master_volume: Option<f32>,

    #[serde(default)]
    pub sounds_enabled: Option<bool>,

    /// Categories to set; others are left alone
    #[serde(default)]
    pub categories: BTreeMap<Category, bool>,
}

impl SettingsPatch {
    pub fn master_volume(mut self, volume: f32) -> Self {
        self.master_volume = Some(volume);
        self
    }

    pub fn sounds_enabled(mut self, enabled: bool) -> Self {
        self.sounds_enabled = Some(enabled);
        self
    }

    pub fn category(mut self, category: Category, enabled: bool) -> Self {
        self.categories.insert(category, enabled);
        self
    }

    /// Merge into a copy of `current`
    pub fn apply(&self, current: &PlaybackSettings) -> PlaybackSettings {
        let mut next = current.clone();
        if let Some(volume) = self.master_volume {
            next.master_volume = volume;
        }
        if let Some(enabled) = self.sounds_enabled {
            next.sounds_enabled = enabled;
        }
        for (&category, &enabled) in &self.categories {
            next.categories.insert(category, enabled);
        }
        next.normalized()
    }
}

/// Whether a definition may play under the given settings
pub fn should_play(definition: &SoundDefinition, settings: &PlaybackSettings) -> bool {
    settings.sounds_enabled && settings.category_enabled(definition.category) && definition.enabled
}

/// Holds the current settings and writes changes through a store
pub struct SettingsGate {
    current: RwLock<Arc<PlaybackSettings>>,
    store: Box<dyn SettingsStore>,
    // Serializes writers so concurrent patches don't drop each other
    write: Mutex<()>,
}

impl SettingsGate {
    /// Load settings from the store, falling back to defaults when the
    /// store is empty or unreadable
    pub fn new(store: Box<dyn SettingsStore>) -> Self {
        let settings = match store.load() {
            Ok(Some(settings)) => settings.normalized(),
            Ok(None) => PlaybackSettings::default(),
            Err(e) => {
                warn!("failed to load playback settings, using defaults: {}", e);
                PlaybackSettings::default()
            }
        };

        Self {
            current: RwLock::new(Arc::new(settings)),
            store,
            write: Mutex::new(()),
        }
    }

    /// Gate backed by an in-memory store
    pub fn in_memory(settings: PlaybackSettings) -> Self {
        Self::new(Box::new(MemoryStore::new(Some(settings))))
    }

    /// Current settings snapshot
    pub fn get(&self) -> Arc<PlaybackSettings> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Apply a patch. The new record is persisted first and only swapped in
    /// once the store accepted it.
    pub fn update(&self, patch: &SettingsPatch) -> Result<()> {
        let _writer = self.write.lock().unwrap_or_else(PoisonError::into_inner);

        let next = patch.apply(&self.get());
        self.store.save(&next)?;
        debug!(?next, "playback settings updated");

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(())
    }

    /// Shorthand for `should_play` against the current snapshot
    pub fn allows(&self, definition: &SoundDefinition) -> bool {
        should_play(definition, &self.get())
    }
}

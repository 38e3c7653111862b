//! Sound registry
//!
//! Read-only catalog of sound definitions. Loading a new catalog replaces
//! the whole table in one swap, so readers see either the old catalog or
//! the new one and never a half-populated mix.

mod catalog;
mod definition;

pub use catalog::builtin_sounds;
pub use definition::*;

use crate::error::{AudioError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

type Table = HashMap<String, Arc<SoundDefinition>>;

/// Catalog of sound definitions keyed by id
#[derive(Debug)]
pub struct SoundRegistry {
    table: RwLock<Arc<Table>>,
}

impl SoundRegistry {
    /// Build a registry from definitions, validating each one
    pub fn new(definitions: Vec<SoundDefinition>) -> Result<Self> {
        Ok(Self {
            table: RwLock::new(Arc::new(build_table(definitions)?)),
        })
    }

    /// Registry holding the built-in catalog
    pub fn builtin() -> Self {
        let table = builtin_sounds()
            .into_iter()
            .map(|def| (def.id.clone(), Arc::new(def)))
            .collect();
        Self {
            table: RwLock::new(Arc::new(table)),
        }
    }

    /// Parse a YAML list of definitions
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::new(parse_yaml(yaml)?)
    }

    /// Load a YAML catalog from disk
    pub fn load(path: &Path) -> Result<Self> {
        Self::new(read_catalog(path)?)
    }

    /// Look up a definition
    pub fn get(&self, id: &str) -> Result<Arc<SoundDefinition>> {
        self.snapshot()
            .get(id)
            .cloned()
            .ok_or_else(|| AudioError::UnknownSoundId(id.to_string()))
    }

    /// Whether the id is present
    pub fn contains(&self, id: &str) -> bool {
        self.snapshot().contains_key(id)
    }

    /// Every definition in a category, sorted by id
    pub fn list_by_category(&self, category: Category) -> Vec<Arc<SoundDefinition>> {
        self.collect(|def| def.category == category)
    }

    /// Every enabled definition, sorted by id
    pub fn list_enabled(&self) -> Vec<Arc<SoundDefinition>> {
        self.collect(|def| def.enabled)
    }

    /// Every definition, sorted by id
    pub fn list_all(&self) -> Vec<Arc<SoundDefinition>> {
        self.collect(|_| true)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Replace the entire catalog. On validation failure the current
    /// catalog stays untouched.
    pub fn replace_all(&self, definitions: Vec<SoundDefinition>) -> Result<()> {
        let table = Arc::new(build_table(definitions)?);
        let count = table.len();
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
        info!(sounds = count, "sound catalog replaced");
        Ok(())
    }

    /// Reload the catalog from a YAML file
    pub fn reload(&self, path: &Path) -> Result<()> {
        self.replace_all(read_catalog(path)?)
    }

    fn snapshot(&self) -> Arc<Table> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn collect(&self, keep: impl Fn(&SoundDefinition) -> bool) -> Vec<Arc<SoundDefinition>> {
        let mut defs: Vec<_> = self
            .snapshot()
            .values()
            .filter(|def| keep(def))
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }
}

impl Default for SoundRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn build_table(definitions: Vec<SoundDefinition>) -> Result<Table> {
    let mut table = HashMap::with_capacity(definitions.len());
    for def in definitions {
        def.validate()?;
        if table.contains_key(&def.id) {
            return Err(AudioError::InvalidCatalog(format!("duplicate sound id '{}'", def.id)));
        }
        table.insert(def.id.clone(), Arc::new(def));
    }
    Ok(table)
}

fn parse_yaml(yaml: &str) -> Result<Vec<SoundDefinition>> {
    serde_yaml::from_str(yaml).map_err(|e| AudioError::InvalidCatalog(e.to_string()))
}

fn read_catalog(path: &Path) -> Result<Vec<SoundDefinition>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AudioError::InvalidCatalog(format!("{}: {}", path.display(), e)))?;
    parse_yaml(&contents)
}

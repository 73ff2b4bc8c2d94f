//! In-memory profile store.

use super::settings::{ProfileStore, SettingsError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A [`ProfileStore`] backed by a shared map.
///
/// Clones share the same map, so a clone kept aside observes every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfile {
    values: Arc<Mutex<HashMap<(String, String), String>>>,
}

impl MemoryProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    pub fn set(&self, section: &str, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((section.to_string(), key.to_string()), value.to_string());
    }
}

impl ProfileStore for MemoryProfile {
    fn read(&self, section: &str, key: &str) -> Option<String> {
        self.get(section, key)
    }

    fn write(&mut self, section: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set(section, key, value);
        Ok(())
    }
}

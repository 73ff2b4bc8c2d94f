//! User settings.
//!
//! Settings live in memory as plain fields and are persisted through a
//! section/key [`ProfileStore`] after every change.

use crate::display::{DisplayMode, RefreshCeiling};
use crate::hotkey::{HotkeyBindings, HotkeyId, Key, Modifiers};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

const AUDIO_SECTION: &str = "Audio";
const DISPLAY_SECTION: &str = "Display";
const SHORTCUTS_SECTION: &str = "Shortcuts";

/// Settings error types.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to write setting {section}/{key}")]
    WriteFailed { section: String, key: String },

    #[error("Settings file path unavailable: {0}")]
    PathUnavailable(#[source] std::io::Error),
}

/// A section/key string store (an INI file in production).
pub trait ProfileStore: Send {
    /// Read a value; `None` if the key is absent.
    fn read(&self, section: &str, key: &str) -> Option<String>;

    fn write(&mut self, section: &str, key: &str, value: &str) -> Result<(), SettingsError>;
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Audio device friendly name for the internal display
    pub primary_device: String,

    /// Audio device friendly name for the external display
    pub secondary_device: String,

    /// Refresh-rate ceiling for the internal display (0 = unlimited)
    pub primary_max_hz: u32,

    /// Refresh-rate ceiling for the external display (0 = unlimited)
    pub external_max_hz: u32,

    pub hotkeys: HotkeyBindings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_device: String::new(),
            secondary_device: String::new(),
            primary_max_hz: 0,
            external_max_hz: 119,
            hotkeys: HotkeyBindings::default(),
        }
    }
}

impl Settings {
    /// Load settings, keeping defaults for absent or unparseable values.
    pub fn load(store: &dyn ProfileStore) -> Self {
        let mut settings = Settings::default();

        if let Some(name) = store.read(AUDIO_SECTION, "Primary") {
            settings.primary_device = name;
        }
        if let Some(name) = store.read(AUDIO_SECTION, "Secondary") {
            settings.secondary_device = name;
        }

        read_parsed(store, DISPLAY_SECTION, "PrimaryMaxHz", &mut settings.primary_max_hz);
        read_parsed(store, DISPLAY_SECTION, "ExternalMaxHz", &mut settings.external_max_hz);

        for id in HotkeyId::ALL {
            let binding = settings.hotkeys.get_mut(id);
            let name = id.settings_name();
            read_parsed::<Key>(store, SHORTCUTS_SECTION, &format!("{name}Key"), &mut binding.key);
            read_parsed::<Modifiers>(
                store,
                SHORTCUTS_SECTION,
                &format!("{name}Modifiers"),
                &mut binding.modifiers,
            );
        }

        settings
    }

    /// Write every setting to the store.
    pub fn save(&self, store: &mut dyn ProfileStore) -> Result<(), SettingsError> {
        store.write(AUDIO_SECTION, "Primary", &self.primary_device)?;
        store.write(AUDIO_SECTION, "Secondary", &self.secondary_device)?;
        store.write(DISPLAY_SECTION, "PrimaryMaxHz", &self.primary_max_hz.to_string())?;
        store.write(DISPLAY_SECTION, "ExternalMaxHz", &self.external_max_hz.to_string())?;

        for id in HotkeyId::ALL {
            let binding = self.hotkeys.get(id);
            let name = id.settings_name();
            store.write(SHORTCUTS_SECTION, &format!("{name}Key"), &binding.key.to_string())?;
            store.write(
                SHORTCUTS_SECTION,
                &format!("{name}Modifiers"),
                &binding.modifiers.to_string(),
            )?;
        }

        Ok(())
    }

    /// Saved audio device for a display mode, if one is set.
    pub fn device_for(&self, mode: DisplayMode) -> Option<&str> {
        let name = match mode {
            DisplayMode::Primary => &self.primary_device,
            DisplayMode::Secondary => &self.secondary_device,
        };
        (!name.is_empty()).then_some(name.as_str())
    }

    pub fn set_device_for(&mut self, mode: DisplayMode, name: &str) {
        match mode {
            DisplayMode::Primary => self.primary_device = name.to_string(),
            DisplayMode::Secondary => self.secondary_device = name.to_string(),
        }
    }

    pub fn ceiling_for(&self, mode: DisplayMode) -> RefreshCeiling {
        match mode {
            DisplayMode::Primary => RefreshCeiling(self.primary_max_hz),
            DisplayMode::Secondary => RefreshCeiling(self.external_max_hz),
        }
    }
}

/// Overwrite `target` with the parsed value, or leave it if parsing fails.
fn read_parsed<T: std::str::FromStr>(store: &dyn ProfileStore, section: &str, key: &str, target: &mut T) {
    let Some(raw) = store.read(section, key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => debug!(section, key, value = %raw, "Ignoring unparseable setting"),
    }
}

struct SharedInner {
    settings: Settings,
    store: Box<dyn ProfileStore>,
}

/// Settings shared between the UI thread and background sequences.
///
/// Every mutation is a field assignment followed by a full persist, done
/// under one lock.
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<Mutex<SharedInner>>,
}

impl SharedSettings {
    /// Load settings from `store` and keep it for persisting later changes.
    pub fn load(store: Box<dyn ProfileStore>) -> Self {
        let settings = Settings::load(store.as_ref());
        Self::with_settings(settings, store)
    }

    pub fn with_settings(settings: Settings, store: Box<dyn ProfileStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedInner { settings, store })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn device_for(&self, mode: DisplayMode) -> Option<String> {
        self.lock().settings.device_for(mode).map(str::to_string)
    }

    pub fn ceiling_for(&self, mode: DisplayMode) -> RefreshCeiling {
        self.lock().settings.ceiling_for(mode)
    }

    /// Apply `change` and persist.
    pub fn update<F>(&self, change: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.lock();
        let SharedInner { settings, store } = &mut *guard;
        change(settings);
        settings.save(store.as_mut()).inspect_err(|e| {
            warn!(error = %e, "Failed to persist settings");
        })
    }

    /// Save `name` as the audio device for `mode`.
    pub fn set_device_for(&self, mode: DisplayMode, name: &str) -> Result<(), SettingsError> {
        self.update(|s| s.set_device_for(mode, name))
    }
}

//! Settings persistence.
//!
//! Per-mode audio devices, refresh-rate ceilings and hotkey bindings,
//! stored as section/key pairs, plus the launch-at-login entry.

#[cfg(windows)]
pub mod ini;
pub mod profile;
pub mod settings;
pub mod startup;

#[cfg(windows)]
pub use ini::IniProfile;
pub use profile::MemoryProfile;
pub use settings::{ProfileStore, Settings, SettingsError, SharedSettings};
pub use startup::{MemoryStartup, StartupEntry, StartupError};

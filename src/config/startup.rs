//! "Start with Windows" registration.

use thiserror::Error;

/// Startup registration error types.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to access registry: {0}")]
    RegistryAccess(String),

    #[error("Failed to write startup entry: {key}")]
    WriteFailed { key: String },
}

/// Launch-at-login entry for the current user.
pub trait StartupEntry {
    fn is_enabled(&self) -> bool;
    fn set_enabled(&self, enabled: bool) -> Result<(), StartupError>;
}

/// Startup entry kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStartup {
    enabled: std::cell::Cell<bool>,
}

impl StartupEntry for MemoryStartup {
    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), StartupError> {
        self.enabled.set(enabled);
        Ok(())
    }
}

//! Display topology switching.
//!
//! Wraps the OS internal/external projection toggle and tracks which
//! arrangement the application believes is active.

use super::mode::{DisplayError, DisplayMode};
use tracing::{info, warn};

/// Projection target passed to the OS topology switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyTarget {
    /// Internal display only
    Internal,

    /// External display only
    External,
}

impl TopologyTarget {
    /// Command-line argument understood by `DisplaySwitch.exe`.
    pub fn argument(self) -> &'static str {
        match self {
            TopologyTarget::Internal => "/internal",
            TopologyTarget::External => "/external",
        }
    }
}

/// Launches the OS topology switch.
///
/// Returns the raw launch result. Values at or below
/// [`DisplaySwitcher::LAUNCH_FAILURE_THRESHOLD`] mean failure, following the
/// `ShellExecute` convention.
pub trait TopologySwitch {
    fn launch(&self, target: TopologyTarget) -> isize;
}

/// Tracks and toggles the internal/external display arrangement.
pub struct DisplaySwitcher<T> {
    switch: T,
    primary_only: bool,
    mode: DisplayMode,
}

impl<T: TopologySwitch> DisplaySwitcher<T> {
    /// Launch results at or below this value are failures.
    pub const LAUNCH_FAILURE_THRESHOLD: isize = 32;

    /// Create a switcher assuming the internal display is the only one active.
    pub fn new(switch: T) -> Self {
        Self {
            switch,
            primary_only: true,
            mode: DisplayMode::Primary,
        }
    }

    /// The cached display mode.
    pub fn current_mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn is_primary_only(&self) -> bool {
        self.primary_only
    }

    /// Switch to the other arrangement.
    ///
    /// On success the cached mode is already updated when this returns, even
    /// though the hardware may still be renegotiating. On failure nothing changes.
    pub fn toggle(&mut self) -> Result<DisplayMode, DisplayError> {
        let to_external = self.primary_only;
        let target = if to_external {
            TopologyTarget::External
        } else {
            TopologyTarget::Internal
        };

        let code = self.switch.launch(target);
        if code <= Self::LAUNCH_FAILURE_THRESHOLD {
            warn!(code, target = target.argument(), "Display switch failed");
            return Err(DisplayError::SwitchFailed { code });
        }

        self.mode = if to_external {
            DisplayMode::Secondary
        } else {
            DisplayMode::Primary
        };
        self.primary_only = !to_external;

        info!(mode = %self.mode, "Switched display");
        Ok(self.mode)
    }
}

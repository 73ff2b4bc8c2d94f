//! Display data models.
//!
//! Defines the logical display arrangement, enumerated display modes,
//! refresh-rate ceilings and display error types.

use std::fmt;
use thiserror::Error;

/// Which physical display arrangement the application believes is active.
///
/// This is cached state owned by [`DisplaySwitcher`](super::DisplaySwitcher); it is
/// not re-read from the OS and can drift if a topology switch silently fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayMode {
    /// Internal panel only
    #[default]
    Primary,

    /// External display (extended/external topology)
    Secondary,
}

impl DisplayMode {
    /// The mode a toggle would switch to.
    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Primary => DisplayMode::Secondary,
            DisplayMode::Secondary => DisplayMode::Primary,
        }
    }

    /// Short label for tray and status text.
    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::Primary => "Primary",
            DisplayMode::Secondary => "External",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A (resolution, refresh frequency) pair reported by the display driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeDescriptor {
    pub width: u32,
    pub height: u32,

    /// Refresh frequency in Hz
    pub frequency: u32,
}

impl ModeDescriptor {
    pub fn new(width: u32, height: u32, frequency: u32) -> Self {
        Self {
            width,
            height,
            frequency,
        }
    }

    /// True if both modes drive the same resolution.
    pub fn same_resolution(&self, other: &ModeDescriptor) -> bool {
        self.width == other.width && self.height == other.height
    }
}

impl fmt::Display for ModeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}Hz", self.width, self.height, self.frequency)
    }
}

/// User-configured refresh-rate cap in Hz. Zero means "no cap".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshCeiling(pub u32);

impl RefreshCeiling {
    /// Upper bound used when no ceiling is configured. Guards against
    /// drivers advertising nonsense frequencies.
    pub const SANITY_LIMIT_HZ: u32 = 360;

    /// Tolerance for fractional NTSC rates (119.88 Hz is reported as 119 or 120
    /// depending on the driver).
    pub const FRACTIONAL_TOLERANCE_HZ: u32 = 1;

    pub fn unlimited() -> Self {
        Self(0)
    }

    pub fn is_unlimited(&self) -> bool {
        self.0 == 0
    }

    /// The configured frequency, without fractional tolerance.
    pub fn nominal_hz(&self) -> u32 {
        if self.is_unlimited() {
            Self::SANITY_LIMIT_HZ
        } else {
            self.0.min(Self::SANITY_LIMIT_HZ)
        }
    }

    /// Highest frequency a selected mode may have.
    pub fn effective_hz(&self) -> u32 {
        if self.is_unlimited() {
            Self::SANITY_LIMIT_HZ
        } else {
            self.0
                .saturating_add(Self::FRACTIONAL_TOLERANCE_HZ)
                .min(Self::SANITY_LIMIT_HZ)
        }
    }

    /// Whether a frequency is acceptable under this ceiling.
    pub fn admits(&self, frequency: u32) -> bool {
        frequency <= self.effective_hz()
    }
}

impl From<u32> for RefreshCeiling {
    fn from(hz: u32) -> Self {
        Self(hz)
    }
}

/// Display service error types.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Failed to read current display settings for {device}")]
    CurrentModeUnavailable { device: String },

    #[error("Failed to apply refresh rate ({mode}): display change returned {code}")]
    ApplyRejected { mode: ModeDescriptor, code: i32 },

    #[error("Failed to launch DisplaySwitch.exe (result {code})")]
    SwitchFailed { code: isize },
}

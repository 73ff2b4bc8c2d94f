//! Display Refresh Rate - Library
//!
//! A system tray utility that keeps Windows displays at their fastest
//! refresh rate and moves audio along with the active display.
//!
//! ## Features
//!
//! - Switch between the internal and an external display in one action
//! - Apply the highest refresh rate under a per-display ceiling
//! - Route the default audio endpoint to the device saved for each display
//! - Learn the user's device choice when Windows picks something else
//! - Global hotkeys and a tray menu showing the current refresh rate
//! - Start with Windows option

pub mod app;
pub mod audio;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod hotkey;
pub mod logging;
#[cfg(windows)]
pub mod platform;
pub mod ui;

pub use app::{AppEvent, AppState, MenuAction};
pub use audio::{AudioEndpointRouter, AudioError};
pub use config::{Settings, SettingsError, SharedSettings};
pub use coordinator::{DisplayStatus, ModeTransitionCoordinator, UiDispatch, UiUpdate};
pub use display::{DisplayError, DisplayMode, ModeDescriptor, RefreshCeiling};

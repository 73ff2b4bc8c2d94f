//! UI module for the system tray.
//!
//! Icon rendering is portable; the tray itself is Windows-only.

pub mod icons;
#[cfg(windows)]
pub mod tray;

#[cfg(windows)]
pub use tray::{TrayError, TrayManager};

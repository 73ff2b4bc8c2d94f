//! Windows bindings for the display, hotkey, startup and dispatch seams.

pub mod dispatch;
pub mod display;
pub mod hotkeys;
pub mod registry;

pub use dispatch::{WindowDispatcher, WM_APP_UPDATE};
pub use display::{DisplaySwitchExe, Win32DisplayModes};
pub use hotkeys::{register_hotkeys, unregister_hotkeys};
pub use registry::RunKeyEntry;

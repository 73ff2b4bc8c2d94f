//! Display module for refresh-rate selection and topology switching.

pub mod enumerator;
pub mod mode;
pub mod switcher;

pub use enumerator::{select_mode, DisplayModeSource, ModeEnumerator};
pub use mode::{DisplayError, DisplayMode, ModeDescriptor, RefreshCeiling};
pub use switcher::{DisplaySwitcher, TopologySwitch, TopologyTarget};

//! Global hotkey registration on the message window.

use crate::hotkey::{HotkeyBindings, HotkeyId};
use tracing::{info, warn};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
};

/// Register every binding. A failure is logged and the rest still register.
///
/// Returns the number of hotkeys registered.
pub fn register_hotkeys(hwnd: HWND, bindings: &HotkeyBindings) -> usize {
    let mut registered = 0;
    for id in HotkeyId::ALL {
        let binding = bindings.get(id);
        let modifiers = HOT_KEY_MODIFIERS(binding.modifiers.bits()) | MOD_NOREPEAT;
        match unsafe { RegisterHotKey(hwnd, id as i32, modifiers, binding.key.vk()) } {
            Ok(()) => {
                info!(hotkey = %binding.label(), ?id, "Registered hotkey");
                registered += 1;
            }
            Err(e) => warn!(hotkey = %binding.label(), ?id, error = %e, "Failed to register hotkey"),
        }
    }
    registered
}

pub fn unregister_hotkeys(hwnd: HWND) {
    for id in HotkeyId::ALL {
        unsafe {
            let _ = UnregisterHotKey(hwnd, id as i32);
        }
    }
}

//! Marshals background results onto the message-loop thread.

use crate::coordinator::{UiDispatch, UiUpdate};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use tracing::debug;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{PostMessageW, WM_USER};

/// Posted to the message window whenever an update is queued.
pub const WM_APP_UPDATE: u32 = WM_USER + 1;

/// Queues updates and wakes the message window.
pub struct WindowDispatcher {
    sender: Mutex<Sender<UiUpdate>>,
    // HWND is not Send; the raw handle value is.
    hwnd: isize,
}

impl WindowDispatcher {
    /// Create a dispatcher for `hwnd` and the receiver its window drains.
    pub fn new(hwnd: HWND) -> (Self, Receiver<UiUpdate>) {
        let (sender, receiver) = channel();
        (
            Self {
                sender: Mutex::new(sender),
                hwnd: hwnd.0 as isize,
            },
            receiver,
        )
    }
}

impl UiDispatch for WindowDispatcher {
    fn dispatch(&self, update: UiUpdate) {
        let sent = match self.sender.lock() {
            Ok(sender) => sender.send(update).is_ok(),
            Err(_) => false,
        };
        if !sent {
            debug!("Message window gone; dropping update");
            return;
        }

        unsafe {
            let _ = PostMessageW(
                HWND(self.hwnd as *mut core::ffi::c_void),
                WM_APP_UPDATE,
                WPARAM(0),
                LPARAM(0),
            );
        }
    }
}

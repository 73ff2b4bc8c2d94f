//! System tray icon management.
//!
//! Manages the system tray icon, tooltip, and context menu.

use super::icons::{generate_rate_icon, ICON_SIZE};
use crate::app::{self, DeviceEntry, MenuAction, StatusView};
use crate::coordinator::DisplayStatus;
use crate::display::DisplayMode;
use crate::hotkey::{HotkeyBindings, HotkeyId};
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    Icon, TrayIcon, TrayIconBuilder, TrayIconEvent,
};
use windows::core::PCWSTR;
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to load icon resource")]
    IconLoadFailed,

    #[error("Tray icon not initialized")]
    NotInitialized,

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

fn menu_error(e: tray_icon::menu::Error) -> TrayError {
    TrayError::MenuFailed(e.to_string())
}

/// Device submenu and the entries currently in it.
struct DeviceSubmenu {
    mode: DisplayMode,
    submenu: Submenu,
    items: Vec<CheckMenuItem>,
}

/// System tray manager.
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    status_item: MenuItem,
    startup_item: CheckMenuItem,
    primary_devices: DeviceSubmenu,
    secondary_devices: DeviceSubmenu,
    actions: HashMap<MenuId, MenuAction>,
}

impl TrayManager {
    /// Create and show the tray icon.
    pub fn create(hotkeys: &HotkeyBindings) -> Result<Self, TrayError> {
        let menu = Menu::new();
        let mut actions = HashMap::new();

        let status_item = MenuItem::new(app::status_line(None), false, None);
        menu.append(&status_item).map_err(menu_error)?;
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_error)?;

        for (id, text) in [
            (HotkeyId::SetMaxRefresh, "Set Max Refresh Rate"),
            (HotkeyId::ToggleDisplay, "Toggle Display+Audio"),
        ] {
            let label = format!("{text}\t{}", hotkeys.get(id).label());
            let item = MenuItem::new(label, true, None);
            actions.insert(item.id().clone(), MenuAction::from(id));
            menu.append(&item).map_err(menu_error)?;
        }
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_error)?;

        let primary_devices = DeviceSubmenu {
            mode: DisplayMode::Primary,
            submenu: Submenu::new("Primary audio", true),
            items: Vec::new(),
        };
        let secondary_devices = DeviceSubmenu {
            mode: DisplayMode::Secondary,
            submenu: Submenu::new("External audio", true),
            items: Vec::new(),
        };
        menu.append(&primary_devices.submenu).map_err(menu_error)?;
        menu.append(&secondary_devices.submenu).map_err(menu_error)?;
        menu.append(&PredefinedMenuItem::separator()).map_err(menu_error)?;

        // Add "Start with Windows" menu item (as a checkbox)
        let startup_item = CheckMenuItem::new("Start with Windows", true, false, None);
        actions.insert(startup_item.id().clone(), MenuAction::ToggleStartup);
        menu.append(&startup_item).map_err(menu_error)?;

        let exit_item = MenuItem::new("Exit", true, None);
        actions.insert(exit_item.id().clone(), MenuAction::Exit);
        menu.append(&exit_item).map_err(menu_error)?;

        let tray_icon = TrayIconBuilder::new()
            .with_icon(create_icon(0)?)
            .with_tooltip(app::tooltip(None))
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        Ok(Self {
            tray_icon: Some(tray_icon),
            status_item,
            startup_item,
            primary_devices,
            secondary_devices,
            actions,
        })
    }

    /// Drain pending tray and menu events. Call this from the event loop.
    pub fn process_events(&self) -> Vec<MenuAction> {
        // Icon clicks only open the context menu
        while TrayIconEvent::receiver().try_recv().is_ok() {}

        let mut actions = Vec::new();
        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if let Some(action) = self.actions.get(&event.id) {
                actions.push(action.clone());
            }
        }
        actions
    }

    /// Update the tray icon to show `hz`.
    pub fn set_icon(&mut self, hz: u32) -> Result<(), TrayError> {
        // Create icon before borrowing tray_icon
        let icon = create_icon(hz)?;
        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_icon(Some(icon))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        Ok(())
    }

    /// Update the tooltip text.
    pub fn set_tooltip(&mut self, text: &str) -> Result<(), TrayError> {
        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_tooltip(Some(text))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        Ok(())
    }

    fn rebuild_devices(&mut self, which: DisplayMode, entries: Vec<DeviceEntry>) -> Result<(), TrayError> {
        let target = match which {
            DisplayMode::Primary => &mut self.primary_devices,
            DisplayMode::Secondary => &mut self.secondary_devices,
        };

        for item in target.items.drain(..) {
            self.actions.remove(item.id());
            target.submenu.remove(&item).map_err(menu_error)?;
        }

        for entry in entries {
            let item = CheckMenuItem::new(&entry.label, entry.enabled, entry.checked, None);
            self.actions.insert(
                item.id().clone(),
                MenuAction::SelectDevice {
                    mode: target.mode,
                    name: entry.name,
                },
            );
            target.submenu.append(&item).map_err(menu_error)?;
            target.items.push(item);
        }

        Ok(())
    }

    /// Destroy the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
    }
}

impl StatusView for TrayManager {
    fn show_status(&mut self, status: &DisplayStatus) {
        self.status_item.set_text(app::status_line(Some(status)));
        if let Err(e) = self.set_icon(status.hz) {
            warn!(error = %e, "Failed to update tray icon");
        }
        if let Err(e) = self.set_tooltip(&app::tooltip(Some(status))) {
            warn!(error = %e, "Failed to update tray tooltip");
        }
    }

    fn show_error(&mut self, message: &str) {
        let text: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();
        let caption: Vec<u16> = "DisplayRefreshRate"
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();
        unsafe {
            MessageBoxW(
                None,
                PCWSTR::from_raw(text.as_ptr()),
                PCWSTR::from_raw(caption.as_ptr()),
                MB_OK | MB_ICONERROR,
            );
        }
    }

    fn show_devices(&mut self, primary: Vec<DeviceEntry>, secondary: Vec<DeviceEntry>) {
        for (mode, entries) in [(DisplayMode::Primary, primary), (DisplayMode::Secondary, secondary)] {
            if let Err(e) = self.rebuild_devices(mode, entries) {
                warn!(error = %e, %mode, "Failed to rebuild device menu");
            }
        }
    }

    fn set_startup_checked(&mut self, checked: bool) {
        self.startup_item.set_checked(checked);
    }
}

/// Create an icon showing the given refresh rate.
fn create_icon(hz: u32) -> Result<Icon, TrayError> {
    Icon::from_rgba(generate_rate_icon(hz), ICON_SIZE, ICON_SIZE).map_err(|_| TrayError::IconLoadFailed)
}

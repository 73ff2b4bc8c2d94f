//! Application state and lifecycle management.
//!
//! Owns what the interactive thread shows and turns user actions into
//! coordinator calls. Platform code feeds it [`AppEvent`]s and renders through
//! a [`StatusView`].

use crate::audio::{AudioEndpoints, EndpointPolicy, RenderDevice};
use crate::config::{SharedSettings, StartupEntry};
use crate::coordinator::{DisplayStatus, ModeTransitionCoordinator, UiUpdate};
use crate::display::{DisplayMode, DisplayModeSource, TopologySwitch};
use crate::hotkey::HotkeyId;
use tracing::{debug, info, warn};

/// User-triggered actions from the tray menu or hotkeys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    SetMaxRefresh,
    ToggleDisplay,
    /// Save `name` as the audio device for `mode`
    SelectDevice { mode: DisplayMode, name: String },
    ToggleStartup,
    Exit,
}

impl From<HotkeyId> for MenuAction {
    fn from(id: HotkeyId) -> Self {
        match id {
            HotkeyId::SetMaxRefresh => MenuAction::SetMaxRefresh,
            HotkeyId::ToggleDisplay => MenuAction::ToggleDisplay,
        }
    }
}

/// Everything the interactive thread reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Action(MenuAction),
    /// The OS reported a display settings change
    DisplayChanged,
    Update(UiUpdate),
}

/// One entry of a per-mode audio device submenu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Name saved when the entry is picked
    pub name: String,
    pub label: String,
    pub checked: bool,
    pub enabled: bool,
}

/// Build the device submenu for one mode.
///
/// The saved device is listed as offline when it is not among `devices`, so
/// the user can still see what is configured.
pub fn device_entries(devices: &[RenderDevice], saved: Option<&str>) -> Vec<DeviceEntry> {
    let mut entries: Vec<DeviceEntry> = devices
        .iter()
        .map(|device| DeviceEntry {
            name: device.name.clone(),
            label: device.name.clone(),
            checked: saved.is_some_and(|s| s.eq_ignore_ascii_case(&device.name)),
            enabled: true,
        })
        .collect();

    if let Some(saved) = saved {
        if !entries.iter().any(|e| e.checked) {
            entries.push(DeviceEntry {
                name: saved.to_string(),
                label: format!("{saved} (offline)"),
                checked: true,
                enabled: false,
            });
        }
    }

    entries
}

/// Tray tooltip for a status.
pub fn tooltip(status: Option<&DisplayStatus>) -> String {
    match status {
        Some(status) => format!(
            "DisplayRefreshRate - {}Hz ({})",
            status.hz,
            status.mode.label()
        ),
        None => "DisplayRefreshRate".to_string(),
    }
}

/// First line of the tray menu.
pub fn status_line(status: Option<&DisplayStatus>) -> String {
    match status {
        Some(status) if status.hz > 0 => format!("{} display - {} Hz", status.mode.label(), status.hz),
        Some(status) => format!("{} display", status.mode.label()),
        None => "Reading display...".to_string(),
    }
}

/// Rendering surface for the interactive thread.
pub trait StatusView {
    fn show_status(&mut self, status: &DisplayStatus);

    /// Show a failure the user has to acknowledge.
    fn show_error(&mut self, message: &str);

    fn show_devices(&mut self, primary: Vec<DeviceEntry>, secondary: Vec<DeviceEntry>);

    fn set_startup_checked(&mut self, checked: bool);
}

/// Main application state.
#[derive(Debug, Default)]
pub struct AppState {
    /// Last status delivered, whichever sequence sent it
    pub status: Option<DisplayStatus>,

    /// Whether the application should exit
    pub should_exit: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the initial status, device lists and startup check state.
    pub fn initialize<S, T, E, P>(
        &mut self,
        coordinator: &ModeTransitionCoordinator<S, T, E, P>,
        startup: &dyn StartupEntry,
        view: &mut dyn StatusView,
    ) where
        S: DisplayModeSource + 'static,
        T: TopologySwitch,
        E: AudioEndpoints + 'static,
        P: EndpointPolicy + 'static,
    {
        self.apply_status(coordinator.status(), view);
        refresh_devices(coordinator, view);
        view.set_startup_checked(startup.is_enabled());
    }

    fn apply_status(&mut self, status: DisplayStatus, view: &mut dyn StatusView) {
        debug!(mode = %status.mode, hz = status.hz, "Status update");
        self.status = Some(status);
        view.show_status(&status);
    }

    /// Handle one event on the interactive thread.
    pub fn handle_event<S, T, E, P>(
        &mut self,
        event: AppEvent,
        coordinator: &mut ModeTransitionCoordinator<S, T, E, P>,
        startup: &dyn StartupEntry,
        view: &mut dyn StatusView,
    ) where
        S: DisplayModeSource + 'static,
        T: TopologySwitch,
        E: AudioEndpoints + 'static,
        P: EndpointPolicy + 'static,
    {
        match event {
            AppEvent::Action(action) => self.handle_action(action, coordinator, startup, view),
            AppEvent::DisplayChanged => {
                // Detached; the read-back arrives as a status update
                let _ = coordinator.on_display_changed();
            }
            AppEvent::Update(UiUpdate::Status(status)) => self.apply_status(status, view),
            AppEvent::Update(UiUpdate::Failure(message)) => view.show_error(&message),
            AppEvent::Update(UiUpdate::DevicesChanged) => refresh_devices(coordinator, view),
        }
    }

    fn handle_action<S, T, E, P>(
        &mut self,
        action: MenuAction,
        coordinator: &mut ModeTransitionCoordinator<S, T, E, P>,
        startup: &dyn StartupEntry,
        view: &mut dyn StatusView,
    ) where
        S: DisplayModeSource + 'static,
        T: TopologySwitch,
        E: AudioEndpoints + 'static,
        P: EndpointPolicy + 'static,
    {
        match action {
            MenuAction::SetMaxRefresh => {
                // Failures are reported through the dispatcher
                let _ = coordinator.set_max_rate();
            }
            MenuAction::ToggleDisplay => {
                // The new mode is known once the switch returns; the rate
                // branch follows up with the applied refresh rate
                if coordinator.toggle().is_ok() {
                    self.apply_status(coordinator.status(), view);
                }
            }
            MenuAction::SelectDevice { mode, name } => {
                info!(%mode, device = %name, "Audio device selected");
                if let Err(e) = coordinator.settings().set_device_for(mode, &name) {
                    view.show_error(&format!("Could not save audio device: {e}"));
                }
                refresh_devices(coordinator, view);
            }
            MenuAction::ToggleStartup => {
                let enabled = !startup.is_enabled();
                match startup.set_enabled(enabled) {
                    Ok(()) => {
                        info!(enabled, "Start with Windows changed");
                        view.set_startup_checked(enabled);
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to change startup entry");
                        view.set_startup_checked(startup.is_enabled());
                        view.show_error(&e.to_string());
                    }
                }
            }
            MenuAction::Exit => {
                self.should_exit = true;
            }
        }
    }
}

fn refresh_devices<S, T, E, P>(
    coordinator: &ModeTransitionCoordinator<S, T, E, P>,
    view: &mut dyn StatusView,
) where
    S: DisplayModeSource + 'static,
    T: TopologySwitch,
    E: AudioEndpoints + 'static,
    P: EndpointPolicy + 'static,
{
    let devices = coordinator
        .router()
        .endpoints()
        .render_devices(false)
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list audio devices");
            Vec::new()
        });

    let settings: &SharedSettings = coordinator.settings();
    view.show_devices(
        device_entries(&devices, settings.device_for(DisplayMode::Primary).as_deref()),
        device_entries(&devices, settings.device_for(DisplayMode::Secondary).as_deref()),
    );
}

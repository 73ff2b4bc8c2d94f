//! Full toggle sequences against in-memory display, audio and settings.

use display_refresh_rate::app::{AppEvent, AppState, DeviceEntry, StatusView};
use display_refresh_rate::audio::{
    AudioEndpointRouter, AudioEndpoints, AudioError, DeviceRole, EndpointPolicy, RenderDevice,
    RouterTimings,
};
use display_refresh_rate::config::{MemoryProfile, MemoryStartup, SharedSettings};
use display_refresh_rate::coordinator::{
    DisplayStatus, ModeTransitionCoordinator, TransitionPhase, TransitionTimings, UiDispatch,
    UiUpdate,
};
use display_refresh_rate::display::{
    DisplayError, DisplayMode, DisplayModeSource, DisplaySwitcher, ModeDescriptor, ModeEnumerator,
    TopologySwitch, TopologyTarget,
};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Monitor {
    current: Mutex<ModeDescriptor>,
    modes: Vec<ModeDescriptor>,
}

impl DisplayModeSource for Monitor {
    fn current_mode(&self, _device: Option<&str>) -> Result<ModeDescriptor, DisplayError> {
        Ok(*self.current.lock().unwrap())
    }

    fn mode_at(&self, _device: Option<&str>, index: u32) -> Option<ModeDescriptor> {
        self.modes.get(index as usize).copied()
    }

    fn apply_mode(&self, _device: Option<&str>, mode: &ModeDescriptor) -> Result<(), DisplayError> {
        *self.current.lock().unwrap() = *mode;
        Ok(())
    }
}

struct AlwaysSwitches;

impl TopologySwitch for AlwaysSwitches {
    fn launch(&self, _target: TopologyTarget) -> isize {
        42
    }
}

struct Speakers {
    active: Vec<RenderDevice>,
    default_name: Option<String>,
}

impl AudioEndpoints for Speakers {
    fn render_devices(&self, _include_disabled: bool) -> Result<Vec<RenderDevice>, AudioError> {
        Ok(self.active.clone())
    }

    fn default_render_device_name(&self) -> Option<String> {
        self.default_name.clone()
    }

    fn device_name(&self, device_id: &str) -> Option<String> {
        self.active
            .iter()
            .find(|d| d.id == device_id)
            .map(|d| d.name.clone())
    }
}

#[derive(Default)]
struct RecordingPolicy {
    calls: Mutex<Vec<(String, DeviceRole)>>,
}

impl EndpointPolicy for RecordingPolicy {
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
        self.calls.lock().unwrap().push((device_id.to_string(), role));
        Ok(())
    }
}

struct ChannelUi(Mutex<Sender<UiUpdate>>);

impl UiDispatch for ChannelUi {
    fn dispatch(&self, update: UiUpdate) {
        let _ = self.0.lock().unwrap().send(update);
    }
}

#[derive(Default)]
struct TrayLabel {
    shown: Vec<DisplayStatus>,
}

impl StatusView for TrayLabel {
    fn show_status(&mut self, status: &DisplayStatus) {
        self.shown.push(*status);
    }

    fn show_error(&mut self, message: &str) {
        panic!("unexpected error: {message}");
    }

    fn show_devices(&mut self, _primary: Vec<DeviceEntry>, _secondary: Vec<DeviceEntry>) {}

    fn set_startup_checked(&mut self, _checked: bool) {}
}

type Coordinator = ModeTransitionCoordinator<Monitor, AlwaysSwitches, Speakers, RecordingPolicy>;

fn fast_router_timings() -> RouterTimings {
    RouterTimings {
        poll_interval: Duration::from_millis(1),
        primary_timeout: Duration::from_millis(10),
        secondary_timeout: Duration::from_millis(10),
        retry_attempts: 3,
        retry_backoff: Duration::from_millis(1),
        learn_delay: Duration::from_millis(1),
    }
}

fn build(profile: &MemoryProfile, speakers: Speakers) -> (Coordinator, Receiver<UiUpdate>) {
    let settings = SharedSettings::load(Box::new(profile.clone()));
    let monitor = Monitor {
        current: Mutex::new(ModeDescriptor::new(1920, 1080, 60)),
        modes: vec![
            ModeDescriptor::new(1920, 1080, 60),
            ModeDescriptor::new(1920, 1080, 120),
            ModeDescriptor::new(1920, 1080, 144),
        ],
    };
    let router = Arc::new(AudioEndpointRouter::new(
        speakers,
        RecordingPolicy::default(),
        settings.clone(),
        fast_router_timings(),
        DisplayMode::Primary,
    ));
    let (sender, receiver) = channel();

    let coordinator = ModeTransitionCoordinator::new(
        DisplaySwitcher::new(AlwaysSwitches),
        Arc::new(ModeEnumerator::new(monitor)),
        router,
        settings,
        Arc::new(ChannelUi(Mutex::new(sender))),
        TransitionTimings {
            display_settle: Duration::from_millis(5),
            rate_settle: Duration::from_millis(5),
            resync_delay: Duration::from_millis(1),
        },
    );
    (coordinator, receiver)
}

#[test]
fn external_switch_caps_at_ceiling_and_routes_audio() {
    let profile = MemoryProfile::new();
    profile.set("Audio", "Secondary", "DELL U2720Q");
    let speakers = Speakers {
        active: vec![
            RenderDevice::new("{int}", "Realtek Speakers"),
            RenderDevice::new("{ext}", "DELL U2720Q (NVIDIA High Definition Audio)"),
        ],
        default_name: Some("Realtek Speakers".to_string()),
    };
    let (mut coordinator, updates) = build(&profile, speakers);

    let handle = coordinator.toggle().unwrap();
    assert_eq!(handle.join(), TransitionPhase::Done);

    // External ceiling defaults to 119, which admits the 120 Hz mode
    assert_eq!(
        updates.try_iter().collect::<Vec<_>>(),
        vec![UiUpdate::Status(DisplayStatus {
            mode: DisplayMode::Secondary,
            hz: 120,
        })]
    );

    let calls = coordinator.router().policy().calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(id, _)| id == "{ext}"));
}

#[test]
fn missing_device_learns_current_default() {
    let profile = MemoryProfile::new();
    profile.set("Audio", "Secondary", "Speakers");
    let speakers = Speakers {
        active: vec![RenderDevice::new("{hp}", "Headphones")],
        default_name: Some("Headphones".to_string()),
    };
    let (mut coordinator, _updates) = build(&profile, speakers);

    coordinator.toggle().unwrap().join();

    assert_eq!(profile.get("Audio", "Secondary").as_deref(), Some("Headphones"));
    assert!(coordinator.router().policy().calls.lock().unwrap().is_empty());
}

#[test]
fn back_to_back_toggles_show_last_delivered_status() {
    let profile = MemoryProfile::new();
    let speakers = Speakers {
        active: vec![RenderDevice::new("{int}", "Speakers")],
        default_name: Some("Speakers".to_string()),
    };
    let (mut coordinator, updates) = build(&profile, speakers);
    let startup = MemoryStartup::default();
    let mut tray = TrayLabel::default();
    let mut app = AppState::new();

    let first = coordinator.toggle().unwrap();
    let second = coordinator.toggle().unwrap();
    first.join();
    second.join();

    assert_eq!(coordinator.current_mode(), DisplayMode::Primary);

    let delivered: Vec<UiUpdate> = updates.try_iter().collect();
    assert_eq!(delivered.len(), 2);
    for update in delivered.iter().cloned() {
        app.handle_event(AppEvent::Update(update), &mut coordinator, &startup, &mut tray);
    }

    let Some(UiUpdate::Status(last)) = delivered.last() else {
        panic!("expected a status update");
    };
    assert_eq!(app.status.as_ref(), Some(last));
    assert_eq!(tray.shown.last(), Some(last));
}

//! Audio endpoint routing that follows the display mode.
//!
//! After a display switch the saved render device for the new mode is waited
//! for, made default for every role, and, if that fails, whatever Windows
//! picked is learned as the new saved device. Default-device notifications
//! caused by our own writes are absorbed; any other change is learned for the
//! active mode.

use super::device::{AudioError, DeviceRole, RenderDevice};
use super::matching::{find_device, names_match};
use super::suppression::SuppressionGuard;
use crate::config::SharedSettings;
use crate::display::DisplayMode;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Read access to the system's audio render endpoints.
pub trait AudioEndpoints: Send + Sync {
    /// Render endpoints, optionally including disabled ones.
    fn render_devices(&self, include_disabled: bool) -> Result<Vec<RenderDevice>, AudioError>;

    /// Friendly name of the default render endpoint (Console role).
    fn default_render_device_name(&self) -> Option<String>;

    /// Friendly name for a device ID.
    fn device_name(&self, device_id: &str) -> Option<String>;
}

/// Sets the system default endpoint for a role.
///
/// Windows only exposes this through an undocumented COM interface, so it sits
/// behind a trait of its own.
pub trait EndpointPolicy: Send + Sync {
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError>;
}

/// Waits and retry limits used while routing.
#[derive(Debug, Clone)]
pub struct RouterTimings {
    pub poll_interval: Duration,

    /// How long to wait for the internal display's device to appear
    pub primary_timeout: Duration,

    /// How long to wait for the external display's device (HDMI/DP audio
    /// enumerates slowly after a video output change)
    pub secondary_timeout: Duration,

    pub retry_attempts: u32,
    pub retry_backoff: Duration,

    /// Settle time before reading the default device to learn it
    pub learn_delay: Duration,
}

impl RouterTimings {
    pub fn timeout_for(&self, mode: DisplayMode) -> Duration {
        match mode {
            DisplayMode::Primary => self.primary_timeout,
            DisplayMode::Secondary => self.secondary_timeout,
        }
    }
}

impl Default for RouterTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            primary_timeout: Duration::from_secs(3),
            secondary_timeout: Duration::from_secs(8),
            retry_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            learn_delay: Duration::from_millis(1500),
        }
    }
}

/// Result of [`AudioEndpointRouter::route_for_mode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The saved device is now the default for every role
    Routed { device: String },

    /// Routing failed; the current default was saved for the mode instead
    Learned { device: String },

    /// Routing failed and no default device could be read
    Unresolved,
}

impl RouteOutcome {
    pub fn routed(&self) -> bool {
        matches!(self, RouteOutcome::Routed { .. })
    }
}

/// What a default-device notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Caused by our own write
    Suppressed,

    /// A user change, saved for the active mode
    Learned { mode: DisplayMode, device: String },

    /// Nothing to act on
    Ignored,
}

struct RouterState {
    guard: SuppressionGuard,
    active_mode: DisplayMode,
}

/// Moves the default audio output to the saved device for a display mode.
pub struct AudioEndpointRouter<E, P> {
    endpoints: E,
    policy: P,
    settings: SharedSettings,
    timings: RouterTimings,
    state: Mutex<RouterState>,
}

impl<E: AudioEndpoints, P: EndpointPolicy> AudioEndpointRouter<E, P> {
    pub fn new(
        endpoints: E,
        policy: P,
        settings: SharedSettings,
        timings: RouterTimings,
        active_mode: DisplayMode,
    ) -> Self {
        Self {
            endpoints,
            policy,
            settings,
            timings,
            state: Mutex::new(RouterState {
                guard: SuppressionGuard::new(),
                active_mode,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn endpoints(&self) -> &E {
        &self.endpoints
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Record which display mode user-driven device changes belong to.
    pub fn set_active_mode(&self, mode: DisplayMode) {
        self.state().active_mode = mode;
    }

    pub fn active_mode(&self) -> DisplayMode {
        self.state().active_mode
    }

    /// Notifications still expected from our last programmatic change.
    pub fn suppression_remaining(&self) -> u8 {
        self.state().guard.remaining()
    }

    /// Make the saved device for `mode` the default output, falling back to
    /// learning the current default.
    ///
    /// Blocks for the device wait, retries and learn delay; call it off the
    /// UI thread.
    pub fn route_for_mode(&self, mode: DisplayMode) -> RouteOutcome {
        if let Some(target) = self.settings.device_for(mode) {
            let timeout = self.timings.timeout_for(mode);

            if self.wait_for_device(&target, timeout) {
                for attempt in 1..=self.timings.retry_attempts {
                    match self.set_default_by_name(&target) {
                        Ok(device) => {
                            info!(mode = %mode, device = %device, "Routed audio");
                            return RouteOutcome::Routed { device };
                        }
                        Err(e) => {
                            warn!(attempt, device = %target, error = %e, "Failed to set default audio device");
                        }
                    }
                    if attempt < self.timings.retry_attempts {
                        thread::sleep(self.timings.retry_backoff);
                    }
                }
            } else {
                debug!(device = %target, ?timeout, "Audio device did not appear");
            }
        }

        self.learn_default(mode)
    }

    /// Poll active render endpoints until `name` shows up or `timeout` passes.
    pub fn wait_for_device(&self, name: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.is_device_active(name) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.timings.poll_interval);
        }
    }

    fn is_device_active(&self, name: &str) -> bool {
        match self.endpoints.render_devices(false) {
            Ok(devices) => devices.iter().any(|d| names_match(name, &d.name)),
            Err(e) => {
                debug!(error = %e, "Failed to enumerate render devices");
                false
            }
        }
    }

    /// Set the device matching `name` as default for all roles.
    ///
    /// Returns the live name of the device that was set.
    pub fn set_default_by_name(&self, name: &str) -> Result<String, AudioError> {
        let devices = self.endpoints.render_devices(true)?;
        let device = find_device(&devices, name).ok_or_else(|| AudioError::DeviceNotFound {
            name: name.to_string(),
        })?;

        // Windows fires no callbacks when the device is already the default
        let already_default = self
            .endpoints
            .default_render_device_name()
            .is_some_and(|current| current.eq_ignore_ascii_case(&device.name));
        if already_default {
            self.state().guard.disarm();
        } else {
            self.state().guard.arm(&device.name);
        }

        for role in DeviceRole::ALL {
            if let Err(e) = self.policy.set_default_endpoint(&device.id, role) {
                self.state().guard.disarm();
                return Err(e);
            }
        }

        Ok(device.name.clone())
    }

    /// Wait for Windows to settle on a default, then save it for `mode`.
    pub fn learn_default(&self, mode: DisplayMode) -> RouteOutcome {
        thread::sleep(self.timings.learn_delay);

        let Some(device) = self
            .endpoints
            .default_render_device_name()
            .filter(|name| !name.is_empty())
        else {
            warn!(mode = %mode, "No default audio device to learn");
            return RouteOutcome::Unresolved;
        };

        if let Err(e) = self.settings.set_device_for(mode, &device) {
            warn!(error = %e, "Failed to save learned audio device");
        }
        info!(mode = %mode, device = %device, "Learned audio device");
        RouteOutcome::Learned { device }
    }

    /// Handle a default render device change reported by Windows.
    ///
    /// Callbacks are delivered one at a time by the listener thread.
    pub fn on_default_device_changed(&self, name: &str) -> NotificationOutcome {
        if name.is_empty() {
            return NotificationOutcome::Ignored;
        }

        let mode = {
            let mut state = self.state();
            if state.guard.absorb(name) {
                debug!(device = %name, remaining = state.guard.remaining(), "Suppressed own default change");
                return NotificationOutcome::Suppressed;
            }
            state.active_mode
        };

        if let Err(e) = self.settings.set_device_for(mode, name) {
            warn!(error = %e, "Failed to save audio device");
        }
        info!(mode = %mode, device = %name, "Learned manual audio change");
        NotificationOutcome::Learned {
            mode,
            device: name.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{MemoryProfile, Settings};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scriptable render endpoints.
    #[derive(Default)]
    pub(crate) struct FakeEndpoints {
        pub active: Mutex<Vec<RenderDevice>>,
        pub disabled: Vec<RenderDevice>,
        pub default_name: Mutex<Option<String>>,
        /// Number of polls before `active` becomes visible
        pub appear_after_polls: usize,
        pub polls: AtomicUsize,
    }

    impl FakeEndpoints {
        pub(crate) fn with_active(devices: Vec<RenderDevice>) -> Self {
            Self {
                active: Mutex::new(devices),
                ..Default::default()
            }
        }

        pub(crate) fn set_default(&self, name: &str) {
            *self.default_name.lock().unwrap() = Some(name.to_string());
        }
    }

    impl AudioEndpoints for FakeEndpoints {
        fn render_devices(&self, include_disabled: bool) -> Result<Vec<RenderDevice>, AudioError> {
            let polls = self.polls.fetch_add(1, Ordering::SeqCst);
            let mut devices = if polls >= self.appear_after_polls {
                self.active.lock().unwrap().clone()
            } else {
                Vec::new()
            };
            if include_disabled {
                devices.extend(self.disabled.iter().cloned());
            }
            Ok(devices)
        }

        fn default_render_device_name(&self) -> Option<String> {
            self.default_name.lock().unwrap().clone()
        }

        fn device_name(&self, device_id: &str) -> Option<String> {
            self.active
                .lock()
                .unwrap()
                .iter()
                .chain(self.disabled.iter())
                .find(|d| d.id == device_id)
                .map(|d| d.name.clone())
        }
    }

    /// Records default-endpoint writes; fails the first `fail_times` calls.
    #[derive(Default)]
    pub(crate) struct FakePolicy {
        pub calls: Mutex<Vec<(String, DeviceRole)>>,
        pub fail_times: AtomicUsize,
    }

    impl FakePolicy {
        pub(crate) fn failing(times: usize) -> Self {
            Self {
                fail_times: AtomicUsize::new(times),
                ..Default::default()
            }
        }
    }

    impl EndpointPolicy for FakePolicy {
        fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> Result<(), AudioError> {
            let remaining = self.fail_times.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_times.store(remaining - 1, Ordering::SeqCst);
                return Err(AudioError::RoleRejected {
                    device_id: device_id.to_string(),
                    role,
                });
            }
            self.calls.lock().unwrap().push((device_id.to_string(), role));
            Ok(())
        }
    }

    pub(crate) fn quick_timings() -> RouterTimings {
        RouterTimings {
            poll_interval: Duration::from_millis(1),
            primary_timeout: Duration::from_millis(20),
            secondary_timeout: Duration::from_millis(40),
            retry_attempts: 3,
            retry_backoff: Duration::from_millis(1),
            learn_delay: Duration::from_millis(1),
        }
    }

    fn settings_with(primary: &str, secondary: &str) -> (SharedSettings, MemoryProfile) {
        let store = MemoryProfile::new();
        let mut settings = Settings::default();
        settings.primary_device = primary.to_string();
        settings.secondary_device = secondary.to_string();
        (SharedSettings::with_settings(settings, Box::new(store.clone())), store)
    }

    fn router(
        endpoints: FakeEndpoints,
        policy: FakePolicy,
        settings: SharedSettings,
    ) -> AudioEndpointRouter<FakeEndpoints, FakePolicy> {
        AudioEndpointRouter::new(endpoints, policy, settings, quick_timings(), DisplayMode::Primary)
    }

    #[test]
    fn routes_saved_device_for_every_role() {
        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{spk}", "Speakers (Realtek)"),
            RenderDevice::new("{tv}", "LG TV (NVIDIA High Definition Audio)"),
        ]);
        let (settings, _) = settings_with("Speakers", "LG TV");
        let router = router(endpoints, FakePolicy::default(), settings);

        let outcome = router.route_for_mode(DisplayMode::Secondary);

        assert_eq!(
            outcome,
            RouteOutcome::Routed {
                device: "LG TV (NVIDIA High Definition Audio)".to_string()
            }
        );
        let calls = router.policy.calls.lock().unwrap();
        assert_eq!(
            *calls,
            DeviceRole::ALL
                .iter()
                .map(|r| ("{tv}".to_string(), *r))
                .collect::<Vec<_>>()
        );
        assert_eq!(router.suppression_remaining(), 3);
    }

    #[test]
    fn waits_for_slow_device_to_appear() {
        let mut endpoints = FakeEndpoints::with_active(vec![RenderDevice::new("{tv}", "LG TV")]);
        endpoints.appear_after_polls = 5;
        let (settings, _) = settings_with("", "LG TV");
        let router = router(endpoints, FakePolicy::default(), settings);

        assert!(router.route_for_mode(DisplayMode::Secondary).routed());
    }

    #[test]
    fn missing_device_learns_current_default() {
        let endpoints = FakeEndpoints::with_active(vec![RenderDevice::new("{hp}", "Headphones")]);
        endpoints.set_default("Headphones");
        let (settings, store) = settings_with("Speakers", "");
        let router = router(endpoints, FakePolicy::default(), settings.clone());

        let outcome = router.route_for_mode(DisplayMode::Primary);

        assert_eq!(outcome, RouteOutcome::Learned { device: "Headphones".to_string() });
        assert_eq!(settings.device_for(DisplayMode::Primary).as_deref(), Some("Headphones"));
        assert_eq!(store.get("Audio", "Primary").as_deref(), Some("Headphones"));
        assert!(router.policy.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn exhausted_retries_fall_back_to_learning() {
        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{tv}", "LG TV"),
            RenderDevice::new("{spk}", "Speakers"),
        ]);
        endpoints.set_default("Speakers");
        let (settings, _) = settings_with("", "LG TV");
        // Console fails on each of the three attempts.
        let router = router(endpoints, FakePolicy::failing(3), settings.clone());

        let outcome = router.route_for_mode(DisplayMode::Secondary);

        assert_eq!(outcome, RouteOutcome::Learned { device: "Speakers".to_string() });
        assert_eq!(settings.device_for(DisplayMode::Secondary).as_deref(), Some("Speakers"));
    }

    #[test]
    fn retry_succeeds_after_transient_failure() {
        let endpoints = FakeEndpoints::with_active(vec![RenderDevice::new("{tv}", "LG TV")]);
        let (settings, _) = settings_with("", "LG TV");
        let router = router(endpoints, FakePolicy::failing(2), settings);

        assert!(router.route_for_mode(DisplayMode::Secondary).routed());
        assert_eq!(router.policy.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn no_saved_device_learns_immediately() {
        let endpoints = FakeEndpoints::default();
        endpoints.set_default("Speakers");
        let (settings, _) = settings_with("", "");
        let router = router(endpoints, FakePolicy::default(), settings.clone());

        assert_eq!(
            router.route_for_mode(DisplayMode::Primary),
            RouteOutcome::Learned { device: "Speakers".to_string() }
        );
    }

    #[test]
    fn learning_never_saves_an_empty_name() {
        let endpoints = FakeEndpoints::default();
        endpoints.set_default("");
        let (settings, store) = settings_with("Speakers", "");
        let router = router(endpoints, FakePolicy::default(), settings.clone());

        assert_eq!(router.route_for_mode(DisplayMode::Primary), RouteOutcome::Unresolved);
        assert_eq!(settings.device_for(DisplayMode::Primary).as_deref(), Some("Speakers"));
        assert_eq!(store.get("Audio", "Primary"), None);
    }

    #[test]
    fn own_notifications_are_suppressed_then_fourth_is_learned() {
        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{spk}", "Speakers"),
            RenderDevice::new("{hp}", "Headphones"),
        ]);
        let (settings, store) = settings_with("Speakers", "");
        let router = router(endpoints, FakePolicy::default(), settings.clone());

        router.set_default_by_name("Speakers").unwrap();
        assert_eq!(router.suppression_remaining(), 3);

        for _ in 0..3 {
            assert_eq!(router.on_default_device_changed("Speakers"), NotificationOutcome::Suppressed);
        }
        assert_eq!(router.suppression_remaining(), 0);
        assert_eq!(store.get("Audio", "Primary"), None);

        assert_eq!(
            router.on_default_device_changed("Headphones"),
            NotificationOutcome::Learned {
                mode: DisplayMode::Primary,
                device: "Headphones".to_string()
            }
        );
        assert_eq!(settings.device_for(DisplayMode::Primary).as_deref(), Some("Headphones"));
    }

    #[test]
    fn concurrent_user_change_while_armed_is_learned_for_active_mode() {
        let endpoints = FakeEndpoints::with_active(vec![RenderDevice::new("{tv}", "LG TV")]);
        let (settings, _) = settings_with("", "LG TV");
        let router = router(endpoints, FakePolicy::default(), settings.clone());
        router.set_active_mode(DisplayMode::Secondary);

        router.set_default_by_name("LG TV").unwrap();
        let outcome = router.on_default_device_changed("USB Headset");

        assert!(matches!(outcome, NotificationOutcome::Learned { mode: DisplayMode::Secondary, .. }));
        assert_eq!(router.suppression_remaining(), 3);
        assert_eq!(settings.device_for(DisplayMode::Secondary).as_deref(), Some("USB Headset"));
    }

    #[test]
    fn user_switch_to_overlapping_name_is_learned() {
        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{sscr}", "LG TV SSCR2"),
            RenderDevice::new("{tv}", "LG TV"),
        ]);
        let (settings, _) = settings_with("", "LG TV SSCR2");
        let router = router(endpoints, FakePolicy::default(), settings.clone());
        router.set_active_mode(DisplayMode::Secondary);

        assert!(router.route_for_mode(DisplayMode::Secondary).routed());
        assert_eq!(router.on_default_device_changed("LG TV SSCR2"), NotificationOutcome::Suppressed);

        assert_eq!(
            router.on_default_device_changed("LG TV"),
            NotificationOutcome::Learned {
                mode: DisplayMode::Secondary,
                device: "LG TV".to_string()
            }
        );
        assert_eq!(router.suppression_remaining(), 2);
        assert_eq!(settings.device_for(DisplayMode::Secondary).as_deref(), Some("LG TV"));
    }

    #[test]
    fn failed_role_write_disarms_guard() {
        let endpoints = FakeEndpoints::with_active(vec![RenderDevice::new("{spk}", "Speakers")]);
        let (settings, _) = settings_with("Speakers", "");
        let router = router(endpoints, FakePolicy::failing(1), settings.clone());

        assert!(router.set_default_by_name("Speakers").is_err());
        assert_eq!(router.suppression_remaining(), 0);

        // A later manual switch to that device is a user change
        assert!(matches!(
            router.on_default_device_changed("Speakers"),
            NotificationOutcome::Learned { .. }
        ));
    }

    #[test]
    fn setting_current_default_does_not_arm_guard() {
        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{spk}", "Speakers"),
            RenderDevice::new("{hp}", "Headphones"),
        ]);
        endpoints.set_default("Speakers");
        let (settings, _) = settings_with("Speakers", "");
        let router = router(endpoints, FakePolicy::default(), settings);

        assert_eq!(router.set_default_by_name("Speakers").unwrap(), "Speakers");
        assert_eq!(router.policy.calls.lock().unwrap().len(), 3);
        assert_eq!(router.suppression_remaining(), 0);
    }

    #[test]
    fn disabled_devices_can_be_set_but_are_not_waited_for() {
        let endpoints = FakeEndpoints {
            disabled: vec![RenderDevice::new("{old}", "Old Speakers")],
            ..Default::default()
        };
        let (settings, _) = settings_with("Old Speakers", "");
        let router = router(endpoints, FakePolicy::default(), settings);

        assert!(!router.wait_for_device("Old Speakers", Duration::from_millis(5)));
        assert_eq!(router.set_default_by_name("old speakers").unwrap(), "Old Speakers");
    }

    #[test]
    fn unknown_device_cannot_be_set() {
        let (settings, _) = settings_with("", "");
        let router = router(FakeEndpoints::default(), FakePolicy::default(), settings);

        assert!(matches!(
            router.set_default_by_name("Nope"),
            Err(AudioError::DeviceNotFound { .. })
        ));
        assert_eq!(router.suppression_remaining(), 0);
    }

    #[test]
    fn empty_notification_name_is_ignored() {
        let (settings, _) = settings_with("", "");
        let router = router(FakeEndpoints::default(), FakePolicy::default(), settings);
        assert_eq!(router.on_default_device_changed(""), NotificationOutcome::Ignored);
    }
}

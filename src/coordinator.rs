//! Display+audio mode transitions.
//!
//! A toggle switches the display topology on the calling thread, then hands
//! the slow parts to two background branches: one settles the display and
//! applies the best refresh rate for the new mode, the other routes audio to
//! the mode's saved device. Results come back through [`UiDispatch`].
//!
//! Overlapping toggles are not queued or cancelled. Each sequence delivers its
//! own status, so the last one to finish wins.

use crate::audio::{AudioEndpointRouter, AudioEndpoints, EndpointPolicy, RouteOutcome};
use crate::config::SharedSettings;
use crate::display::{
    DisplayError, DisplayMode, DisplayModeSource, DisplaySwitcher, ModeEnumerator, TopologySwitch,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Steps of one toggle sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Switching,
    SettlingDisplay,
    ApplyingRate,
    SettlingRate,
    Done,
}

/// Delays between transition steps.
#[derive(Debug, Clone)]
pub struct TransitionTimings {
    /// Wait after a topology switch before touching display modes
    pub display_settle: Duration,
    /// Wait after applying a mode before reading the frequency back
    pub rate_settle: Duration,
    /// Wait after an OS display-change notification before reading back
    pub resync_delay: Duration,
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            display_settle: Duration::from_secs(3),
            rate_settle: Duration::from_secs(1),
            resync_delay: Duration::from_millis(500),
        }
    }
}

/// What the tray shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStatus {
    pub mode: DisplayMode,
    /// Current refresh rate, 0 when unknown
    pub hz: u32,
}

/// Message from a background sequence to the interactive thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    Status(DisplayStatus),
    /// A failure the user must see
    Failure(String),
    /// The set of audio endpoints changed
    DevicesChanged,
}

/// Delivers updates to the interactive thread.
///
/// Implementations must not touch UI objects directly; they queue the update
/// and wake the thread that owns the UI.
pub trait UiDispatch: Send + Sync {
    fn dispatch(&self, update: UiUpdate);
}

/// Background work started by [`ModeTransitionCoordinator::toggle`].
pub struct TransitionHandle {
    phase: Arc<Mutex<TransitionPhase>>,
    branches: Vec<JoinHandle<()>>,
}

impl TransitionHandle {
    /// Last phase reached by the rate branch.
    pub fn phase(&self) -> TransitionPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for both branches to finish.
    pub fn join(self) -> TransitionPhase {
        for branch in self.branches {
            let _ = branch.join();
        }
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn enter(phase: &Mutex<TransitionPhase>, next: TransitionPhase, mode: DisplayMode) {
    debug!(?next, %mode, "Transition phase");
    *phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

/// Run `work` on a named thread, logging panics instead of propagating them.
fn spawn_sequence<F>(name: &str, work: F) -> Option<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let label = name.to_string();
    let spawned = thread::Builder::new().name(label.clone()).spawn(move || {
        if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
            error!(sequence = %label, "Background sequence panicked");
        }
    });

    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(sequence = name, error = %e, "Failed to start background sequence");
            None
        }
    }
}

/// Wires the display switcher, mode enumerator and audio router together.
pub struct ModeTransitionCoordinator<S, T, E, P> {
    switcher: DisplaySwitcher<T>,
    modes: Arc<ModeEnumerator<S>>,
    router: Arc<AudioEndpointRouter<E, P>>,
    settings: SharedSettings,
    ui: Arc<dyn UiDispatch>,
    timings: TransitionTimings,
}

impl<S, T, E, P> ModeTransitionCoordinator<S, T, E, P>
where
    S: DisplayModeSource + 'static,
    T: TopologySwitch,
    E: AudioEndpoints + 'static,
    P: EndpointPolicy + 'static,
{
    pub fn new(
        switcher: DisplaySwitcher<T>,
        modes: Arc<ModeEnumerator<S>>,
        router: Arc<AudioEndpointRouter<E, P>>,
        settings: SharedSettings,
        ui: Arc<dyn UiDispatch>,
        timings: TransitionTimings,
    ) -> Self {
        router.set_active_mode(switcher.current_mode());
        Self {
            switcher,
            modes,
            router,
            settings,
            ui,
            timings,
        }
    }

    pub fn current_mode(&self) -> DisplayMode {
        self.switcher.current_mode()
    }

    pub fn router(&self) -> &Arc<AudioEndpointRouter<E, P>> {
        &self.router
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Current status read straight from the OS.
    pub fn status(&self) -> DisplayStatus {
        DisplayStatus {
            mode: self.switcher.current_mode(),
            hz: self.modes.current_refresh_rate(None),
        }
    }

    /// Switch display topology and start the rate and audio branches.
    ///
    /// A failed switch is reported and leaves every piece of state as it was.
    pub fn toggle(&mut self) -> Result<TransitionHandle, DisplayError> {
        let phase = Arc::new(Mutex::new(TransitionPhase::Idle));
        enter(&phase, TransitionPhase::Switching, self.switcher.current_mode());

        let mode = match self.switcher.toggle() {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "Display switch failed");
                enter(&phase, TransitionPhase::Done, self.switcher.current_mode());
                self.ui.dispatch(UiUpdate::Failure(e.to_string()));
                return Err(e);
            }
        };

        info!(%mode, "Display switched");
        self.router.set_active_mode(mode);
        enter(&phase, TransitionPhase::SettlingDisplay, mode);

        let mut branches = Vec::with_capacity(2);

        let ceiling = self.settings.ceiling_for(mode);
        let modes = Arc::clone(&self.modes);
        let ui = Arc::clone(&self.ui);
        let rate_phase = Arc::clone(&phase);
        let timings = self.timings.clone();
        branches.extend(spawn_sequence("refresh-rate", move || {
            thread::sleep(timings.display_settle);

            enter(&rate_phase, TransitionPhase::ApplyingRate, mode);
            match modes.apply_max_refresh_rate(None, ceiling) {
                Ok(Some(applied)) => info!(%applied, "Applied refresh rate"),
                Ok(None) => debug!(%mode, "No display mode under the ceiling"),
                Err(e) => {
                    warn!(error = %e, "Failed to apply refresh rate");
                    ui.dispatch(UiUpdate::Failure(e.to_string()));
                }
            }

            enter(&rate_phase, TransitionPhase::SettlingRate, mode);
            thread::sleep(timings.rate_settle);

            let hz = modes.current_refresh_rate(None);
            ui.dispatch(UiUpdate::Status(DisplayStatus { mode, hz }));
            enter(&rate_phase, TransitionPhase::Done, mode);
        }));

        let router = Arc::clone(&self.router);
        branches.extend(spawn_sequence("audio-route", move || {
            match router.route_for_mode(mode) {
                RouteOutcome::Routed { device } => info!(%mode, %device, "Audio routed"),
                RouteOutcome::Learned { device } => info!(%mode, %device, "Audio device learned"),
                RouteOutcome::Unresolved => warn!(%mode, "No audio device for mode"),
            }
        }));

        Ok(TransitionHandle { phase, branches })
    }

    /// Apply the best mode for the current display mode's ceiling.
    ///
    /// Runs on the calling thread. Returns the read-back refresh rate, or
    /// `None` when no mode fits.
    pub fn set_max_rate(&self) -> Result<Option<u32>, DisplayError> {
        let mode = self.switcher.current_mode();
        let ceiling = self.settings.ceiling_for(mode);

        match self.modes.apply_max_refresh_rate(None, ceiling) {
            Ok(Some(applied)) => {
                info!(%applied, "Applied max refresh rate");
                let hz = self.modes.current_refresh_rate(None);
                self.ui.dispatch(UiUpdate::Status(DisplayStatus { mode, hz }));
                Ok(Some(hz))
            }
            Ok(None) => {
                debug!(%mode, ?ceiling, "No display mode under the ceiling");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply max refresh rate");
                self.ui.dispatch(UiUpdate::Failure(e.to_string()));
                Err(e)
            }
        }
    }

    /// React to an OS display-settings change by reading the rate back.
    ///
    /// Only reads; no mode is applied and no audio is routed.
    pub fn on_display_changed(&self) -> Option<JoinHandle<()>> {
        let mode = self.switcher.current_mode();
        let modes = Arc::clone(&self.modes);
        let ui = Arc::clone(&self.ui);
        let delay = self.timings.resync_delay;

        spawn_sequence("display-resync", move || {
            thread::sleep(delay);
            let hz = modes.current_refresh_rate(None);
            debug!(%mode, hz, "Display settings changed");
            ui.dispatch(UiUpdate::Status(DisplayStatus { mode, hz }));
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::router::tests::{quick_timings, FakeEndpoints, FakePolicy};
    use crate::audio::RenderDevice;
    use crate::config::MemoryProfile;
    use crate::display::enumerator::tests::FakeDisplay;
    use crate::display::switcher::tests::ScriptedSwitch;
    use crate::display::ModeDescriptor;

    #[derive(Default)]
    pub(crate) struct RecordingUi {
        pub(crate) updates: Mutex<Vec<UiUpdate>>,
    }

    impl RecordingUi {
        pub(crate) fn updates(&self) -> Vec<UiUpdate> {
            self.updates.lock().unwrap().clone()
        }
    }

    impl UiDispatch for RecordingUi {
        fn dispatch(&self, update: UiUpdate) {
            self.updates.lock().unwrap().push(update);
        }
    }

    fn quick_transitions() -> TransitionTimings {
        TransitionTimings {
            display_settle: Duration::from_millis(5),
            rate_settle: Duration::from_millis(5),
            resync_delay: Duration::from_millis(5),
        }
    }

    struct Rig {
        coordinator: ModeTransitionCoordinator<FakeDisplay, ScriptedSwitch, FakeEndpoints, FakePolicy>,
        ui: Arc<RecordingUi>,
    }

    fn rig(switch_results: Vec<isize>) -> Rig {
        rig_with_display(switch_results, false)
    }

    fn rig_with_display(switch_results: Vec<isize>, reject_apply: bool) -> Rig {
        let mut display = FakeDisplay::new(
            ModeDescriptor::new(1920, 1080, 60),
            vec![
                ModeDescriptor::new(1920, 1080, 60),
                ModeDescriptor::new(1920, 1080, 120),
                ModeDescriptor::new(1920, 1080, 144),
                ModeDescriptor::new(1280, 720, 240),
            ],
        );
        display.reject_apply = reject_apply;
        let profile = MemoryProfile::new();
        profile.set("Audio", "Primary", "Speakers");
        profile.set("Audio", "Secondary", "LG TV");
        let settings = SharedSettings::load(Box::new(profile.clone()));

        let endpoints = FakeEndpoints::with_active(vec![
            RenderDevice::new("{spk}", "Speakers"),
            RenderDevice::new("{tv}", "LG TV (NVIDIA High Definition Audio)"),
        ]);
        let router = Arc::new(AudioEndpointRouter::new(
            endpoints,
            FakePolicy::default(),
            settings.clone(),
            quick_timings(),
            DisplayMode::Primary,
        ));

        let ui = Arc::new(RecordingUi::default());
        let coordinator = ModeTransitionCoordinator::new(
            DisplaySwitcher::new(ScriptedSwitch::new(switch_results)),
            Arc::new(ModeEnumerator::new(display)),
            router,
            settings,
            ui.clone(),
            quick_transitions(),
        );

        Rig { coordinator, ui }
    }

    #[test_log::test]
    fn toggle_applies_external_ceiling_and_routes_audio() {
        let mut rig = rig(vec![42]);

        let handle = rig.coordinator.toggle().unwrap();
        assert_eq!(handle.join(), TransitionPhase::Done);

        assert_eq!(rig.coordinator.current_mode(), DisplayMode::Secondary);
        assert_eq!(rig.coordinator.router().active_mode(), DisplayMode::Secondary);
        assert_eq!(
            rig.ui.updates(),
            vec![UiUpdate::Status(DisplayStatus {
                mode: DisplayMode::Secondary,
                hz: 120,
            })]
        );

        let calls = rig.coordinator.router().policy().calls.lock().unwrap().clone();
        assert!(calls.iter().all(|(id, _)| id == "{tv}"));
        assert_eq!(calls.len(), 3);
    }

    #[test_log::test]
    fn rejected_rate_reports_failure_then_reads_back() {
        let mut rig = rig_with_display(vec![42], true);

        let handle = rig.coordinator.toggle().unwrap();
        assert_eq!(handle.join(), TransitionPhase::Done);

        let updates = rig.ui.updates();
        assert!(matches!(
            updates.as_slice(),
            [
                UiUpdate::Failure(_),
                UiUpdate::Status(DisplayStatus {
                    mode: DisplayMode::Secondary,
                    hz: 60,
                })
            ]
        ));
        // Audio still follows the display
        assert_eq!(rig.coordinator.router().policy().calls.lock().unwrap().len(), 3);
    }

    #[test_log::test]
    fn panicking_sequence_is_contained() {
        let ui = Arc::new(RecordingUi::default());
        let sequence_ui = Arc::clone(&ui);
        let display_gone = true;

        let handle = spawn_sequence("panicking", move || {
            if display_gone {
                panic!("display disappeared mid-sequence");
            }
            sequence_ui.dispatch(UiUpdate::DevicesChanged);
        })
        .unwrap();

        assert!(handle.join().is_ok());
        assert!(ui.updates().is_empty());
    }

    #[test_log::test]
    fn failed_switch_reports_and_changes_nothing() {
        let mut rig = rig(vec![2]);

        let err = rig.coordinator.toggle().err().unwrap();
        assert!(matches!(err, DisplayError::SwitchFailed { code: 2 }));
        assert_eq!(rig.coordinator.current_mode(), DisplayMode::Primary);
        assert_eq!(rig.coordinator.router().active_mode(), DisplayMode::Primary);
        assert!(rig.coordinator.router().policy().calls.lock().unwrap().is_empty());
        assert!(matches!(rig.ui.updates().as_slice(), [UiUpdate::Failure(_)]));
    }

    #[test_log::test]
    fn set_max_rate_uses_current_mode_ceiling() {
        let rig = rig(vec![]);

        assert_eq!(rig.coordinator.set_max_rate().unwrap(), Some(144));
        assert_eq!(
            rig.ui.updates(),
            vec![UiUpdate::Status(DisplayStatus {
                mode: DisplayMode::Primary,
                hz: 144,
            })]
        );
    }

    #[test_log::test]
    fn display_change_only_reads_back() {
        let rig = rig(vec![]);

        rig.coordinator.on_display_changed().unwrap().join().unwrap();

        assert_eq!(
            rig.ui.updates(),
            vec![UiUpdate::Status(DisplayStatus {
                mode: DisplayMode::Primary,
                hz: 60,
            })]
        );
        assert!(rig.coordinator.router().policy().calls.lock().unwrap().is_empty());
    }

    #[test_log::test]
    fn status_reads_current_rate() {
        let rig = rig(vec![]);
        assert_eq!(
            rig.coordinator.status(),
            DisplayStatus {
                mode: DisplayMode::Primary,
                hz: 60,
            }
        );
    }
}

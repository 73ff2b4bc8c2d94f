//! Display mode enumeration and refresh-rate selection.
//!
//! Walks every mode the driver reports for a device and picks the fastest
//! refresh rate at the current resolution that stays under a ceiling.

use super::mode::{DisplayError, ModeDescriptor, RefreshCeiling};
use tracing::{debug, info};

/// Access to the OS display-settings API for one machine.
///
/// `device` is a GDI device name such as `\\.\DISPLAY1`; `None` addresses the
/// display the calling thread is on, which is what the tray actions use.
pub trait DisplayModeSource: Send + Sync {
    /// The mode the device is currently driving.
    fn current_mode(&self, device: Option<&str>) -> Result<ModeDescriptor, DisplayError>;

    /// The mode at `index` in the driver's mode list, or `None` past the end.
    fn mode_at(&self, device: Option<&str>, index: u32) -> Option<ModeDescriptor>;

    /// Commit `mode` as the device's current mode. Only the device's own
    /// settings change; position and topology are left alone.
    fn apply_mode(&self, device: Option<&str>, mode: &ModeDescriptor) -> Result<(), DisplayError>;
}

/// Iterator over a device's mode list in driver order.
pub struct Modes<'a, S: ?Sized> {
    source: &'a S,
    device: Option<&'a str>,
    index: u32,
}

impl<S: DisplayModeSource + ?Sized> Iterator for Modes<'_, S> {
    type Item = ModeDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let mode = self.source.mode_at(self.device, self.index)?;
        self.index += 1;
        Some(mode)
    }
}

/// Pick the highest-frequency mode at `target`'s resolution that the ceiling admits.
///
/// Ties keep the first mode in enumeration order. A mode at exactly the
/// configured ceiling beats one that is only admitted by the fractional
/// tolerance.
pub fn select_mode<I>(target: &ModeDescriptor, modes: I, ceiling: RefreshCeiling) -> Option<ModeDescriptor>
where
    I: IntoIterator<Item = ModeDescriptor>,
{
    let mut best: Option<ModeDescriptor> = None;
    let mut exact: Option<ModeDescriptor> = None;

    for mode in modes {
        if !mode.same_resolution(target) || !ceiling.admits(mode.frequency) {
            continue;
        }
        if exact.is_none() && mode.frequency == ceiling.nominal_hz() {
            exact = Some(mode);
        }
        if best.map_or(true, |b| mode.frequency > b.frequency) {
            best = Some(mode);
        }
    }

    match (best, exact) {
        (Some(b), Some(e)) if b.frequency > e.frequency => Some(e),
        _ => best,
    }
}

/// Selects and applies refresh rates through a [`DisplayModeSource`].
pub struct ModeEnumerator<S> {
    source: S,
}

impl<S: DisplayModeSource> ModeEnumerator<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Iterate all modes the driver reports for `device`.
    pub fn modes<'a>(&'a self, device: Option<&'a str>) -> Modes<'a, S> {
        Modes {
            source: &self.source,
            device,
            index: 0,
        }
    }

    /// Find the best mode for the device's current resolution under `ceiling`.
    pub fn select_best_mode(
        &self,
        device: Option<&str>,
        ceiling: RefreshCeiling,
    ) -> Result<Option<ModeDescriptor>, DisplayError> {
        let current = self.source.current_mode(device)?;
        let best = select_mode(&current, self.modes(device), ceiling);

        debug!(
            current = %current,
            ceiling_hz = ceiling.0,
            selected = ?best,
            "Selected display mode"
        );

        Ok(best)
    }

    /// Select the best mode and commit it.
    ///
    /// Returns `Ok(None)` when nothing matches the current resolution; the
    /// refresh rate is left as it is in that case.
    pub fn apply_max_refresh_rate(
        &self,
        device: Option<&str>,
        ceiling: RefreshCeiling,
    ) -> Result<Option<ModeDescriptor>, DisplayError> {
        let Some(best) = self.select_best_mode(device, ceiling)? else {
            debug!(ceiling_hz = ceiling.0, "No display mode matches current resolution");
            return Ok(None);
        };

        self.source.apply_mode(device, &best)?;
        info!(mode = %best, "Applied refresh rate");
        Ok(Some(best))
    }

    /// Current refresh rate in Hz, or 0 if it cannot be read.
    pub fn current_refresh_rate(&self, device: Option<&str>) -> u32 {
        self.source
            .current_mode(device)
            .map(|m| m.frequency)
            .unwrap_or(0)
    }
}

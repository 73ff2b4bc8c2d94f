//! Suppression of self-inflicted default-device notifications.
//!
//! Setting a default endpoint for all three roles fires three
//! `OnDefaultDeviceChanged` callbacks. The guard is armed before the
//! programmatic change and absorbs callbacks naming the device that was set.

/// Counts outstanding notifications expected from our own default-device writes.
#[derive(Debug, Default)]
pub struct SuppressionGuard {
    remaining: u8,
    expected_name: String,
}

impl SuppressionGuard {
    /// One notification per endpoint role.
    pub const NOTIFICATIONS_PER_CHANGE: u8 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the notifications caused by setting `name` as default.
    ///
    /// `name` must be the live friendly name of the device that was set;
    /// notifications are compared against it exactly, ignoring case.
    pub fn arm(&mut self, name: &str) {
        self.remaining = Self::NOTIFICATIONS_PER_CHANGE;
        self.expected_name = name.to_string();
    }

    /// Returns true if the notification was caused by our own write and
    /// should be ignored. Anything else is a user change.
    pub fn absorb(&mut self, name: &str) -> bool {
        if self.remaining == 0 || !self.expected_name.eq_ignore_ascii_case(name) {
            return false;
        }
        self.remaining -= 1;
        true
    }

    /// Stop expecting notifications.
    pub fn disarm(&mut self) {
        self.remaining = 0;
        self.expected_name.clear();
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }

    pub fn is_armed(&self) -> bool {
        self.remaining > 0
    }
}

//! Audio device data models.
//!
//! Defines the render endpoint representation, endpoint roles,
//! notification events and audio error types.

use thiserror::Error;

/// An active audio render endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderDevice {
    /// Unique Windows device ID (opaque string from IMMDevice::GetId)
    pub id: String,

    /// Human-readable device name (from device properties)
    pub name: String,
}

impl RenderDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Audio device role (maps to Windows ERole enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DeviceRole {
    /// Used by games, system sounds, most general applications
    Console = 0,

    /// Used by music players, video players
    Multimedia = 1,

    /// Used by Teams, Zoom, Discord, and other VoIP applications
    Communications = 2,
}

impl DeviceRole {
    pub const ALL: [DeviceRole; 3] = [
        DeviceRole::Console,
        DeviceRole::Multimedia,
        DeviceRole::Communications,
    ];
}

/// Render endpoint notifications from the Windows audio system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointEvent {
    /// Default render device changed for a specific role
    DefaultDeviceChanged {
        role: DeviceRole,
        device_id: Option<String>, // None if no default device
    },

    /// A device was added, removed, or changed state
    DevicesChanged,
}

/// Audio service error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("No default device available")]
    NoDefaultDevice,

    #[cfg(windows)]
    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(#[source] windows::core::Error),

    #[cfg(windows)]
    #[error("Failed to set default device: {0}")]
    SetDefaultFailed(#[source] windows::core::Error),

    #[error("Failed to set {role:?} default for {device_id}")]
    RoleRejected { device_id: String, role: DeviceRole },

    #[error("String conversion error: {0}")]
    StringConversion(String),
}

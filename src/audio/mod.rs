//! Audio module for default render endpoint routing.
//!
//! This module provides endpoint enumeration, default-device assignment,
//! device notifications, and the router that follows display switches.

pub mod device;
pub mod listener;
pub mod matching;
pub mod router;
pub mod suppression;

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod notifications;
#[cfg(windows)]
pub mod policy;

pub use device::{AudioError, DeviceRole, EndpointEvent, RenderDevice};
pub use listener::spawn_listener;
pub use router::{
    AudioEndpointRouter, AudioEndpoints, EndpointPolicy, NotificationOutcome, RouteOutcome,
    RouterTimings,
};
pub use suppression::SuppressionGuard;

#[cfg(windows)]
pub use enumerator::{ComGuard, MmDeviceEndpoints};
#[cfg(windows)]
pub use notifications::NotificationRegistration;
#[cfg(windows)]
pub use policy::PolicyConfig;

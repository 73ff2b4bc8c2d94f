//! Single-consumer delivery of endpoint notifications.
//!
//! COM delivers `IMMNotificationClient` callbacks on arbitrary threads. The
//! callbacks only forward events into a channel; this thread drains it, so
//! the router sees one notification at a time.

use super::device::EndpointEvent;
use super::router::{AudioEndpointRouter, AudioEndpoints, EndpointPolicy, NotificationOutcome};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Spawn the listener. It exits when every sender for `events` is dropped.
///
/// `on_devices_changed` runs on the listener thread whenever the set of
/// endpoints changes; use it to post a refresh to the UI thread.
pub fn spawn_listener<E, P, F>(
    router: Arc<AudioEndpointRouter<E, P>>,
    events: Receiver<EndpointEvent>,
    on_devices_changed: F,
) -> std::io::Result<JoinHandle<()>>
where
    E: AudioEndpoints + 'static,
    P: EndpointPolicy + 'static,
    F: Fn() + Send + 'static,
{
    thread::Builder::new()
        .name("audio-endpoint-listener".to_string())
        .spawn(move || {
            for event in events {
                let handled = panic::catch_unwind(AssertUnwindSafe(|| {
                    handle_event(&*router, event, &on_devices_changed)
                }));
                if handled.is_err() {
                    error!("Panic while handling audio endpoint notification");
                }
            }
            debug!("Audio endpoint listener stopped");
        })
}

/// Handle one notification. Returns the router's verdict for default-device changes.
pub fn handle_event<E, P, F>(
    router: &AudioEndpointRouter<E, P>,
    event: EndpointEvent,
    on_devices_changed: &F,
) -> Option<NotificationOutcome>
where
    E: AudioEndpoints,
    P: EndpointPolicy,
    F: Fn(),
{
    match event {
        EndpointEvent::DefaultDeviceChanged {
            role,
            device_id: Some(id),
        } => {
            let name = router.endpoints().device_name(&id)?;
            debug!(?role, device = %name, "Default render device changed");
            Some(router.on_default_device_changed(&name))
        }
        EndpointEvent::DefaultDeviceChanged { device_id: None, .. } => None,
        EndpointEvent::DevicesChanged => {
            on_devices_changed();
            None
        }
    }
}

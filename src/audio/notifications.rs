//! Device change notifications using IMMNotificationClient.
//!
//! Forwards render-endpoint default changes and topology changes to a
//! channel drained by the listener thread.

use super::device::{AudioError, DeviceRole, EndpointEvent};
use super::enumerator::ComGuard;
use std::sync::mpsc::Sender;
use windows::core::{implement, PCWSTR};
use windows::Win32::Media::Audio::{
    eCommunications, eConsole, eRender, EDataFlow, ERole, IMMDeviceEnumerator,
    IMMNotificationClient, IMMNotificationClient_Impl, MMDeviceEnumerator, DEVICE_STATE,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_ALL};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;
// Re-export windows_core so the implement macro can find it
#[allow(unused_imports)]
use windows_core;

/// Notification client that sends events to a channel.
#[implement(IMMNotificationClient)]
pub struct DeviceNotificationClient {
    sender: Sender<EndpointEvent>,
}

impl DeviceNotificationClient {
    pub fn new(sender: Sender<EndpointEvent>) -> Self {
        Self { sender }
    }

    fn convert_role(role: ERole) -> DeviceRole {
        if role == eConsole {
            DeviceRole::Console
        } else if role == eCommunications {
            DeviceRole::Communications
        } else {
            DeviceRole::Multimedia
        }
    }

    fn send(&self, event: EndpointEvent) {
        let _ = self.sender.send(event);
    }
}

impl IMMNotificationClient_Impl for DeviceNotificationClient_Impl {
    fn OnDeviceStateChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        self.send(EndpointEvent::DevicesChanged);
        Ok(())
    }

    fn OnDeviceAdded(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.send(EndpointEvent::DevicesChanged);
        Ok(())
    }

    fn OnDeviceRemoved(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        self.send(EndpointEvent::DevicesChanged);
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        // Only care about render devices
        if flow != eRender {
            return Ok(());
        }

        unsafe {
            let device_id = if pwstrdefaultdeviceid.is_null() {
                None
            } else {
                pwstrdefaultdeviceid.to_string().ok()
            };

            self.send(EndpointEvent::DefaultDeviceChanged {
                role: DeviceNotificationClient::convert_role(role),
                device_id,
            });
        }
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        Ok(())
    }
}

/// Keeps a notification client registered for as long as it lives.
pub struct NotificationRegistration {
    enumerator: IMMDeviceEnumerator,
    client: IMMNotificationClient,
    _com: ComGuard,
}

impl NotificationRegistration {
    /// Register a client that forwards events to `sender`.
    ///
    /// COM must stay initialized on the registering thread, so the guard is
    /// held until the registration is dropped.
    pub fn register(sender: Sender<EndpointEvent>) -> Result<Self, AudioError> {
        let com = ComGuard::new()?;

        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(AudioError::EnumerationFailed)?;

            let client: IMMNotificationClient = DeviceNotificationClient::new(sender).into();
            enumerator
                .RegisterEndpointNotificationCallback(&client)
                .map_err(AudioError::EnumerationFailed)?;

            Ok(Self {
                enumerator,
                client,
                _com: com,
            })
        }
    }
}

impl Drop for NotificationRegistration {
    fn drop(&mut self) {
        unsafe {
            let _ = self
                .enumerator
                .UnregisterEndpointNotificationCallback(&self.client);
        }
    }
}

//! Render endpoint enumeration using Windows MMDevice API.
//!
//! Every query creates its own enumerator and releases it on return, so the
//! type can be used from any thread.

use super::device::{AudioError, RenderDevice};
use super::router::AudioEndpoints;
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::Media::Audio::{
    eConsole, eRender, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE,
    DEVICE_STATE_ACTIVE, DEVICE_STATE_DISABLED,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;

/// COM initialization guard that uninitializes COM on drop.
///
/// If the thread already runs COM in another apartment model the existing
/// initialization is used and nothing is undone on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { initialized: false });
        }
        hr.ok().map_err(AudioError::ComInitFailed)?;
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Render endpoints via `IMMDeviceEnumerator`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MmDeviceEndpoints;

impl MmDeviceEndpoints {
    pub fn new() -> Self {
        Self
    }

    /// Run `f` with COM initialized and a fresh device enumerator.
    fn with_enumerator<T>(
        &self,
        f: impl FnOnce(&IMMDeviceEnumerator) -> Result<T, AudioError>,
    ) -> Result<T, AudioError> {
        let _com = ComGuard::new()?;
        let enumerator: IMMDeviceEnumerator = unsafe {
            CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(AudioError::EnumerationFailed)?
        };
        f(&enumerator)
    }
}

/// Get the friendly name of a device from its property store.
pub fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let props = device.OpenPropertyStore(STGM(0)).ok()?; // STGM_READ = 0

        // Convert DEVPROPKEY to PROPERTYKEY
        let key = PROPERTYKEY {
            fmtid: DEVPKEY_Device_FriendlyName.fmtid,
            pid: DEVPKEY_Device_FriendlyName.pid,
        };

        let prop = props.GetValue(&key).ok()?;
        let name = prop.to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

fn device_id(device: &IMMDevice) -> Result<String, AudioError> {
    unsafe {
        let id = device.GetId().map_err(AudioError::EnumerationFailed)?;
        let id_string = id
            .to_string()
            .map_err(|e| AudioError::StringConversion(e.to_string()));
        CoTaskMemFree(Some(id.0 as *const _));
        id_string
    }
}

impl AudioEndpoints for MmDeviceEndpoints {
    fn render_devices(&self, include_disabled: bool) -> Result<Vec<RenderDevice>, AudioError> {
        let mask = if include_disabled {
            DEVICE_STATE(DEVICE_STATE_ACTIVE.0 | DEVICE_STATE_DISABLED.0)
        } else {
            DEVICE_STATE_ACTIVE
        };

        self.with_enumerator(|enumerator| unsafe {
            let collection = enumerator
                .EnumAudioEndpoints(eRender, mask)
                .map_err(AudioError::EnumerationFailed)?;
            let count = collection
                .GetCount()
                .map_err(AudioError::EnumerationFailed)?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection.Item(i).map_err(AudioError::EnumerationFailed)?;
                let id = device_id(&device)?;
                match friendly_name(&device) {
                    Some(name) => devices.push(RenderDevice { id, name }),
                    None => debug!(device_id = %id, "Skipping endpoint without a name"),
                }
            }

            Ok(devices)
        })
    }

    fn default_render_device_name(&self) -> Option<String> {
        self.with_enumerator(|enumerator| unsafe {
            let device = enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| AudioError::NoDefaultDevice)?;
            Ok(friendly_name(&device))
        })
        .ok()
        .flatten()
    }

    fn device_name(&self, device_id: &str) -> Option<String> {
        let device_id_wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();

        self.with_enumerator(|enumerator| unsafe {
            let device = enumerator
                .GetDevice(PCWSTR::from_raw(device_id_wide.as_ptr()))
                .map_err(|_| AudioError::DeviceNotFound {
                    name: device_id.to_string(),
                })?;
            Ok(friendly_name(&device))
        })
        .ok()
        .flatten()
    }
}

//! Default endpoint assignment through `IPolicyConfig`.

use super::device::{AudioError, DeviceRole};
use super::enumerator::ComGuard;
use super::router::EndpointPolicy;
use windows::core::*;
use windows::Win32::System::Com::*;

/// IPolicyConfig COM interface (undocumented but stable)
/// Used to set the default audio device
#[windows::core::interface("F8679F50-850A-41CF-9C72-430F290290C8")]
pub unsafe trait IPolicyConfig: IUnknown {
    // Reserved methods to maintain vtable order
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
}

// PolicyConfigClient CLSID
const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

/// [`EndpointPolicy`] backed by the PolicyConfig COM client.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyConfig;

impl PolicyConfig {
    pub fn new() -> Self {
        Self
    }
}

impl EndpointPolicy for PolicyConfig {
    fn set_default_endpoint(&self, device_id: &str, role: DeviceRole) -> std::result::Result<(), AudioError> {
        let _com = ComGuard::new()?;

        unsafe {
            let policy_config: IPolicyConfig =
                CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)
                    .map_err(AudioError::SetDefaultFailed)?;

            let device_id_wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();
            policy_config
                .SetDefaultEndpoint(PCWSTR(device_id_wide.as_ptr()), role as u32)
                .ok()
                .map_err(AudioError::SetDefaultFailed)?;
        }

        Ok(())
    }
}

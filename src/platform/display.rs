//! Win32 display mode access and topology switching.

use crate::display::{DisplayError, DisplayModeSource, ModeDescriptor, TopologySwitch, TopologyTarget};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    ChangeDisplaySettingsExW, EnumDisplaySettingsW, CDS_TYPE, DEVMODEW, DISP_CHANGE_SUCCESSFUL,
    DM_DISPLAYFREQUENCY, DM_PELSHEIGHT, DM_PELSWIDTH, ENUM_CURRENT_SETTINGS,
    ENUM_DISPLAY_SETTINGS_MODE,
};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;

/// Null-terminated device name, or `None` for the primary display.
struct DeviceName(Option<Vec<u16>>);

impl DeviceName {
    fn new(device: Option<&str>) -> Self {
        Self(device.map(|d| d.encode_utf16().chain(std::iter::once(0)).collect()))
    }

    fn as_pcwstr(&self) -> PCWSTR {
        match &self.0 {
            Some(wide) => PCWSTR::from_raw(wide.as_ptr()),
            None => PCWSTR::null(),
        }
    }
}

fn empty_devmode() -> DEVMODEW {
    DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as u16,
        ..Default::default()
    }
}

fn descriptor(dm: &DEVMODEW) -> ModeDescriptor {
    ModeDescriptor::new(dm.dmPelsWidth, dm.dmPelsHeight, dm.dmDisplayFrequency)
}

/// Display modes through `EnumDisplaySettingsW`/`ChangeDisplaySettingsExW`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32DisplayModes;

impl DisplayModeSource for Win32DisplayModes {
    fn current_mode(&self, device: Option<&str>) -> Result<ModeDescriptor, DisplayError> {
        let name = DeviceName::new(device);
        let mut dm = empty_devmode();
        let found = unsafe { EnumDisplaySettingsW(name.as_pcwstr(), ENUM_CURRENT_SETTINGS, &mut dm) };
        if !found.as_bool() {
            return Err(DisplayError::CurrentModeUnavailable {
                device: device.unwrap_or("primary").to_string(),
            });
        }
        Ok(descriptor(&dm))
    }

    fn mode_at(&self, device: Option<&str>, index: u32) -> Option<ModeDescriptor> {
        let name = DeviceName::new(device);
        let mut dm = empty_devmode();
        let found =
            unsafe { EnumDisplaySettingsW(name.as_pcwstr(), ENUM_DISPLAY_SETTINGS_MODE(index), &mut dm) };
        found.as_bool().then(|| descriptor(&dm))
    }

    fn apply_mode(&self, device: Option<&str>, mode: &ModeDescriptor) -> Result<(), DisplayError> {
        let name = DeviceName::new(device);
        let mut dm = empty_devmode();
        dm.dmPelsWidth = mode.width;
        dm.dmPelsHeight = mode.height;
        dm.dmDisplayFrequency = mode.frequency;
        dm.dmFields = DM_PELSWIDTH | DM_PELSHEIGHT | DM_DISPLAYFREQUENCY;

        let result = unsafe {
            ChangeDisplaySettingsExW(
                name.as_pcwstr(),
                Some(&dm as *const DEVMODEW),
                HWND::default(),
                CDS_TYPE(0),
                None,
            )
        };

        if result == DISP_CHANGE_SUCCESSFUL {
            Ok(())
        } else {
            Err(DisplayError::ApplyRejected {
                mode: *mode,
                code: result.0,
            })
        }
    }
}

/// Topology switch through the system `DisplaySwitch.exe`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplaySwitchExe;

impl TopologySwitch for DisplaySwitchExe {
    fn launch(&self, target: TopologyTarget) -> isize {
        let argument: Vec<u16> = target
            .argument()
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let result = unsafe {
            ShellExecuteW(
                HWND::default(),
                w!("open"),
                w!("DisplaySwitch.exe"),
                PCWSTR::from_raw(argument.as_ptr()),
                PCWSTR::null(),
                SW_HIDE,
            )
        };
        result.0 as isize
    }
}

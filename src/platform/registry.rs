//! Launch-at-login entry in the current user's Run key.

use crate::config::{StartupEntry, StartupError};
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_SZ,
};

/// `HKCU\...\Run` value pointing at the running executable.
pub struct RunKeyEntry {
    run_key_path: Vec<u16>,
    value_name: Vec<u16>,
}

impl RunKeyEntry {
    const RUN_KEY: &'static str = r"Software\Microsoft\Windows\CurrentVersion\Run";
    const APP_NAME: &'static str = "DisplayRefreshRate";

    pub fn new() -> Self {
        Self {
            run_key_path: Self::to_wide(Self::RUN_KEY),
            value_name: Self::to_wide(Self::APP_NAME),
        }
    }

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn open(&self, access: windows::Win32::System::Registry::REG_SAM_FLAGS) -> Option<HKEY> {
        let mut hkey = HKEY::default();
        let result = unsafe {
            RegOpenKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR::from_raw(self.run_key_path.as_ptr()),
                0,
                access,
                &mut hkey,
            )
        };
        if result.is_err() {
            None
        } else {
            Some(hkey)
        }
    }
}

impl StartupEntry for RunKeyEntry {
    fn is_enabled(&self) -> bool {
        let Some(hkey) = self.open(KEY_READ) else {
            return false;
        };

        unsafe {
            let mut data_size = 0u32;
            let result = RegQueryValueExW(
                hkey,
                PCWSTR::from_raw(self.value_name.as_ptr()),
                None,
                None,
                None,
                Some(&mut data_size),
            );

            let _ = RegCloseKey(hkey);

            result.is_ok() && data_size > 0
        }
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), StartupError> {
        let hkey = self
            .open(KEY_WRITE)
            .ok_or_else(|| StartupError::RegistryAccess("Failed to open Run key".to_string()))?;

        let result = if enabled {
            let exe_path = match std::env::current_exe() {
                Ok(path) => path,
                Err(_) => {
                    unsafe {
                        let _ = RegCloseKey(hkey);
                    }
                    return Err(StartupError::WriteFailed {
                        key: Self::APP_NAME.to_string(),
                    });
                }
            };
            // Quoted so paths with spaces survive the shell's parsing
            let command = format!("\"{}\"", exe_path.to_string_lossy());
            let command_wide = Self::to_wide(&command);

            unsafe {
                RegSetValueExW(
                    hkey,
                    PCWSTR::from_raw(self.value_name.as_ptr()),
                    0,
                    REG_SZ,
                    Some(std::slice::from_raw_parts(
                        command_wide.as_ptr() as *const u8,
                        command_wide.len() * 2,
                    )),
                )
            }
        } else {
            unsafe { RegDeleteValueW(hkey, PCWSTR::from_raw(self.value_name.as_ptr())) }
        };

        unsafe {
            let _ = RegCloseKey(hkey);
        }

        // Deleting a value that is already gone is fine
        if result.is_err() && enabled {
            Err(StartupError::WriteFailed {
                key: Self::APP_NAME.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for RunKeyEntry {
    fn default() -> Self {
        Self::new()
    }
}

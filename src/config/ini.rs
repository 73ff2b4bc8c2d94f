//! INI file settings store.
//!
//! Uses the Windows private-profile API on a file next to the executable.

use super::settings::{ProfileStore, SettingsError};
use std::path::{Path, PathBuf};
use windows::core::PCWSTR;
use windows::Win32::System::WindowsProgramming::{
    GetPrivateProfileStringW, WritePrivateProfileStringW,
};

/// Values longer than this are truncated by the profile API.
const MAX_VALUE_LEN: usize = 512;

/// Settings file stored beside the executable.
pub struct IniProfile {
    path: PathBuf,
    path_wide: Vec<u16>,
}

impl IniProfile {
    pub const FILE_NAME: &'static str = "display-refresh-rate.ini";

    /// Open the settings file in the executable's directory.
    pub fn beside_executable() -> Result<Self, SettingsError> {
        let exe = std::env::current_exe().map_err(SettingsError::PathUnavailable)?;
        let dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(Self::at(dir.join(Self::FILE_NAME)))
    }

    pub fn at(path: PathBuf) -> Self {
        let path_wide = to_wide(&path.to_string_lossy());
        Self { path, path_wide }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

impl ProfileStore for IniProfile {
    fn read(&self, section: &str, key: &str) -> Option<String> {
        let section_wide = to_wide(section);
        let key_wide = to_wide(key);
        // A default no caller could write distinguishes "absent" from "empty".
        let missing = to_wide("\u{1}");
        let mut buffer = vec![0u16; MAX_VALUE_LEN];

        let len = unsafe {
            GetPrivateProfileStringW(
                PCWSTR::from_raw(section_wide.as_ptr()),
                PCWSTR::from_raw(key_wide.as_ptr()),
                PCWSTR::from_raw(missing.as_ptr()),
                Some(&mut buffer),
                PCWSTR::from_raw(self.path_wide.as_ptr()),
            )
        } as usize;

        let value = String::from_utf16_lossy(&buffer[..len.min(buffer.len())]);
        (value != "\u{1}").then_some(value)
    }

    fn write(&mut self, section: &str, key: &str, value: &str) -> Result<(), SettingsError> {
        let section_wide = to_wide(section);
        let key_wide = to_wide(key);
        let value_wide = to_wide(value);

        unsafe {
            WritePrivateProfileStringW(
                PCWSTR::from_raw(section_wide.as_ptr()),
                PCWSTR::from_raw(key_wide.as_ptr()),
                PCWSTR::from_raw(value_wide.as_ptr()),
                PCWSTR::from_raw(self.path_wide.as_ptr()),
            )
        }
        .map_err(|_| SettingsError::WriteFailed {
            section: section.to_string(),
            key: key.to_string(),
        })
    }
}

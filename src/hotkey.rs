//! Global hotkey identifiers and key bindings.
//!
//! Bindings are persisted as named values (`"F12"`, `"Control, Alt"`) and
//! registered with the OS by the platform layer.

use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Actions that can be bound to a global hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum HotkeyId {
    SetMaxRefresh = 1,
    ToggleDisplay = 2,
}

impl HotkeyId {
    pub const ALL: [HotkeyId; 2] = [HotkeyId::SetMaxRefresh, HotkeyId::ToggleDisplay];

    /// Prefix of the `Shortcuts/<Id>Key` and `Shortcuts/<Id>Modifiers` settings keys.
    pub fn settings_name(self) -> &'static str {
        match self {
            HotkeyId::SetMaxRefresh => "SetMaxRefresh",
            HotkeyId::ToggleDisplay => "ToggleDisplay",
        }
    }

    /// Map a `WM_HOTKEY` id back to the action.
    pub fn from_raw(id: i32) -> Option<Self> {
        match id {
            1 => Some(HotkeyId::SetMaxRefresh),
            2 => Some(HotkeyId::ToggleDisplay),
            _ => None,
        }
    }
}

bitflags! {
    /// Hotkey modifier keys. Bit values match the Win32 `MOD_*` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const ALT = 0x1;
        const CONTROL = 0x2;
        const SHIFT = 0x4;
        const WIN = 0x8;
    }
}

/// A virtual-key code with a stable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(u32);

// (name, virtual-key) pairs for keys that aren't letters, digits or function keys.
const NAMED_KEYS: &[(&str, u32)] = &[
    ("Space", 0x20),
    ("PageUp", 0x21),
    ("PageDown", 0x22),
    ("End", 0x23),
    ("Home", 0x24),
    ("Left", 0x25),
    ("Up", 0x26),
    ("Right", 0x27),
    ("Down", 0x28),
    ("Insert", 0x2D),
    ("Delete", 0x2E),
    ("Pause", 0x13),
];

impl Key {
    pub const F11: Key = Key(0x7A);
    pub const F12: Key = Key(0x7B);

    /// Win32 virtual-key code.
    pub fn vk(self) -> u32 {
        self.0
    }

    fn name(self) -> Option<String> {
        match self.0 {
            0x70..=0x87 => Some(format!("F{}", self.0 - 0x70 + 1)),
            0x41..=0x5A => char::from_u32(self.0).map(String::from),
            0x30..=0x39 => Some(format!("D{}", self.0 - 0x30)),
            0x60..=0x69 => Some(format!("NumPad{}", self.0 - 0x60)),
            vk => NAMED_KEYS
                .iter()
                .find(|(_, code)| *code == vk)
                .map(|(name, _)| name.to_string()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(&name),
            None => write!(f, "0x{:02X}", self.0),
        }
    }
}

/// Hotkey parse error types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyParseError {
    #[error("Unknown key name: {0}")]
    UnknownKey(String),

    #[error("Unknown modifier name: {0}")]
    UnknownModifier(String),
}

impl FromStr for Key {
    type Err = HotkeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        let unknown = || HotkeyParseError::UnknownKey(name.to_string());

        if let Some(n) = name.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
            return match n {
                1..=24 => Ok(Key(0x70 + n - 1)),
                _ => Err(unknown()),
            };
        }
        if let Some(n) = name.strip_prefix("NumPad").and_then(|n| n.parse::<u32>().ok()) {
            return if n <= 9 { Ok(Key(0x60 + n)) } else { Err(unknown()) };
        }
        if let Some(n) = name.strip_prefix('D').and_then(|n| n.parse::<u32>().ok()) {
            return if n <= 9 { Ok(Key(0x30 + n)) } else { Err(unknown()) };
        }

        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphabetic() {
                return Ok(Key(c.to_ascii_uppercase() as u32));
            }
        }

        NAMED_KEYS
            .iter()
            .find(|(key_name, _)| key_name.eq_ignore_ascii_case(name))
            .map(|(_, vk)| Key(*vk))
            .ok_or_else(unknown)
    }
}

impl FromStr for Modifiers {
    type Err = HotkeyParseError;

    /// Parse `"Control, Alt"` (also accepts `+` separators and `Ctrl`/`Windows`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::empty();

        for part in s.split([',', '+']).map(str::trim).filter(|p| !p.is_empty()) {
            modifiers |= match part.to_ascii_lowercase().as_str() {
                "none" => Modifiers::empty(),
                "alt" => Modifiers::ALT,
                "control" | "ctrl" => Modifiers::CONTROL,
                "shift" => Modifiers::SHIFT,
                "win" | "windows" => Modifiers::WIN,
                _ => return Err(HotkeyParseError::UnknownModifier(part.to_string())),
            };
        }

        Ok(modifiers)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = [
            (Modifiers::ALT, "Alt"),
            (Modifiers::CONTROL, "Control"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::WIN, "Win"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        f.write_str(&names.join(", "))
    }
}

/// A key plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl HotkeyBinding {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Human-readable form for menus, e.g. `Ctrl+Alt+F12`.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if self.modifiers.contains(Modifiers::CONTROL) {
            parts.push("Ctrl".to_string());
        }
        if self.modifiers.contains(Modifiers::ALT) {
            parts.push("Alt".to_string());
        }
        if self.modifiers.contains(Modifiers::SHIFT) {
            parts.push("Shift".to_string());
        }
        if self.modifiers.contains(Modifiers::WIN) {
            parts.push("Win".to_string());
        }
        parts.push(self.key.to_string());
        parts.join("+")
    }
}

/// The configured binding for each action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBindings {
    pub set_max_refresh: HotkeyBinding,
    pub toggle_display: HotkeyBinding,
}

impl HotkeyBindings {
    pub fn get(&self, id: HotkeyId) -> HotkeyBinding {
        match id {
            HotkeyId::SetMaxRefresh => self.set_max_refresh,
            HotkeyId::ToggleDisplay => self.toggle_display,
        }
    }

    pub fn get_mut(&mut self, id: HotkeyId) -> &mut HotkeyBinding {
        match id {
            HotkeyId::SetMaxRefresh => &mut self.set_max_refresh,
            HotkeyId::ToggleDisplay => &mut self.toggle_display,
        }
    }
}

impl Default for HotkeyBindings {
    fn default() -> Self {
        Self {
            set_max_refresh: HotkeyBinding::new(Key::F12, Modifiers::CONTROL | Modifiers::ALT),
            toggle_display: HotkeyBinding::new(Key::F11, Modifiers::CONTROL | Modifiers::ALT),
        }
    }
}

//! Friendly-name matching for audio endpoints.
//!
//! Saved device names drift: drivers append manufacturer suffixes or get
//! renamed. Lookup is exact first, then substring in either direction, all
//! case-insensitive.

use super::device::RenderDevice;

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Whether a live endpoint name refers to the saved device name.
pub fn names_match(saved: &str, live: &str) -> bool {
    if saved.is_empty() || live.is_empty() {
        return false;
    }
    contains_ignore_case(live, saved) || contains_ignore_case(saved, live)
}

/// Find the device for a saved name: exact match first, then substring.
pub fn find_device<'a>(devices: &'a [RenderDevice], saved: &str) -> Option<&'a RenderDevice> {
    if saved.is_empty() {
        return None;
    }
    let saved_lower = saved.to_lowercase();

    devices
        .iter()
        .find(|d| d.name.to_lowercase() == saved_lower)
        .or_else(|| devices.iter().find(|d| names_match(saved, &d.name)))
}

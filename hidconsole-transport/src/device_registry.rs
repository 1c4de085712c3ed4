//! Device registry - the default allow-list of supported devices
//!
//! All supported keyboards expose their raw report interface on the
//! QMK-style vendor page `0xFF60`, usage `0x61`. Each firmware-update mode
//! enumerates under its own PID and is listed separately.

use crate::types::{DeviceDescriptor, DeviceFilter};

/// Raw report interface usage page
pub const RAW_USAGE_PAGE: u16 = 0xFF60;

/// Raw report interface usage
pub const RAW_USAGE: u16 = 0x61;

/// Default allow-list of (vendor, product, usage page, usage) tuples
pub const DEFAULT_FILTERS: &[DeviceFilter] = &[
    DeviceFilter::raw(0x34B7, 0x2332, RAW_USAGE_PAGE, RAW_USAGE), // EZ80
    DeviceFilter::raw(0x34B7, 0x1234, RAW_USAGE_PAGE, RAW_USAGE), // EZ80 update mode
    DeviceFilter::raw(0x0075, 0x7500, RAW_USAGE_PAGE, RAW_USAGE), // EZ75
    DeviceFilter::raw(0x0075, 0x7501, RAW_USAGE_PAGE, RAW_USAGE), // EZ75 update mode
    DeviceFilter::raw(0xCAFE, 0x9010, RAW_USAGE_PAGE, RAW_USAGE), // EZ60 (new)
    DeviceFilter::raw(0xCAFE, 0x9005, RAW_USAGE_PAGE, RAW_USAGE), // EZ63 (new firmware)
    DeviceFilter::raw(0xCAFE, 0x8005, RAW_USAGE_PAGE, RAW_USAGE), // EZ63 (old firmware)
    DeviceFilter::raw(0x0063, 0x6300, RAW_USAGE_PAGE, RAW_USAGE), // EZ63
    DeviceFilter::raw(0x0063, 0x6301, RAW_USAGE_PAGE, RAW_USAGE), // EZ63 update mode
    DeviceFilter::raw(0xCAFE, 0x8010, RAW_USAGE_PAGE, RAW_USAGE), // EZ60
];

/// Check whether an interface matches any filter of the list
#[inline]
pub fn is_allowed(filters: &[DeviceFilter], vid: u16, pid: u16, usage_page: u16, usage: u16) -> bool {
    filters
        .iter()
        .any(|f| f.matches(vid, pid, usage_page, usage))
}

/// Check a descriptor against a filter list
#[inline]
pub fn is_allowed_descriptor(filters: &[DeviceFilter], device: &DeviceDescriptor) -> bool {
    filters.iter().any(|f| f.matches_descriptor(device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_list_size() {
        assert_eq!(DEFAULT_FILTERS.len(), 10);
        assert!(DEFAULT_FILTERS
            .iter()
            .all(|f| f.usage_page == Some(RAW_USAGE_PAGE) && f.usage == Some(RAW_USAGE)));
    }

    #[test]
    fn test_known_keyboards_allowed() {
        assert!(is_allowed(DEFAULT_FILTERS, 0x34B7, 0x2332, 0xFF60, 0x61)); // EZ80
        assert!(is_allowed(DEFAULT_FILTERS, 0x0075, 0x7501, 0xFF60, 0x61)); // EZ75 update
        assert!(is_allowed(DEFAULT_FILTERS, 0xCAFE, 0x8010, 0xFF60, 0x61)); // EZ60
    }

    #[test]
    fn test_keyboard_interface_not_allowed() {
        // Same device, boot keyboard interface
        assert!(!is_allowed(DEFAULT_FILTERS, 0x34B7, 0x2332, 0x0001, 0x06));
    }

    #[test]
    fn test_unknown_device_not_allowed() {
        assert!(!is_allowed(DEFAULT_FILTERS, 0x3151, 0x5030, 0xFF60, 0x61));
    }
}

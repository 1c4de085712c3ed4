//! Common types for transport layer

use serde::{Deserialize, Serialize};

/// First usage page of the vendor-defined range
pub const VENDOR_USAGE_PAGE_MIN: u16 = 0xFF00;

/// One allow-list entry identifying eligible devices
///
/// `usage_page` / `usage` narrow the match to a single interface of a
/// composite device; `None` matches any interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFilter {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// HID usage page of the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_page: Option<u16>,
    /// HID usage of the interface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<u16>,
}

impl DeviceFilter {
    /// Filter for a raw report interface (usage page + usage given)
    pub const fn raw(vendor_id: u16, product_id: u16, usage_page: u16, usage: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            usage_page: Some(usage_page),
            usage: Some(usage),
        }
    }

    /// Check whether an interface with these ids matches the filter
    pub fn matches(&self, vid: u16, pid: u16, usage_page: u16, usage: u16) -> bool {
        self.vendor_id == vid
            && self.product_id == pid
            && self.usage_page.map_or(true, |p| p == usage_page)
            && self.usage.map_or(true, |u| u == usage)
    }

    /// Check a descriptor against the filter
    pub fn matches_descriptor(&self, device: &DeviceDescriptor) -> bool {
        self.matches(
            device.vendor_id,
            device.product_id,
            device.usage_page,
            device.usage,
        )
    }
}

/// Identity of one HID interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// HID usage page of the interface
    pub usage_page: u16,
    /// HID usage of the interface
    pub usage: u16,
    /// Platform device path (unique per interface)
    pub path: String,
    /// Product name if available
    pub product_name: Option<String>,
    /// Serial number if available
    pub serial: Option<String>,
    /// Whether the interface accepts output reports
    pub has_output_reports: bool,
}

impl DeviceDescriptor {
    /// Name shown to the operator
    pub fn display_name(&self) -> String {
        match &self.product_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{:04X}:{:04X}", self.vendor_id, self.product_id),
        }
    }

    /// hidapi does not expose report descriptors portably, so output
    /// capability is derived from the vendor-defined usage page range.
    pub fn usage_page_has_output(usage_page: u16) -> bool {
        usage_page >= VENDOR_USAGE_PAGE_MIN
    }

    /// Whether two descriptors name the same interface
    pub fn same_interface(&self, other: &DeviceDescriptor) -> bool {
        self.path == other.path
    }
}

/// Input report received from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReport {
    /// Milliseconds since the handle was opened
    pub timestamp_millis: u64,
    /// Report payload (without report ID)
    pub data: Vec<u8>,
}

impl InboundReport {
    /// Create a report stamped with the given elapsed time
    pub fn new(timestamp_millis: u64, data: Vec<u8>) -> Self {
        Self {
            timestamp_millis,
            data,
        }
    }
}

/// Discovery events for hot-plug support
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A device was added
    DeviceAdded(DeviceDescriptor),
    /// A device was removed
    DeviceRemoved(DeviceDescriptor),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: Option<&str>) -> DeviceDescriptor {
        DeviceDescriptor {
            vendor_id: 0x34B7,
            product_id: 0x2332,
            usage_page: 0xFF60,
            usage: 0x61,
            path: "/dev/hidraw3".into(),
            product_name: name.map(String::from),
            serial: None,
            has_output_reports: true,
        }
    }

    #[test]
    fn test_filter_matches_interface() {
        let filter = DeviceFilter::raw(0x34B7, 0x2332, 0xFF60, 0x61);
        assert!(filter.matches_descriptor(&descriptor(None)));
        assert!(!filter.matches(0x34B7, 0x2332, 0x0001, 0x06));
        assert!(!filter.matches(0x34B7, 0x1234, 0xFF60, 0x61));
    }

    #[test]
    fn test_filter_without_usage_matches_any_interface() {
        let filter = DeviceFilter {
            vendor_id: 0x34B7,
            product_id: 0x2332,
            usage_page: None,
            usage: None,
        };
        assert!(filter.matches(0x34B7, 0x2332, 0x0001, 0x06));
    }

    #[test]
    fn test_display_name_falls_back_to_ids() {
        assert_eq!(descriptor(Some("EZ80")).display_name(), "EZ80");
        assert_eq!(descriptor(None).display_name(), "34B7:2332");
        assert_eq!(descriptor(Some("  ")).display_name(), "34B7:2332");
    }

    #[test]
    fn test_vendor_usage_page_has_output() {
        assert!(DeviceDescriptor::usage_page_has_output(0xFF60));
        assert!(!DeviceDescriptor::usage_page_has_output(0x0001));
    }
}

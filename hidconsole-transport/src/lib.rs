//! Transport layer for raw HID report consoles
//!
//! This crate provides the device-facing half of the console:
//!
//! - Allow-list filtering of eligible raw report interfaces
//! - Enumeration, open/close/forget of devices through hidapi
//! - A reader thread per open handle broadcasting inbound reports
//! - Hot-plug detection by polling enumeration
//! - An in-memory mock (feature `mock`) for tests

pub mod device_registry;
pub mod error;
pub mod types;

mod discovery;
mod hid_raw;
mod hotplug;
mod reader;

#[cfg(feature = "mock")]
pub mod mock;

pub use device_registry::{is_allowed, is_allowed_descriptor, DEFAULT_FILTERS, RAW_USAGE, RAW_USAGE_PAGE};
pub use discovery::{DeviceDiscovery, HidDiscovery, DEFAULT_POLL_INTERVAL};
pub use error::TransportError;
pub use hid_raw::HidRawTransport;
pub use reader::{ReaderConfig, ReportSubsystem, DEFAULT_MAX_REPORT_LEN};
pub use types::{DeviceDescriptor, DeviceFilter, DiscoveryEvent, InboundReport};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared handle to an open transport
pub type BoxedTransport = Arc<dyn Transport>;

/// One open device handle
///
/// Reports are opaque byte buffers: no command framing, no checksums, no
/// response correlation. Inbound reports arrive through `subscribe_reports`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write one output report
    ///
    /// `data` is the report payload without report ID; the transport adds
    /// the configured ID itself.
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Subscribe to inbound reports
    ///
    /// Returns None once the handle has been closed.
    fn subscribe_reports(&self) -> Option<broadcast::Receiver<InboundReport>>;

    /// Get device information
    fn device_info(&self) -> &DeviceDescriptor;

    /// Check if the handle is still usable
    async fn is_connected(&self) -> bool;

    /// Close the handle. Closing twice is not an error.
    async fn close(&self) -> Result<(), TransportError>;

    /// Close the handle and drop the device from the paired set
    async fn forget(&self) -> Result<(), TransportError>;
}

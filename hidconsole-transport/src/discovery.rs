//! Device discovery for allow-listed raw report interfaces

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hidapi::HidApi;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::device_registry::{self, DEFAULT_FILTERS};
use crate::error::TransportError;
use crate::hid_raw::HidRawTransport;
use crate::hotplug::HotplugWatcher;
use crate::reader::ReaderConfig;
use crate::types::{DeviceDescriptor, DeviceFilter, DiscoveryEvent};
use crate::Transport;

/// Default hot-plug polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Device discovery abstraction
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Previously paired devices that are currently attached
    async fn list_paired(&self) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Candidates for an explicit operator selection
    async fn request_selection(
        &self,
        filters: &[DeviceFilter],
    ) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open a specific device
    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError>;

    /// Subscribe to hot-plug events
    async fn watch(&self) -> Result<broadcast::Receiver<DiscoveryEvent>, TransportError>;
}

/// Which paths are open and which have been forgotten by the operator
#[derive(Debug, Default)]
pub(crate) struct PairingState {
    open: HashSet<String>,
    forgotten: HashSet<String>,
}

impl PairingState {
    /// Claim a path for opening. False if another handle holds it.
    pub(crate) fn mark_open(&mut self, path: &str) -> bool {
        self.open.insert(path.to_string())
    }

    pub(crate) fn mark_closed(&mut self, path: &str) {
        self.open.remove(path);
    }

    pub(crate) fn forget(&mut self, path: &str) {
        self.forgotten.insert(path.to_string());
    }

    pub(crate) fn remember(&mut self, path: &str) {
        self.forgotten.remove(path);
    }

    pub(crate) fn is_forgotten(&self, path: &str) -> bool {
        self.forgotten.contains(path)
    }
}

/// HID discovery backed by hidapi
pub struct HidDiscovery {
    /// Shared hidapi context (also used by the hot-plug thread)
    api: Arc<Mutex<HidApi>>,
    /// Allow-list of eligible interfaces
    filters: Vec<DeviceFilter>,
    /// Report ID prepended to writes of opened transports
    report_id: u8,
    /// Reader settings for opened transports
    reader: ReaderConfig,
    /// Hot-plug polling interval
    poll_interval: Duration,
    pairing: Arc<Mutex<PairingState>>,
    /// Hot-plug event sender
    event_tx: broadcast::Sender<DiscoveryEvent>,
    /// Started on first `watch()`
    watcher: Mutex<Option<HotplugWatcher>>,
}

impl HidDiscovery {
    /// Create a discovery instance using the default allow-list
    pub fn new() -> Result<Self, TransportError> {
        Self::with_filters(DEFAULT_FILTERS.to_vec())
    }

    /// Create a discovery instance with a custom allow-list
    pub fn with_filters(filters: Vec<DeviceFilter>) -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        let (event_tx, _) = broadcast::channel(16);
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            filters,
            report_id: 0,
            reader: ReaderConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            pairing: Arc::new(Mutex::new(PairingState::default())),
            event_tx,
            watcher: Mutex::new(None),
        })
    }

    /// Set the report ID used for writes (default 0)
    pub fn set_report_id(&mut self, report_id: u8) {
        self.report_id = report_id;
    }

    /// Size inbound read buffers for reports of `report_size` bytes
    pub fn set_report_size(&mut self, report_size: usize) {
        self.reader = ReaderConfig::for_report_size(report_size);
    }

    /// Set the hot-plug polling interval (takes effect before the first `watch()`)
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// The configured allow-list
    pub fn filters(&self) -> &[DeviceFilter] {
        &self.filters
    }

    /// Find `device` by path and open it
    fn open_hid(&self, device: &DeviceDescriptor) -> Result<hidapi::HidDevice, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;
        let info = api
            .device_list()
            .find(|d| d.path().to_string_lossy() == device.path)
            .ok_or_else(|| {
                TransportError::DeviceNotFound(format!(
                    "{:04X}:{:04X} at {}",
                    device.vendor_id, device.product_id, device.path
                ))
            })?;
        Ok(info.open_device(&api)?)
    }

    /// Refresh enumeration and collect interfaces matching `filters`
    fn enumerate(&self, filters: &[DeviceFilter]) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;
        Ok(collect_devices(&api, filters))
    }
}

/// Build a descriptor from a hidapi device entry
pub(crate) fn descriptor_from_info(info: &hidapi::DeviceInfo) -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id: info.vendor_id(),
        product_id: info.product_id(),
        usage_page: info.usage_page(),
        usage: info.usage(),
        path: info.path().to_string_lossy().to_string(),
        product_name: info.product_string().map(|s| s.to_string()),
        serial: info.serial_number().map(|s| s.to_string()),
        has_output_reports: DeviceDescriptor::usage_page_has_output(info.usage_page()),
    }
}

/// Collect allow-listed interfaces, one entry per path
pub(crate) fn collect_devices(api: &HidApi, filters: &[DeviceFilter]) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::new();
    let mut devices = Vec::new();

    for info in api.device_list() {
        if !device_registry::is_allowed(
            filters,
            info.vendor_id(),
            info.product_id(),
            info.usage_page(),
            info.usage(),
        ) {
            continue;
        }

        let device = descriptor_from_info(info);
        if !seen.insert(device.path.clone()) {
            continue;
        }

        debug!(
            "Found device: VID={:04X} PID={:04X} page={:04X} usage={:02X} path={}",
            device.vendor_id, device.product_id, device.usage_page, device.usage, device.path
        );
        devices.push(device);
    }

    devices
}

#[async_trait]
impl DeviceDiscovery for HidDiscovery {
    async fn list_paired(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        let devices = self.enumerate(&self.filters)?;
        let pairing = self.pairing.lock();
        let paired: Vec<_> = devices
            .into_iter()
            .filter(|d| !pairing.is_forgotten(&d.path))
            .collect();
        info!("Found {} paired devices", paired.len());
        Ok(paired)
    }

    async fn request_selection(
        &self,
        filters: &[DeviceFilter],
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        self.enumerate(filters)
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        if !self.pairing.lock().mark_open(&device.path) {
            return Err(TransportError::StateTransition(format!(
                "{} is already open",
                device.path
            )));
        }

        let opened = self.open_hid(device);

        let transport = opened.and_then(|hid| {
            HidRawTransport::new(
                hid,
                device.clone(),
                self.report_id,
                self.reader.clone(),
                Arc::clone(&self.pairing),
            )
        });

        match transport {
            Ok(transport) => {
                self.pairing.lock().remember(&device.path);
                info!(
                    "Opened {} ({:04X}:{:04X})",
                    device.display_name(),
                    device.vendor_id,
                    device.product_id
                );
                Ok(Arc::new(transport))
            }
            Err(e) => {
                self.pairing.lock().mark_closed(&device.path);
                Err(e)
            }
        }
    }

    async fn watch(&self) -> Result<broadcast::Receiver<DiscoveryEvent>, TransportError> {
        let mut watcher = self.watcher.lock();
        if watcher.is_none() {
            *watcher = Some(HotplugWatcher::spawn(
                Arc::clone(&self.api),
                self.filters.clone(),
                Arc::clone(&self.pairing),
                self.event_tx.clone(),
                self.poll_interval,
            )?);
        }
        Ok(self.event_tx.subscribe())
    }
}

//! In-memory transport for tests
//!
//! `MockDiscovery` plays the platform: a list of attached devices, hot-plug
//! events and open failures are all driven by the test. Every transport it
//! opens is kept so the test can inspect writes and push inbound reports.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::device_registry;
use crate::discovery::DeviceDiscovery;
use crate::error::TransportError;
use crate::types::{DeviceDescriptor, DeviceFilter, DiscoveryEvent, InboundReport};
use crate::Transport;

/// Build a descriptor for a raw report interface
pub fn descriptor(vendor_id: u16, product_id: u16, path: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        vendor_id,
        product_id,
        usage_page: device_registry::RAW_USAGE_PAGE,
        usage: device_registry::RAW_USAGE,
        path: path.to_string(),
        product_name: Some(format!("Mock {vendor_id:04X}:{product_id:04X}")),
        serial: None,
        has_output_reports: true,
    }
}

/// Scripted device discovery
pub struct MockDiscovery {
    devices: Mutex<Vec<DeviceDescriptor>>,
    forgotten: Arc<Mutex<HashSet<String>>>,
    opened: Mutex<Vec<Arc<MockTransport>>>,
    open_failure: Mutex<Option<TransportError>>,
    list_failure: Mutex<Option<TransportError>>,
    event_tx: broadcast::Sender<DiscoveryEvent>,
}

impl Default for MockDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiscovery {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            devices: Mutex::new(Vec::new()),
            forgotten: Arc::new(Mutex::new(HashSet::new())),
            opened: Mutex::new(Vec::new()),
            open_failure: Mutex::new(None),
            list_failure: Mutex::new(None),
            event_tx,
        }
    }

    /// Attach a device without emitting an event (present at start-up)
    pub fn insert_device(&self, device: DeviceDescriptor) {
        self.devices.lock().push(device);
    }

    /// Attach a device and emit `DeviceAdded`
    pub fn add_device(&self, device: DeviceDescriptor) {
        self.devices.lock().push(device.clone());
        let _ = self.event_tx.send(DiscoveryEvent::DeviceAdded(device));
    }

    /// Detach a device and emit `DeviceRemoved`
    pub fn remove_device(&self, path: &str) {
        let removed = {
            let mut devices = self.devices.lock();
            let idx = devices.iter().position(|d| d.path == path);
            idx.map(|i| devices.remove(i))
        };
        if let Some(device) = removed {
            for t in self.opened.lock().iter().filter(|t| t.info.path == path) {
                t.open.store(false, Ordering::SeqCst);
            }
            let _ = self.event_tx.send(DiscoveryEvent::DeviceRemoved(device));
        }
    }

    /// Make the next `open_device` call fail with `err`
    pub fn fail_next_open(&self, err: TransportError) {
        *self.open_failure.lock() = Some(err);
    }

    /// Make the next `list_paired` call fail with `err`
    pub fn fail_next_list(&self, err: TransportError) {
        *self.list_failure.lock() = Some(err);
    }

    /// Every transport opened so far, oldest first
    pub fn opened(&self) -> Vec<Arc<MockTransport>> {
        self.opened.lock().clone()
    }

    /// The most recently opened transport
    pub fn last_transport(&self) -> Option<Arc<MockTransport>> {
        self.opened.lock().last().cloned()
    }

    /// Number of `open_device` calls that produced a transport
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn is_forgotten(&self, path: &str) -> bool {
        self.forgotten.lock().contains(path)
    }
}

#[async_trait]
impl DeviceDiscovery for MockDiscovery {
    async fn list_paired(&self) -> Result<Vec<DeviceDescriptor>, TransportError> {
        if let Some(err) = self.list_failure.lock().take() {
            return Err(err);
        }
        let forgotten = self.forgotten.lock();
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| !forgotten.contains(&d.path))
            .cloned()
            .collect())
    }

    async fn request_selection(
        &self,
        filters: &[DeviceFilter],
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        Ok(self
            .devices
            .lock()
            .iter()
            .filter(|d| device_registry::is_allowed_descriptor(filters, d))
            .cloned()
            .collect())
    }

    async fn open_device(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        if let Some(err) = self.open_failure.lock().take() {
            return Err(err);
        }
        if !self.devices.lock().iter().any(|d| d.same_interface(device)) {
            return Err(TransportError::DeviceNotFound(device.path.clone()));
        }
        self.forgotten.lock().remove(&device.path);

        let transport = Arc::new(MockTransport::new(
            device.clone(),
            Arc::clone(&self.forgotten),
        ));
        self.opened.lock().push(Arc::clone(&transport));
        Ok(transport as Arc<dyn Transport>)
    }

    async fn watch(&self) -> Result<broadcast::Receiver<DiscoveryEvent>, TransportError> {
        Ok(self.event_tx.subscribe())
    }
}

/// Recording transport
pub struct MockTransport {
    info: DeviceDescriptor,
    writes: Mutex<Vec<Vec<u8>>>,
    report_tx: broadcast::Sender<InboundReport>,
    open: AtomicBool,
    fail_writes: AtomicBool,
    forgot: AtomicBool,
    clock: AtomicU64,
    forgotten: Arc<Mutex<HashSet<String>>>,
}

impl MockTransport {
    fn new(info: DeviceDescriptor, forgotten: Arc<Mutex<HashSet<String>>>) -> Self {
        let (report_tx, _) = broadcast::channel(64);
        Self {
            info,
            writes: Mutex::new(Vec::new()),
            report_tx,
            open: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            forgot: AtomicBool::new(false),
            clock: AtomicU64::new(0),
            forgotten,
        }
    }

    /// Reports written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Deliver an inbound report to subscribers
    pub fn push_report(&self, data: &[u8]) {
        let ts = self.clock.fetch_add(1, Ordering::Relaxed);
        let _ = self.report_tx.send(InboundReport::new(ts, data.to_vec()));
    }

    /// Make subsequent writes fail with a HID error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn was_forgotten(&self) -> bool {
        self.forgot.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::HidError("mock write failure".into()));
        }
        self.writes.lock().push(data.to_vec());
        Ok(())
    }

    fn subscribe_reports(&self) -> Option<broadcast::Receiver<InboundReport>> {
        self.is_open().then(|| self.report_tx.subscribe())
    }

    fn device_info(&self) -> &DeviceDescriptor {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        self.is_open()
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn forget(&self) -> Result<(), TransportError> {
        self.open.store(false, Ordering::SeqCst);
        self.forgot.store(true, Ordering::SeqCst);
        self.forgotten.lock().insert(self.info.path.clone());
        Ok(())
    }
}

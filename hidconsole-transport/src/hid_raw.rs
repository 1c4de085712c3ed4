//! HID raw-report transport
//!
//! Talks to the vendor-defined raw interface of a device through plain
//! output/input reports (no feature reports, no command framing).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hidapi::HidDevice;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::discovery::PairingState;
use crate::error::TransportError;
use crate::reader::{ReaderConfig, ReportSubsystem};
use crate::types::{DeviceDescriptor, InboundReport};
use crate::Transport;

/// Transport for one open raw report interface
pub struct HidRawTransport {
    /// Device handle, shared with the reader thread
    device: Arc<Mutex<HidDevice>>,
    /// Device information
    info: DeviceDescriptor,
    /// Report ID prepended to every write
    report_id: u8,
    /// Reader thread and inbound channel
    reports: ReportSubsystem,
    /// Cleared by close/forget
    open: AtomicBool,
    /// Open/forgotten bookkeeping shared with discovery
    pairing: Arc<Mutex<PairingState>>,
}

impl HidRawTransport {
    /// Wrap an opened device and start its reader thread.
    pub(crate) fn new(
        device: HidDevice,
        info: DeviceDescriptor,
        report_id: u8,
        reader: ReaderConfig,
        pairing: Arc<Mutex<PairingState>>,
    ) -> Result<Self, TransportError> {
        let device = Arc::new(Mutex::new(device));
        let reports = ReportSubsystem::spawn(Arc::clone(&device), reader)?;
        Ok(Self {
            device,
            info,
            report_id,
            reports,
            open: AtomicBool::new(true),
            pairing,
        })
    }

    /// Stop the reader and release the path. Returns false if already closed.
    fn release(&self) -> bool {
        if !self.open.swap(false, Ordering::SeqCst) {
            return false;
        }
        self.reports.shutdown();
        self.pairing.lock().mark_closed(&self.info.path);
        true
    }
}

#[async_trait]
impl Transport for HidRawTransport {
    async fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen);
        }

        // hidapi expects the report ID as the first byte, 0 for unnumbered reports
        let mut buf = Vec::with_capacity(data.len() + 1);
        buf.push(self.report_id);
        buf.extend_from_slice(data);
        debug!(
            "Writing report {:02X} ({} bytes): {:02X?}",
            self.report_id,
            data.len(),
            &data[..data.len().min(16)]
        );

        let device = Arc::clone(&self.device);
        let written = tokio::task::spawn_blocking(move || device.lock().write(&buf))
            .await
            .map_err(|e| TransportError::Internal(format!("write task: {e}")))??;

        if written == 0 {
            return Err(TransportError::HidError("device accepted 0 bytes".into()));
        }
        Ok(())
    }

    fn subscribe_reports(&self) -> Option<broadcast::Receiver<InboundReport>> {
        if self.reports.is_shut_down() {
            None
        } else {
            Some(self.reports.subscribe())
        }
    }

    fn device_info(&self) -> &DeviceDescriptor {
        &self.info
    }

    async fn is_connected(&self) -> bool {
        if !self.open.load(Ordering::SeqCst) {
            return false;
        }
        self.device.lock().get_product_string().is_ok()
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.release() {
            info!("Closed {}", self.info.display_name());
        }
        Ok(())
    }

    async fn forget(&self) -> Result<(), TransportError> {
        self.release();
        self.pairing.lock().forget(&self.info.path);
        info!("Forgot {}", self.info.display_name());
        Ok(())
    }
}

impl Drop for HidRawTransport {
    fn drop(&mut self) {
        self.release();
        debug!("HidRawTransport dropped, signaling reader shutdown");
    }
}

//! Inbound report reader
//!
//! Each open handle runs one reader thread that pulls input reports off the
//! device and broadcasts them to subscribers. The device itself is shared
//! with the write path behind a mutex; the reader only holds the lock for
//! one short `read_timeout` call at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hidapi::HidDevice;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::types::InboundReport;

/// Broadcast channel capacity for inbound reports
const REPORT_CHANNEL_CAPACITY: usize = 256;

/// Read buffer size unless a larger report size is configured
pub const DEFAULT_MAX_REPORT_LEN: usize = 64;

/// Configuration for the reader loop
#[derive(Clone)]
pub struct ReaderConfig {
    /// Read timeout in milliseconds (for checking shutdown flag when idle)
    pub read_timeout_ms: i32,
    /// Sleep duration on error before retrying
    pub error_sleep_ms: u64,
    /// Name prefix for thread naming and debug logging
    pub name: &'static str,
    /// Read buffer size; longer input reports would be truncated
    pub max_report_len: usize,
}

impl ReaderConfig {
    /// Reader sized for reports of `report_size` bytes
    pub fn for_report_size(report_size: usize) -> Self {
        Self {
            max_report_len: report_size.max(DEFAULT_MAX_REPORT_LEN),
            ..Self::default()
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 5,
            error_sleep_ms: 100,
            name: "hid",
            max_report_len: DEFAULT_MAX_REPORT_LEN,
        }
    }
}

/// Reader thread plus the channel it feeds.
///
/// Dropping the subsystem (or calling `shutdown`) stops the thread.
pub struct ReportSubsystem {
    report_tx: broadcast::Sender<InboundReport>,
    shutdown: Arc<AtomicBool>,
}

impl ReportSubsystem {
    /// Spawn the reader thread for `device`.
    pub fn spawn(device: Arc<Mutex<HidDevice>>, config: ReaderConfig) -> Result<Self, TransportError> {
        let (report_tx, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));

        let tx = report_tx.clone();
        let flag = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name(format!("{}-report-reader", config.name))
            .spawn(move || run_reader_loop(device, tx, flag, config))
            .map_err(|e| TransportError::Internal(format!("spawn reader thread: {e}")))?;

        Ok(Self { report_tx, shutdown })
    }

    /// Subscribe to inbound reports
    pub fn subscribe(&self) -> broadcast::Receiver<InboundReport> {
        self.report_tx.subscribe()
    }

    /// Signal the reader thread to exit
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been signalled
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Drop for ReportSubsystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reader loop: runs until the shutdown flag is set.
fn run_reader_loop(
    device: Arc<Mutex<HidDevice>>,
    tx: broadcast::Sender<InboundReport>,
    shutdown: Arc<AtomicBool>,
    config: ReaderConfig,
) {
    debug!("{} report reader thread started", config.name);
    let mut buf = vec![0u8; config.max_report_len.max(1)];
    let start_time = Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        // Short timeout: the lock is released between reads so writes interleave
        let result = device.lock().read_timeout(&mut buf, config.read_timeout_ms);
        match result {
            Ok(len) if len > 0 => {
                let timestamp = start_time.elapsed().as_millis() as u64;
                debug!(
                    "{} reader got {} bytes at {}ms: {:02X?}",
                    config.name,
                    len,
                    timestamp,
                    &buf[..len.min(16)]
                );
                // No receivers is fine
                let _ = tx.send(InboundReport::new(timestamp, buf[..len].to_vec()));
            }
            Ok(_) => {}
            Err(e) => {
                warn!("{} report reader error: {}", config.name, e);
                std::thread::sleep(Duration::from_millis(config.error_sleep_ms));
            }
        }
        // Give writers a chance at the lock
        std::thread::yield_now();
    }

    debug!("{} report reader thread exiting", config.name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_buffer_covers_configured_report_size() {
        assert_eq!(ReaderConfig::default().max_report_len, DEFAULT_MAX_REPORT_LEN);
        assert_eq!(ReaderConfig::for_report_size(32).max_report_len, 64);
        assert_eq!(ReaderConfig::for_report_size(1024).max_report_len, 1024);
    }
}

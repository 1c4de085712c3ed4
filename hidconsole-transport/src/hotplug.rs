//! Hot-plug detection by polling enumeration
//!
//! hidapi has no portable arrival/removal notification, so a background
//! thread refreshes the device list at a fixed interval and diffs it against
//! the previous snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hidapi::HidApi;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::discovery::{collect_devices, PairingState};
use crate::error::TransportError;
use crate::types::{DeviceDescriptor, DeviceFilter, DiscoveryEvent};

/// Polling watcher thread. Stops when dropped.
pub(crate) struct HotplugWatcher {
    shutdown: Arc<AtomicBool>,
}

impl HotplugWatcher {
    pub(crate) fn spawn(
        api: Arc<Mutex<HidApi>>,
        filters: Vec<DeviceFilter>,
        pairing: Arc<Mutex<PairingState>>,
        tx: broadcast::Sender<DiscoveryEvent>,
        interval: Duration,
    ) -> Result<Self, TransportError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        std::thread::Builder::new()
            .name("hid-hotplug".into())
            .spawn(move || run_hotplug_loop(api, filters, pairing, tx, interval, flag))
            .map_err(|e| TransportError::Internal(format!("spawn hotplug thread: {e}")))?;

        Ok(Self { shutdown })
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn snapshot(api: &Mutex<HidApi>, filters: &[DeviceFilter]) -> Option<HashMap<String, DeviceDescriptor>> {
    let mut api = api.lock();
    if let Err(e) = api.refresh_devices() {
        debug!("Failed to refresh device list: {}", e);
        return None;
    }
    Some(
        collect_devices(&api, filters)
            .into_iter()
            .map(|d| (d.path.clone(), d))
            .collect(),
    )
}

/// Diff two snapshots into discovery events (removals first)
pub(crate) fn diff_snapshots(
    previous: &HashMap<String, DeviceDescriptor>,
    current: &HashMap<String, DeviceDescriptor>,
) -> Vec<DiscoveryEvent> {
    let removed = previous
        .iter()
        .filter(|(path, _)| !current.contains_key(*path))
        .map(|(_, d)| DiscoveryEvent::DeviceRemoved(d.clone()));
    let added = current
        .iter()
        .filter(|(path, _)| !previous.contains_key(*path))
        .map(|(_, d)| DiscoveryEvent::DeviceAdded(d.clone()));
    removed.chain(added).collect()
}

fn run_hotplug_loop(
    api: Arc<Mutex<HidApi>>,
    filters: Vec<DeviceFilter>,
    pairing: Arc<Mutex<PairingState>>,
    tx: broadcast::Sender<DiscoveryEvent>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    info!("HID hot-plug monitor started ({}ms)", interval.as_millis());
    // Devices present at start are not reported as arrivals
    let mut known = snapshot(&api, &filters).unwrap_or_default();

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(interval);
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let Some(current) = snapshot(&api, &filters) else {
            continue;
        };

        for event in diff_snapshots(&known, &current) {
            match &event {
                DiscoveryEvent::DeviceAdded(d) => {
                    if pairing.lock().is_forgotten(&d.path) {
                        debug!("Ignoring forgotten device {}", d.path);
                        continue;
                    }
                    info!("Device attached: {} ({})", d.display_name(), d.path);
                }
                DiscoveryEvent::DeviceRemoved(d) => {
                    info!("Device detached: {} ({})", d.display_name(), d.path);
                }
            }
            let _ = tx.send(event);
        }
        known = current;
    }

    info!("HID hot-plug monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(path: &str) -> DeviceDescriptor {
        DeviceDescriptor {
            vendor_id: 0xCAFE,
            product_id: 0x8010,
            usage_page: 0xFF60,
            usage: 0x61,
            path: path.into(),
            product_name: Some("EZ60".into()),
            serial: None,
            has_output_reports: true,
        }
    }

    fn map(paths: &[&str]) -> HashMap<String, DeviceDescriptor> {
        paths.iter().map(|p| (p.to_string(), device(p))).collect()
    }

    #[test]
    fn test_diff_reports_arrival_and_removal() {
        let events = diff_snapshots(&map(&["/dev/hidraw1"]), &map(&["/dev/hidraw2"]));
        assert_eq!(
            events,
            vec![
                DiscoveryEvent::DeviceRemoved(device("/dev/hidraw1")),
                DiscoveryEvent::DeviceAdded(device("/dev/hidraw2")),
            ]
        );
    }

    #[test]
    fn test_diff_unchanged_is_empty() {
        let snap = map(&["/dev/hidraw1", "/dev/hidraw2"]);
        assert!(diff_snapshots(&snap, &snap).is_empty());
    }
}

//! Integration tests against a real device.
//!
//! These tests require an allow-listed device to be connected.
//! Run with: cargo test -p hidconsole-transport --test hardware -- --ignored --nocapture

use std::time::Duration;

use hidconsole_transport::{DeviceDiscovery, HidDiscovery, TransportError, DEFAULT_FILTERS};

#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn open_close_reopen() {
    let discovery = HidDiscovery::new().expect("hidapi init");
    let devices = discovery.list_paired().await.unwrap();
    let device = devices
        .last()
        .expect("No device found, plug in a supported keyboard")
        .clone();
    println!("Using {} at {}", device.display_name(), device.path);

    let transport = discovery.open_device(&device).await.unwrap();
    assert!(transport.is_connected().await);
    assert!(transport.subscribe_reports().is_some());

    // Second handle on the same path is the benign race
    let second = discovery.open_device(&device).await;
    assert!(matches!(second, Err(TransportError::StateTransition(_))));

    transport.close().await.unwrap();
    assert!(!transport.is_connected().await);
    assert!(matches!(
        transport.write_report(&[0u8; 32]).await,
        Err(TransportError::NotOpen)
    ));

    // Path is released
    let again = discovery.open_device(&device).await.unwrap();
    again.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires hardware
async fn forget_hides_device_until_reselected() {
    let discovery = HidDiscovery::new().expect("hidapi init");
    let device = discovery
        .list_paired()
        .await
        .unwrap()
        .pop()
        .expect("No device found, plug in a supported keyboard");

    let transport = discovery.open_device(&device).await.unwrap();
    transport.forget().await.unwrap();
    let paired = discovery.list_paired().await.unwrap();
    assert!(paired.iter().all(|d| d.path != device.path));

    // Explicit selection still offers it, and opening re-pairs it
    let candidates = discovery.request_selection(DEFAULT_FILTERS).await.unwrap();
    assert!(candidates.iter().any(|d| d.path == device.path));
    let transport = discovery.open_device(&device).await.unwrap();
    transport.close().await.unwrap();
    assert!(discovery
        .list_paired()
        .await
        .unwrap()
        .iter()
        .any(|d| d.path == device.path));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore] // requires replugging a device by hand
async fn hotplug_reports_replug() {
    let mut discovery = HidDiscovery::new().expect("hidapi init");
    discovery.set_poll_interval(Duration::from_millis(200));
    let mut events = discovery.watch().await.unwrap();

    println!("Unplug and replug the keyboard within 20 seconds...");
    let event = tokio::time::timeout(Duration::from_secs(20), events.recv())
        .await
        .expect("no hot-plug event")
        .unwrap();
    println!("Got {event:?}");
}

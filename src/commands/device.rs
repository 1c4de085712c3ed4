//! Device command handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hidconsole::{ConsoleConfig, StdoutLog};
use hidconsole_transport::DeviceDiscovery;

use super::{connect, describe, open_discovery, start_session};

/// List allow-listed devices
pub async fn list(config: &ConsoleConfig) -> Result<()> {
    let discovery = open_discovery(config)?;
    let devices = discovery.request_selection(&config.filters).await?;

    if devices.is_empty() {
        println!("No supported device found");
        return Ok(());
    }
    println!("Supported devices:");
    for (i, device) in devices.iter().enumerate() {
        let output = if device.has_output_reports {
            ""
        } else {
            " (no output reports)"
        };
        println!("  {}{}", describe(i, device), output);
    }
    Ok(())
}

/// Send one report and echo inbound reports for `wait_ms`
pub async fn send(config: &ConsoleConfig, hex: &str, device: Option<usize>, wait_ms: u64) -> Result<()> {
    // Reject bad input before touching the device
    let report = config.codec()?.encode(hex)?;

    let session = start_session(config, Arc::new(StdoutLog))?;
    connect(&session, config, device).await?;

    session.enqueue(report).await?;
    tokio::time::sleep(Duration::from_millis(wait_ms)).await;

    session.close().await?;
    session.shutdown();
    Ok(())
}

//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `device`: Device commands (list, send)
//! - `batch`: Paced multi-report sends
//! - `chunk`: Offline framing (encode, chunk)
//! - `shortcut`: Saved send-area commands
//! - `console`: Interactive operator loop

pub mod batch;
pub mod chunk;
pub mod console;
pub mod device;
pub mod shortcut;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Select};
use hidconsole::{ConsoleConfig, DeviceSelector, PickIndex, SessionError, SessionHandle, SessionLog};
use hidconsole_transport::{DeviceDescriptor, DeviceDiscovery, HidDiscovery};

/// Create a hidapi discovery configured from `config`
pub fn open_discovery(config: &ConsoleConfig) -> Result<Arc<HidDiscovery>> {
    let mut discovery = HidDiscovery::with_filters(config.filters.clone())
        .context("Failed to initialize HID API")?;
    discovery.set_report_id(config.report_id);
    discovery.set_report_size(config.report_size);
    discovery.set_poll_interval(config.hotplug_poll_interval());
    Ok(Arc::new(discovery))
}

/// Start a session over a fresh discovery
pub fn start_session(config: &ConsoleConfig, log: Arc<dyn SessionLog>) -> Result<SessionHandle> {
    let discovery: Arc<dyn DeviceDiscovery> = open_discovery(config)?;
    Ok(SessionHandle::spawn(discovery, log))
}

pub fn describe(index: usize, device: &DeviceDescriptor) -> String {
    format!(
        "[{}] {} VID={:04X} PID={:04X} page={:04X} usage={:02X} {}",
        index,
        device.display_name(),
        device.vendor_id,
        device.product_id,
        device.usage_page,
        device.usage,
        device.path
    )
}

/// Interactive device prompt
pub struct PromptSelector;

#[async_trait]
impl DeviceSelector for PromptSelector {
    async fn select(&self, candidates: &[DeviceDescriptor]) -> Option<DeviceDescriptor> {
        if candidates.len() == 1 {
            return candidates.first().cloned();
        }

        let items: Vec<String> = candidates
            .iter()
            .enumerate()
            .map(|(i, d)| describe(i, d))
            .collect();
        let picked = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select a device")
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        match picked {
            Ok(Ok(Some(idx))) => candidates.get(idx).cloned(),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                tracing::warn!("Device prompt failed: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Device prompt task failed: {}", e);
                None
            }
        }
    }
}

/// Select a device (by index or prompt) and open it
pub async fn connect(
    session: &SessionHandle,
    config: &ConsoleConfig,
    device: Option<usize>,
) -> Result<DeviceDescriptor> {
    let chosen = match device {
        Some(idx) => session.request_device(&config.filters, &PickIndex(idx)).await,
        None => session.request_device(&config.filters, &PromptSelector).await,
    };
    let chosen = match chosen {
        Err(SessionError::UserCancelled) => anyhow::bail!("No device selected"),
        other => other?,
    };

    session.open(chosen.clone()).await?;
    let status = session.status().await?;
    if status.device.is_none() {
        anyhow::bail!("{} is busy", chosen.display_name());
    }
    Ok(chosen)
}

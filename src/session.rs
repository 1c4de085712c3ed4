//! Device session: connection lifecycle and the outbound queue
//!
//! One tokio task owns all session state (the active transport, the
//! outbound queue, the connection state). Everything else talks to it
//! through a cloneable [`SessionHandle`] that posts [`SessionEvent`]s, so
//! transport callbacks (inbound reports, hot-plug) are just more events and
//! no state is shared between tasks.

use std::sync::Arc;

use async_trait::async_trait;
use hidconsole_transport::{
    DeviceDescriptor, DeviceDiscovery, DeviceFilter, DiscoveryEvent, InboundReport, Transport,
    TransportError,
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::batch::ReportSink;
use crate::frame::{self, Report};
use crate::log::{LogLine, SessionLog};
use crate::queue::OutboundQueue;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Device selection cancelled")]
    UserCancelled,

    #[error("No device open")]
    NotOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Session task has stopped")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NoDevice,
    Connecting,
    Connected,
}

/// Snapshot returned by [`SessionHandle::status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub device: Option<DeviceDescriptor>,
    /// Reports waiting behind the one in flight
    pub queued: usize,
    /// A report is in flight, waiting for any inbound report
    pub sending: bool,
}

/// Device selection affordance
#[async_trait]
pub trait DeviceSelector: Send + Sync {
    /// Pick one of `candidates`; None means the operator dismissed the prompt
    async fn select(&self, candidates: &[DeviceDescriptor]) -> Option<DeviceDescriptor>;
}

/// Selects a fixed position of the candidate list
#[derive(Debug, Clone, Copy)]
pub struct PickIndex(pub usize);

#[async_trait]
impl DeviceSelector for PickIndex {
    async fn select(&self, candidates: &[DeviceDescriptor]) -> Option<DeviceDescriptor> {
        candidates.get(self.0).cloned()
    }
}

type Reply<T> = oneshot::Sender<T>;

/// Messages handled by the session task
#[derive(Debug)]
pub enum SessionEvent {
    Open {
        device: DeviceDescriptor,
        reply: Reply<Result<(), SessionError>>,
    },
    Close {
        reply: Reply<()>,
    },
    Forget {
        reply: Reply<()>,
    },
    Enqueue {
        report: Report,
        reply: Reply<Result<(), SessionError>>,
    },
    /// Write immediately, bypassing the queue (batch path)
    SendNow {
        report: Report,
        reply: Reply<Result<(), SessionError>>,
    },
    Status {
        reply: Reply<SessionStatus>,
    },
    ReconnectPaired {
        reply: Reply<Result<Option<DeviceDescriptor>, SessionError>>,
    },
    /// Inbound report from the transport opened as `generation`
    Inbound {
        generation: u64,
        report: InboundReport,
    },
    DeviceAdded(DeviceDescriptor),
    DeviceRemoved(DeviceDescriptor),
    Shutdown,
}

/// Session state, owned by the session task
pub struct DeviceSession {
    discovery: Arc<dyn DeviceDiscovery>,
    log: Arc<dyn SessionLog>,
    queue: OutboundQueue,
    transport: Option<Arc<dyn Transport>>,
    /// Bumped whenever the transport changes; stale inbound reports are dropped
    generation: u64,
    state_tx: watch::Sender<SessionState>,
    events: mpsc::WeakUnboundedSender<SessionEvent>,
    inbound_task: Option<JoinHandle<()>>,
}

impl DeviceSession {
    fn device_log(&self, line: LogLine) {
        line.trace();
        self.log.device_log(line);
    }

    fn set_state(&self, state: SessionState) {
        self.state_tx.send_if_modified(|s| {
            let changed = *s != state;
            *s = state;
            changed
        });
    }

    fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Dispatch one event. Returns false when the task should exit.
    pub async fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Open { device, reply } => {
                let _ = reply.send(self.on_open(device).await);
            }
            SessionEvent::Close { reply } => {
                self.on_close(false).await;
                let _ = reply.send(());
            }
            SessionEvent::Forget { reply } => {
                self.on_close(true).await;
                let _ = reply.send(());
            }
            SessionEvent::Enqueue { report, reply } => self.on_enqueue(report, reply).await,
            SessionEvent::SendNow { report, reply } => {
                let _ = reply.send(self.on_send_now(report).await);
            }
            SessionEvent::Status { reply } => {
                let _ = reply.send(self.status());
            }
            SessionEvent::ReconnectPaired { reply } => {
                let _ = reply.send(self.on_reconnect_paired().await);
            }
            SessionEvent::Inbound { generation, report } => self.on_inbound(generation, report).await,
            SessionEvent::DeviceAdded(device) => self.on_device_added(device).await,
            SessionEvent::DeviceRemoved(device) => self.on_device_removed(device).await,
            SessionEvent::Shutdown => return false,
        }
        true
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            state: self.state(),
            device: self.transport.as_ref().map(|t| t.device_info().clone()),
            queued: self.queue.len(),
            sending: self.queue.is_sending(),
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    async fn on_open(&mut self, device: DeviceDescriptor) -> Result<(), SessionError> {
        let same = self
            .transport
            .as_ref()
            .map(|t| t.device_info().same_interface(&device));
        if same == Some(true) {
            debug!("{} already open", device.display_name());
            return Ok(());
        }

        // A switch keeps the active device until the new one is open
        let previous = self.state();
        let switching = same.is_some();
        if !switching {
            self.set_state(SessionState::Connecting);
        }
        match self.discovery.open_device(&device).await {
            Ok(transport) => {
                if switching {
                    self.on_close(false).await;
                }
                self.attach(transport);
                self.device_log(LogLine::info(format!(
                    "Device connected: {}",
                    device.display_name()
                )));
                Ok(())
            }
            Err(e) if e.is_state_transition() => {
                debug!("Ignoring open race on {}: {}", device.path, e);
                self.set_state(previous);
                Ok(())
            }
            Err(e) => {
                self.set_state(previous);
                self.device_log(LogLine::error(format!(
                    "Failed to open {}: {}",
                    device.display_name(),
                    e
                )));
                Err(e.into())
            }
        }
    }

    fn attach(&mut self, transport: Arc<dyn Transport>) {
        self.generation += 1;
        self.queue.reset();

        if let Some(rx) = transport.subscribe_reports() {
            self.inbound_task = Some(tokio::spawn(forward_inbound(
                rx,
                self.events.clone(),
                self.generation,
            )));
        } else {
            warn!("{} has no inbound reports", transport.device_info().display_name());
        }

        self.transport = Some(transport);
        self.set_state(SessionState::Connected);
    }

    /// Drop the active transport and return to `NoDevice`
    fn detach(&mut self) -> Option<Arc<dyn Transport>> {
        if let Some(task) = self.inbound_task.take() {
            task.abort();
        }
        self.generation += 1;
        self.queue.reset();
        self.set_state(SessionState::NoDevice);
        self.transport.take()
    }

    /// Best-effort close (or forget). Never fails; errors end up in the log.
    async fn on_close(&mut self, forget: bool) {
        let Some(transport) = self.detach() else {
            return;
        };

        let result = if forget {
            transport.forget().await
        } else {
            transport.close().await
        };
        if let Err(e) = result {
            self.device_log(LogLine::error(format!("Close failed: {e}")));
        }
        self.device_log(LogLine::sys(format!(
            "{} {}",
            transport.device_info().display_name(),
            if forget { "forgotten" } else { "disconnected" }
        )));
    }

    async fn on_reconnect_paired(&mut self) -> Result<Option<DeviceDescriptor>, SessionError> {
        if self.state() == SessionState::Connected {
            return Ok(self.transport.as_ref().map(|t| t.device_info().clone()));
        }

        let paired = self.discovery.list_paired().await?;
        let Some(device) = paired.into_iter().rev().find(|d| d.has_output_reports) else {
            self.device_log(LogLine::info("No device found"));
            return Ok(None);
        };

        self.on_open(device.clone()).await?;
        Ok(self
            .transport
            .as_ref()
            .map(|t| t.device_info().clone())
            .filter(|d| d.same_interface(&device)))
    }

    async fn on_device_added(&mut self, device: DeviceDescriptor) {
        if self.state() == SessionState::Connected {
            debug!("Already connected, ignoring {}", device.display_name());
            return;
        }
        if !device.has_output_reports {
            debug!("{} has no output reports, ignoring", device.display_name());
            return;
        }

        self.queue.reset();
        self.device_log(LogLine::sys(format!(
            "{} attached, reconnecting",
            device.display_name()
        )));
        // Failures are already logged
        let _ = self.on_open(device).await;
    }

    async fn on_device_removed(&mut self, device: DeviceDescriptor) {
        let active = self
            .transport
            .as_ref()
            .is_some_and(|t| t.device_info().same_interface(&device));
        if !active {
            return;
        }

        if let Some(transport) = self.detach() {
            // Releases the reader thread; the device is already gone
            let _ = transport.close().await;
        }
        self.device_log(LogLine::sys(format!(
            "Device disconnected: {}",
            device.display_name()
        )));
    }

    // ========================================================================
    // Outbound path
    // ========================================================================

    fn not_open(&mut self) -> SessionError {
        self.queue.reset();
        self.device_log(LogLine::error("Device not open"));
        SessionError::NotOpen
    }

    async fn on_enqueue(&mut self, report: Report, reply: Reply<Result<(), SessionError>>) {
        if self.transport.is_none() {
            let _ = reply.send(Err(self.not_open()));
            return;
        }

        let next = self.queue.enqueue(report);
        // The caller does not wait for the write
        let _ = reply.send(Ok(()));
        if let Some(report) = next {
            self.transmit(report).await;
        }
    }

    /// Write a queued report; a failure abandons the whole queue
    async fn transmit(&mut self, report: Report) {
        let Some(transport) = self.transport.clone() else {
            self.not_open();
            return;
        };

        match transport.write_report(report.as_bytes()).await {
            Ok(()) => {
                self.device_log(LogLine::info(format!("Data sent: {report}")));
            }
            Err(e) => {
                let dropped = self.queue.on_transport_error();
                self.device_log(LogLine::error(format!(
                    "Send failed: {e} ({dropped} queued reports dropped)"
                )));
            }
        }
    }

    async fn on_send_now(&mut self, report: Report) -> Result<(), SessionError> {
        let Some(transport) = self.transport.clone() else {
            return Err(self.not_open());
        };

        match transport.write_report(report.as_bytes()).await {
            Ok(()) => {
                debug!("Data sent: {}", report);
                Ok(())
            }
            Err(e) => {
                self.queue.on_transport_error();
                self.device_log(LogLine::error(format!("Send failed: {e}")));
                Err(e.into())
            }
        }
    }

    /// Any inbound report doubles as the continue signal for the queue
    async fn on_inbound(&mut self, generation: u64, report: InboundReport) {
        if generation != self.generation {
            debug!("Dropping report from a previous device handle");
            return;
        }

        self.log.report(frame::decode(&report.data));
        if let Some(next) = self.queue.on_continue() {
            self.transmit(next).await;
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        debug!("Device session started");
        while let Some(event) = rx.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        self.on_close(false).await;
        debug!("Device session stopped");
    }
}

async fn forward_inbound(
    mut rx: broadcast::Receiver<InboundReport>,
    events: mpsc::WeakUnboundedSender<SessionEvent>,
    generation: u64,
) {
    loop {
        match rx.recv().await {
            Ok(report) => {
                let Some(tx) = events.upgrade() else { break };
                if tx.send(SessionEvent::Inbound { generation, report }).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Inbound report forwarder lagged, {} reports skipped", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn forward_hotplug(
    mut rx: broadcast::Receiver<DiscoveryEvent>,
    events: mpsc::WeakUnboundedSender<SessionEvent>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(DiscoveryEvent::DeviceAdded(d)) => SessionEvent::DeviceAdded(d),
            Ok(DiscoveryEvent::DeviceRemoved(d)) => SessionEvent::DeviceRemoved(d),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Hot-plug forwarder lagged, {} events skipped", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(tx) = events.upgrade() else { break };
        if tx.send(event).is_err() {
            break;
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable front end of a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Receiver<SessionState>,
    discovery: Arc<dyn DeviceDiscovery>,
}

impl SessionHandle {
    /// Start the session task. Must be called inside a tokio runtime.
    pub fn spawn(discovery: Arc<dyn DeviceDiscovery>, log: Arc<dyn SessionLog>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::NoDevice);

        let session = DeviceSession {
            discovery: Arc::clone(&discovery),
            log,
            queue: OutboundQueue::new(),
            transport: None,
            generation: 0,
            state_tx,
            events: tx.downgrade(),
            inbound_task: None,
        };
        tokio::spawn(session.run(rx));

        Self {
            tx,
            state,
            discovery,
        }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> SessionEvent,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Forward hot-plug events into the session (auto-reconnect / disconnect)
    pub async fn enable_hotplug(&self) -> Result<(), SessionError> {
        let rx = self.discovery.watch().await?;
        tokio::spawn(forward_hotplug(rx, self.tx.downgrade()));
        Ok(())
    }

    /// Offer the devices matching `filters` to `selector`
    ///
    /// Does not touch the session; pass the result to [`open`](Self::open).
    pub async fn request_device(
        &self,
        filters: &[DeviceFilter],
        selector: &dyn DeviceSelector,
    ) -> Result<DeviceDescriptor, SessionError> {
        let candidates = self.discovery.request_selection(filters).await?;
        if candidates.is_empty() {
            return Err(SessionError::UserCancelled);
        }
        selector
            .select(&candidates)
            .await
            .ok_or(SessionError::UserCancelled)
    }

    pub async fn open(&self, device: DeviceDescriptor) -> Result<(), SessionError> {
        self.request(|reply| SessionEvent::Open { device, reply })
            .await?
    }

    pub async fn close(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionEvent::Close { reply }).await
    }

    /// Close and drop the device from the paired set
    pub async fn forget(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionEvent::Forget { reply }).await
    }

    /// Queue a report; returns once it is queued, not once it is written
    pub async fn enqueue(&self, report: Report) -> Result<(), SessionError> {
        self.request(|reply| SessionEvent::Enqueue { report, reply })
            .await?
    }

    /// Write a report now, outside the queue
    pub async fn send_now(&self, report: Report) -> Result<(), SessionError> {
        self.request(|reply| SessionEvent::SendNow { report, reply })
            .await?
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| SessionEvent::Status { reply }).await
    }

    /// Open the most recent paired device that accepts output reports
    pub async fn reconnect_paired(&self) -> Result<Option<DeviceDescriptor>, SessionError> {
        self.request(|reply| SessionEvent::ReconnectPaired { reply })
            .await?
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Close the device and stop the session task
    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionEvent::Shutdown);
    }
}

#[async_trait]
impl ReportSink for SessionHandle {
    async fn send_report(&self, report: &Report) -> Result<(), TransportError> {
        match self.send_now(report.clone()).await {
            Ok(()) => Ok(()),
            Err(SessionError::Transport(e)) => Err(e),
            Err(SessionError::NotOpen) => Err(TransportError::NotOpen),
            Err(e) => Err(TransportError::Internal(e.to_string())),
        }
    }
}

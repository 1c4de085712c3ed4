//! Paced multi-report transmission
//!
//! A batch writes a precomputed list of reports one per interval,
//! fire-and-forget: it does not wait for inbound reports and it does not go
//! through the outbound queue. Write failures are logged and the batch keeps
//! its pace.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hidconsole_transport::TransportError;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::frame::Report;

/// Default pacing between reports
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10);

/// Accepted pacing range in milliseconds
pub const INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 10..=10_000;

/// Destination of batch writes
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn send_report(&self, report: &Report) -> Result<(), TransportError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Nothing to send")]
    Empty,

    #[error("Batch interval must be greater than zero")]
    ZeroInterval,

    #[error("A batch is already in progress")]
    AlreadyRunning,

    #[error("No batch is running")]
    NotRunning,

    #[error("Batch is not paused")]
    NotPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Snapshot of the current (or last) batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchProgress {
    /// Increments on every start
    pub job: u64,
    pub state: BatchState,
    /// Reports handed to the sink so far
    pub sent: usize,
    /// Reports in the batch
    pub total: usize,
    /// Sink writes that failed
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Paused,
}

struct Job {
    control: watch::Sender<RunState>,
    task: JoinHandle<()>,
}

/// Runs at most one batch at a time over a sink
pub struct BatchSender {
    sink: Arc<dyn ReportSink>,
    progress: watch::Sender<BatchProgress>,
    job: Option<Job>,
}

impl BatchSender {
    pub fn new(sink: Arc<dyn ReportSink>) -> Self {
        let (progress, _) = watch::channel(BatchProgress::default());
        Self {
            sink,
            progress,
            job: None,
        }
    }

    /// Current progress
    pub fn progress(&self) -> BatchProgress {
        *self.progress.borrow()
    }

    pub fn state(&self) -> BatchState {
        self.progress.borrow().state
    }

    /// Watch progress updates
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Start sending `reports`, the first one after `interval`
    pub fn start(&mut self, reports: Vec<Report>, interval: Duration) -> Result<(), BatchError> {
        if reports.is_empty() {
            return Err(BatchError::Empty);
        }
        if interval.is_zero() {
            return Err(BatchError::ZeroInterval);
        }
        if self.state() != BatchState::Idle {
            return Err(BatchError::AlreadyRunning);
        }

        let total = reports.len();
        let job_id = self.progress.borrow().job + 1;
        self.progress.send_replace(BatchProgress {
            job: job_id,
            state: BatchState::Running,
            sent: 0,
            total,
            failed: 0,
        });

        let (control, control_rx) = watch::channel(RunState::Running);
        let task = tokio::spawn(run_batch(
            job_id,
            reports,
            interval,
            Arc::clone(&self.sink),
            control_rx,
            self.progress.clone(),
        ));

        if let Some(old) = self.job.replace(Job { control, task }) {
            old.task.abort();
        }
        info!(
            "Batch {} started: {} reports every {}ms",
            job_id,
            total,
            interval.as_millis()
        );
        Ok(())
    }

    /// Hold the batch at its current index
    pub fn pause(&mut self) -> Result<(), BatchError> {
        if self.state() != BatchState::Running {
            return Err(BatchError::NotRunning);
        }
        self.set_run_state(RunState::Paused, BatchState::Paused);
        debug!("Batch paused at {}", self.progress().sent);
        Ok(())
    }

    /// Continue a paused batch, next report after one full interval
    pub fn resume(&mut self) -> Result<(), BatchError> {
        if self.state() != BatchState::Paused {
            return Err(BatchError::NotPaused);
        }
        self.set_run_state(RunState::Running, BatchState::Running);
        debug!("Batch resumed at {}", self.progress().sent);
        Ok(())
    }

    /// Cancel the pending tick, drop the remaining reports and go idle
    pub fn stop(&mut self) {
        if let Some(job) = self.job.take() {
            job.task.abort();
        }
        let stopped = self.progress.send_if_modified(|p| {
            let was_active = p.state != BatchState::Idle;
            p.state = BatchState::Idle;
            p.sent = 0;
            p.total = 0;
            p.failed = 0;
            was_active
        });
        if stopped {
            info!("Batch stopped");
        }
    }

    /// Wait until the batch completes or is stopped
    pub async fn wait_idle(&self) -> BatchProgress {
        let mut rx = self.progress.subscribe();
        let progress = match rx.wait_for(|p| p.state == BatchState::Idle).await {
            Ok(progress) => *progress,
            Err(_) => self.progress(),
        };
        progress
    }

    fn set_run_state(&self, run: RunState, state: BatchState) {
        if let Some(job) = &self.job {
            job.control.send_replace(run);
        }
        self.progress.send_modify(|p| p.state = state);
    }
}

impl Drop for BatchSender {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.task.abort();
        }
    }
}

async fn run_batch(
    job: u64,
    reports: Vec<Report>,
    interval: Duration,
    sink: Arc<dyn ReportSink>,
    mut control: watch::Receiver<RunState>,
    progress: watch::Sender<BatchProgress>,
) {
    let total = reports.len();
    let mut index = 0;

    while index < total {
        if *control.borrow_and_update() == RunState::Paused {
            if control.changed().await.is_err() {
                return;
            }
            continue;
        }

        // A pause or resume restarts the wait with a fresh interval
        tokio::select! {
            biased;
            changed = control.changed() => {
                if changed.is_err() {
                    return;
                }
                continue;
            }
            _ = tokio::time::sleep(interval) => {}
        }
        if *control.borrow() != RunState::Running {
            continue;
        }

        let result = sink.send_report(&reports[index]).await;
        index += 1;
        if let Err(e) = &result {
            warn!("Batch report {}/{} failed: {}", index, total, e);
        }

        let failed = result.is_err();
        let done = index == total;
        progress.send_if_modified(|p| {
            // Stopped or superseded while the write was in flight
            if p.job != job || p.state == BatchState::Idle {
                return false;
            }
            p.sent = index;
            if failed {
                p.failed += 1;
            }
            if done {
                p.state = BatchState::Idle;
            }
            true
        });
    }

    info!("Batch {} complete: {} reports", job, total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn send_report(&self, report: &Report) -> Result<(), TransportError> {
            self.writes.lock().push(report.as_bytes().to_vec());
            Ok(())
        }
    }

    fn reports(n: u8) -> Vec<Report> {
        (0..n).map(|i| Report::padded(&[i], 2).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_start_rejects_bad_input() {
        let mut batch = BatchSender::new(Arc::new(RecordingSink::default()));
        assert_eq!(
            batch.start(Vec::new(), DEFAULT_INTERVAL),
            Err(BatchError::Empty)
        );
        assert_eq!(
            batch.start(reports(1), Duration::ZERO),
            Err(BatchError::ZeroInterval)
        );
        batch.start(reports(2), DEFAULT_INTERVAL).unwrap();
        assert_eq!(
            batch.start(reports(2), DEFAULT_INTERVAL),
            Err(BatchError::AlreadyRunning)
        );
        batch.stop();
    }

    #[tokio::test]
    async fn test_pause_resume_require_matching_state() {
        let mut batch = BatchSender::new(Arc::new(RecordingSink::default()));
        assert_eq!(batch.pause(), Err(BatchError::NotRunning));
        assert_eq!(batch.resume(), Err(BatchError::NotPaused));

        batch.start(reports(3), Duration::from_secs(1)).unwrap();
        assert_eq!(batch.resume(), Err(BatchError::NotPaused));
        batch.pause().unwrap();
        assert_eq!(batch.state(), BatchState::Paused);
        assert_eq!(batch.pause(), Err(BatchError::NotRunning));
        batch.resume().unwrap();
        assert_eq!(batch.state(), BatchState::Running);
    }

    #[tokio::test]
    async fn test_stop_resets_progress() {
        let mut batch = BatchSender::new(Arc::new(RecordingSink::default()));
        batch.start(reports(3), Duration::from_secs(1)).unwrap();
        batch.stop();
        let progress = batch.progress();
        assert_eq!(progress.state, BatchState::Idle);
        assert_eq!((progress.sent, progress.total), (0, 0));
        // Idle again, a new batch may start
        batch.start(reports(1), DEFAULT_INTERVAL).unwrap();
        assert_eq!(batch.progress().job, 2);
    }
}

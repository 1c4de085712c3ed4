//! Batch send command handler.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hidconsole::batch::INTERVAL_RANGE_MS;
use hidconsole::store::{BATCH_INTERVAL_KEY, DEFAULT_NAMESPACE};
use hidconsole::{
    chunk_file, split_hex_text, BatchSender, BatchState, ConsoleConfig, KeyValueStore, Report,
    StdoutLog,
};

use super::{connect, start_session};

/// Resolve the batch interval: explicit value (remembered), stored value, config
pub fn resolve_interval(
    store: &mut KeyValueStore,
    config: &ConsoleConfig,
    explicit: Option<u64>,
) -> Result<Duration> {
    let ms = match explicit {
        Some(ms) => {
            if !INTERVAL_RANGE_MS.contains(&ms) {
                anyhow::bail!(
                    "Interval must be within {}..={} ms",
                    INTERVAL_RANGE_MS.start(),
                    INTERVAL_RANGE_MS.end()
                );
            }
            store.set(BATCH_INTERVAL_KEY, &ms)?;
            ms
        }
        None => store
            .get::<u64>(BATCH_INTERVAL_KEY)
            .filter(|ms| INTERVAL_RANGE_MS.contains(ms))
            .unwrap_or(config.batch_interval_ms),
    };
    Ok(Duration::from_millis(ms))
}

/// Load the reports for a batch from hex text or a file
pub fn load_reports(config: &ConsoleConfig, hex: Option<&str>, file: Option<&Path>) -> Result<Vec<Report>> {
    let reports = match (hex, file) {
        (_, Some(path)) => chunk_file(path, config.report_size)?,
        (Some(text), None) => split_hex_text(text, config.report_size)?,
        (None, None) => anyhow::bail!("Nothing to send"),
    };
    Ok(reports)
}

pub async fn run(
    config: &ConsoleConfig,
    hex: Option<&str>,
    file: Option<&Path>,
    interval: Option<u64>,
    device: Option<usize>,
) -> Result<()> {
    let reports = load_reports(config, hex, file)?;
    let mut store = KeyValueStore::open(&KeyValueStore::default_dir(), DEFAULT_NAMESPACE)?;
    let interval = resolve_interval(&mut store, config, interval)?;

    let session = start_session(config, Arc::new(StdoutLog))?;
    let chosen = connect(&session, config, device).await?;

    // Set up Ctrl+C handler
    let interrupted = Arc::new(AtomicBool::new(false));
    let int_clone = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        int_clone.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    println!(
        "Sending {} reports to {} every {}ms (Ctrl+C = stop)",
        reports.len(),
        chosen.display_name(),
        interval.as_millis()
    );

    let mut batch = BatchSender::new(Arc::new(session.clone()));
    batch.start(reports, interval)?;
    let mut progress = batch.subscribe();

    loop {
        if interrupted.load(Ordering::SeqCst) {
            batch.stop();
            println!("\nStopped.");
            break;
        }

        let p = *progress.borrow_and_update();
        print!("\r  {}/{}", p.sent, p.total);
        let _ = std::io::stdout().flush();
        if p.state == BatchState::Idle {
            println!();
            if p.failed > 0 {
                eprintln!("{} reports failed", p.failed);
            }
            break;
        }
        let _ = tokio::time::timeout(Duration::from_millis(100), progress.changed()).await;
    }

    session.close().await?;
    session.shutdown();
    Ok(())
}

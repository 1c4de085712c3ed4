//! Interactive console.
//!
//! Plain lines are hex payloads for the outbound queue; lines starting
//! with `:` are console commands. Inbound reports print as they arrive.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hidconsole::store::DEFAULT_NAMESPACE;
use hidconsole::{
    split_hex_text, BatchSender, ConsoleConfig, FrameCodec, KeyValueStore, SessionHandle,
    ShortcutBook, StdoutLog,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::batch::{load_reports, resolve_interval};
use super::connect;

const HELP: &str = "\
  <hex>             queue one report (e.g. F5 05 31)
  :open [index]     select and open a device
  :close            close the device
  :forget           close the device and forget it
  :status           show connection, queue and batch state
  :batch <hex>      send hex text as a paced batch
  :batch @<file>    send a file as a paced batch
  :pause / :resume  pause or resume the batch
  :stop             stop the batch
  :interval [ms]    show or set the batch interval
  :run <name>       queue a saved shortcut
  :help             this text
  :quit             leave";

struct Console<'a> {
    config: &'a ConsoleConfig,
    codec: FrameCodec,
    session: SessionHandle,
    batch: BatchSender,
    store: KeyValueStore,
    interval: Duration,
}

impl Console<'_> {
    async fn queue_hex(&self, text: &str) -> Result<()> {
        let report = self.codec.encode(text)?;
        self.session.enqueue(report).await?;
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let status = self.session.status().await?;
        match &status.device {
            Some(d) => println!("  {:?}: {}", status.state, d.display_name()),
            None => println!("  {:?}", status.state),
        }
        println!(
            "  queue: {} waiting{}",
            status.queued,
            if status.sending { ", 1 in flight" } else { "" }
        );
        let p = self.batch.progress();
        println!(
            "  batch: {:?} {}/{} every {}ms",
            p.state,
            p.sent,
            p.total,
            self.interval.as_millis()
        );
        Ok(())
    }

    fn start_batch(&mut self, arg: &str) -> Result<()> {
        let reports = match arg.strip_prefix('@') {
            Some(path) => load_reports(self.config, None, Some(Path::new(path.trim())))?,
            None => split_hex_text(arg, self.config.report_size)?,
        };
        println!("  batch of {} reports", reports.len());
        self.batch.start(reports, self.interval)?;
        Ok(())
    }

    fn set_interval(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            println!("  {}ms", self.interval.as_millis());
            return Ok(());
        }
        let ms: u64 = arg.parse()?;
        self.interval = resolve_interval(&mut self.store, self.config, Some(ms))?;
        Ok(())
    }

    async fn run_shortcut(&mut self, name: &str) -> Result<()> {
        let command = {
            let book = ShortcutBook::load(&mut self.store);
            match book.get(name) {
                Some(s) => s.command.clone(),
                None => anyhow::bail!("No shortcut named '{name}'"),
            }
        };
        self.queue_hex(&command).await
    }

    /// Handle one input line. Returns false on `:quit`.
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        let Some(command) = line.strip_prefix(':') else {
            self.queue_hex(line).await?;
            return Ok(true);
        };

        let (cmd, arg) = command
            .split_once(char::is_whitespace)
            .map(|(c, a)| (c, a.trim()))
            .unwrap_or((command, ""));
        match cmd {
            "open" | "o" => {
                let index = if arg.is_empty() { None } else { Some(arg.parse()?) };
                connect(&self.session, self.config, index).await?;
            }
            "close" => self.session.close().await?,
            "forget" => self.session.forget().await?,
            "status" | "s" => self.status().await?,
            "batch" | "b" => self.start_batch(arg)?,
            "pause" => self.batch.pause()?,
            "resume" => self.batch.resume()?,
            "stop" => self.batch.stop(),
            "interval" => self.set_interval(arg)?,
            "run" | "r" => self.run_shortcut(arg).await?,
            "help" | "h" | "?" => println!("{HELP}"),
            "quit" | "q" | "exit" => return Ok(false),
            other => println!("  unknown command ':{other}' (:help)"),
        }
        Ok(true)
    }
}

/// Connect before the first prompt. Failures are reported; the console starts regardless.
async fn initial_connect(session: &SessionHandle, config: &ConsoleConfig, device: Option<usize>) {
    match device {
        Some(_) => {
            if let Err(e) = connect(session, config, device).await {
                eprintln!("{e}");
            }
        }
        None => {
            if let Err(e) = session.reconnect_paired().await {
                warn!("Initial device scan failed: {}", e);
            }
        }
    }
}

pub async fn run(config: &ConsoleConfig, device: Option<usize>) -> Result<()> {
    let mut store = KeyValueStore::open(&KeyValueStore::default_dir(), DEFAULT_NAMESPACE)?;
    let interval = resolve_interval(&mut store, config, None)?;

    let session = super::start_session(config, Arc::new(StdoutLog))?;
    if let Err(e) = session.enable_hotplug().await {
        warn!("Hot-plug monitoring unavailable: {}", e);
    }

    initial_connect(&session, config, device).await;

    let mut console = Console {
        config,
        codec: config.codec()?,
        batch: BatchSender::new(Arc::new(session.clone())),
        session,
        store,
        interval,
    };

    println!("Type :help for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console.handle_line(&line).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("  {e}"),
        }
    }

    console.batch.stop();
    console.session.close().await?;
    console.session.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hidconsole::{MemoryLog, SessionState};
    use hidconsole_transport::mock::{descriptor, MockDiscovery};
    use hidconsole_transport::{DeviceDiscovery, TransportError};

    #[tokio::test]
    async fn failed_initial_scan_leaves_session_usable() {
        let mock = Arc::new(MockDiscovery::new());
        mock.insert_device(descriptor(0xCAFE, 0x8010, "/dev/hidraw7"));
        mock.fail_next_list(TransportError::HidError("enumeration failed".into()));
        let discovery: Arc<dyn DeviceDiscovery> = mock.clone();
        let session = SessionHandle::spawn(discovery, Arc::new(MemoryLog::new()));
        let config = ConsoleConfig::default();

        initial_connect(&session, &config, None).await;
        assert_eq!(session.state(), SessionState::NoDevice);

        // A bad index is reported, not fatal
        initial_connect(&session, &config, Some(9)).await;
        assert_eq!(session.state(), SessionState::NoDevice);

        initial_connect(&session, &config, None).await;
        assert_eq!(session.state(), SessionState::Connected);
    }
}

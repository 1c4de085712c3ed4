//! Operator-facing log sinks
//!
//! The session writes two streams: a device log of connection/send/error
//! lines and a receive log with one decoded line per inbound report. How
//! they are shown is up to the sink.

use std::fmt;

use parking_lot::Mutex;

/// Device log line category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Error,
    Sys,
}

impl LogKind {
    pub fn tag(&self) -> &'static str {
        match self {
            LogKind::Info => "INFO",
            LogKind::Error => "ERROR",
            LogKind::Sys => "SYS",
        }
    }
}

/// One device log line, rendered as `[TAG] text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
}

impl LogLine {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(LogKind::Info, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(LogKind::Error, text)
    }

    pub fn sys(text: impl Into<String>) -> Self {
        Self::new(LogKind::Sys, text)
    }

    /// Mirror the line into `tracing`
    pub fn trace(&self) {
        match self.kind {
            LogKind::Info => tracing::info!("{}", self.text),
            LogKind::Error => tracing::error!("{}", self.text),
            LogKind::Sys => tracing::debug!("{}", self.text),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.tag(), self.text)
    }
}

/// Append-only sink for session output
pub trait SessionLog: Send + Sync {
    /// Connection, send and error events
    fn device_log(&self, line: LogLine);

    /// Decoded inbound report
    fn report(&self, text: String);
}

/// Keeps both streams in memory
#[derive(Debug, Default)]
pub struct MemoryLog {
    device: Mutex<Vec<LogLine>>,
    reports: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device_lines(&self) -> Vec<LogLine> {
        self.device.lock().clone()
    }

    pub fn report_lines(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    /// Whether any device line of `kind` contains `needle`
    pub fn contains(&self, kind: LogKind, needle: &str) -> bool {
        self.device
            .lock()
            .iter()
            .any(|l| l.kind == kind && l.text.contains(needle))
    }

    pub fn clear(&self) {
        self.device.lock().clear();
        self.reports.lock().clear();
    }
}

impl SessionLog for MemoryLog {
    fn device_log(&self, line: LogLine) {
        self.device.lock().push(line);
    }

    fn report(&self, text: String) {
        self.reports.lock().push(text);
    }
}

/// Prints both streams to stdout (receive lines prefixed with `<<`)
#[derive(Debug, Default)]
pub struct StdoutLog;

impl SessionLog for StdoutLog {
    fn device_log(&self, line: LogLine) {
        println!("{line}");
    }

    fn report(&self, text: String) {
        println!("<< {text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_rendering() {
        assert_eq!(LogLine::info("data sent").to_string(), "[INFO] data sent");
        assert_eq!(LogLine::error("send failed").to_string(), "[ERROR] send failed");
        assert_eq!(LogLine::sys("disconnected").to_string(), "[SYS] disconnected");
    }

    #[test]
    fn test_memory_log_streams() {
        let log = MemoryLog::new();
        log.device_log(LogLine::info("Device connected"));
        log.report("F5 05".into());
        assert!(log.contains(LogKind::Info, "connected"));
        assert!(!log.contains(LogKind::Error, "connected"));
        assert_eq!(log.report_lines(), vec!["F5 05".to_string()]);
        log.clear();
        assert!(log.device_lines().is_empty());
        assert!(log.report_lines().is_empty());
    }
}

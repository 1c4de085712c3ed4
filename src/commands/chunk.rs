//! Offline framing commands (no device needed).

use std::path::Path;

use anyhow::Result;
use hidconsole::{chunk_file, preview, ConsoleConfig};

/// Print the framed report for `hex`
pub fn encode(config: &ConsoleConfig, hex: &str) -> Result<()> {
    let report = config.codec()?.encode(hex)?;
    println!("{report}");
    Ok(())
}

/// Print `file` as report-sized chunks
pub fn chunk(config: &ConsoleConfig, file: &Path, size: Option<usize>) -> Result<()> {
    let size = size.unwrap_or(config.report_size);
    let chunks = chunk_file(file, size)?;
    eprintln!(
        "{}: {} chunks of {} bytes",
        file.display(),
        chunks.len(),
        size
    );
    if !chunks.is_empty() {
        println!("{}", preview(&chunks));
    }
    Ok(())
}

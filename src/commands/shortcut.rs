//! Shortcut command handlers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use hidconsole::store::DEFAULT_NAMESPACE;
use hidconsole::{ConsoleConfig, KeyValueStore, ShortcutBook, StdoutLog};

use super::{connect, start_session};

fn open_store() -> Result<KeyValueStore> {
    Ok(KeyValueStore::open(
        &KeyValueStore::default_dir(),
        DEFAULT_NAMESPACE,
    )?)
}

pub fn list() -> Result<()> {
    let mut store = open_store()?;
    let book = ShortcutBook::load(&mut store);
    if book.list().is_empty() {
        println!("No shortcuts saved");
        return Ok(());
    }
    let width = book.list().iter().map(|s| s.name.len()).max().unwrap_or(0);
    for shortcut in book.list() {
        println!("  {:width$}  {}", shortcut.name, shortcut.command);
    }
    Ok(())
}

pub fn add(config: &ConsoleConfig, name: &str, command: &str) -> Result<()> {
    // Only store commands that would frame
    config.codec()?.encode(command)?;

    let mut store = open_store()?;
    let mut book = ShortcutBook::load(&mut store);
    book.upsert(name, command)?;
    println!("Saved '{}'", name.trim());
    Ok(())
}

pub fn remove(name: &str) -> Result<()> {
    let mut store = open_store()?;
    let mut book = ShortcutBook::load(&mut store);
    let removed = book.remove(name)?;
    println!("Removed '{}' ({})", removed.name, removed.command);
    Ok(())
}

pub async fn send(config: &ConsoleConfig, name: &str, device: Option<usize>) -> Result<()> {
    let command = {
        let mut store = open_store()?;
        let book = ShortcutBook::load(&mut store);
        match book.get(name) {
            Some(shortcut) => shortcut.command.clone(),
            None => anyhow::bail!("No shortcut named '{name}'"),
        }
    };
    let report = config.codec()?.encode(&command)?;

    let session = start_session(config, Arc::new(StdoutLog))?;
    connect(&session, config, device).await?;
    session.enqueue(report).await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    session.close().await?;
    session.shutdown();
    Ok(())
}

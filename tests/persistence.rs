//! Config and key/value store round trips through the filesystem.

use hidconsole::store::{BATCH_INTERVAL_KEY, SHORTCUTS_KEY};
use hidconsole::{ConfigError, ConsoleConfig, KeyValueStore, ShortcutBook, StoreError};

#[test]
fn missing_config_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConsoleConfig::load(&dir.path().join("config.toml")).unwrap();
    assert_eq!(config, ConsoleConfig::default());
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = ConsoleConfig {
        report_size: 64,
        report_id: 2,
        batch_interval_ms: 250,
        ..Default::default()
    };
    config.save(&path).unwrap();
    assert_eq!(ConsoleConfig::load(&path).unwrap(), config);
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "batch_interval_ms = 20000\n").unwrap();
    assert!(matches!(
        ConsoleConfig::load(&path),
        Err(ConfigError::Invalid(_))
    ));

    std::fs::write(&path, "report_size = \"big\"\n").unwrap();
    assert!(matches!(ConsoleConfig::load(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn shortcuts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = KeyValueStore::open(dir.path(), "settings").unwrap();
        let mut book = ShortcutBook::load(&mut store);
        book.upsert("ping", "F5 05 31").unwrap();
        book.upsert("reset", "F5 00").unwrap();
        book.remove("ping").unwrap();
        store.set(BATCH_INTERVAL_KEY, &250u64).unwrap();
    }

    let mut store = KeyValueStore::open(dir.path(), "settings").unwrap();
    assert_eq!(store.get::<u64>(BATCH_INTERVAL_KEY), Some(250));
    // Stored as a JSON-encoded list of {name, command}
    let raw = store.get_raw(SHORTCUTS_KEY).unwrap().to_string();
    assert_eq!(raw, r#"[{"name":"reset","command":"F5 00"}]"#);

    let mut book = ShortcutBook::load(&mut store);
    assert_eq!(book.list().len(), 1);
    assert!(matches!(
        book.remove("ping"),
        Err(StoreError::UnknownShortcut(_))
    ));
}

#[test]
fn corrupt_store_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ not json").unwrap();

    let mut store = KeyValueStore::open(dir.path(), "settings").unwrap();
    assert!(ShortcutBook::load(&mut store).list().is_empty());
}

#[test]
fn namespaces_are_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = KeyValueStore::open(dir.path(), "a").unwrap();
    a.set(BATCH_INTERVAL_KEY, &100u64).unwrap();

    let b = KeyValueStore::open(dir.path(), "b").unwrap();
    assert_eq!(b.get::<u64>(BATCH_INTERVAL_KEY), None);
    assert!(dir.path().join("a.json").exists());
}

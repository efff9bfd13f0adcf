//! Integration tests for the config store functionality.

#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use serde_json::{Value, json};
use stratum::{
    Format,
    config_store::{ConfigStore, Mapping},
};
use tempfile::TempDir;

fn create_test_config(temp_dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let path = temp_dir.path().join(filename);
    fs::write(&path, content).unwrap();
    path
}

fn map(value: Value) -> Mapping {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Rewrites `path` and dates its mtime ahead so the watcher sees it as newer
/// than any refresh that raced with the write.
fn write_newer(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(1))
        .unwrap();
}

async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

mod basic_operations {
    use super::*;

    #[test]
    fn loads_yaml_with_all_value_types() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(
            &temp,
            "config.yaml",
            r#"
general:
  log_level: debug
  ratio: 0.5
modules:
  battery:
    enabled: true
  clock:
    formats: ["%H:%M", "%I:%M %p"]
"#,
        );

        let store = ConfigStore::open(path).unwrap();

        assert_eq!(store.format(), Format::Yaml);
        assert_eq!(store.get("general.log_level"), Some(json!("debug")));
        assert_eq!(store.get("general.ratio"), Some(json!(0.5)));
        assert_eq!(store.get("modules.battery.enabled"), Some(json!(true)));
        assert_eq!(store.get("modules.clock.formats[-1]"), Some(json!("%I:%M %p")));
    }

    #[test]
    fn loads_toml_tables() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(
            &temp,
            "config.toml",
            "[server]\nhost = \"localhost\"\nport = 8080\n",
        );

        let store = ConfigStore::open(path).unwrap();

        assert_eq!(store.format(), Format::Toml);
        assert_eq!(store.get_as::<u16>("server.port").unwrap(), 8080);
    }

    #[test]
    fn end_to_end_layer_precedence() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::builder(temp.path().join("app.json"))
            .defaults(map(json!({"timeout": 30})))
            .build()
            .unwrap();

        assert_eq!(store.get("timeout"), Some(json!(30)));

        store.set("timeout", 60).unwrap();
        assert_eq!(store.get("timeout"), Some(json!(60)));

        store.set_overlay(map(json!({"timeout": 5}))).unwrap();
        assert_eq!(store.get("timeout"), Some(json!(5)));
    }

    #[test]
    fn clones_share_state() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", "{}");
        let store = ConfigStore::open(path).unwrap();
        let clone = store.clone();

        store.set("shared", true).unwrap();

        assert_eq!(clone.get("shared"), Some(json!(true)));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_file_is_empty_configuration() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::open(temp.path().join("absent.yaml")).unwrap();

        assert!(store.as_map().is_empty());
        assert_eq!(store.format(), Format::Yaml);
    }

    #[test]
    fn malformed_file_is_empty_configuration() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "broken.json", "{\"unterminated\": ");

        let store = ConfigStore::builder(path).format(Format::Json).build().unwrap();

        assert!(store.as_map().is_empty());
    }

    #[test]
    fn strict_keys_reject_numeric_yaml_keys() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "keys.yaml", "1: one\nname: x\n");

        let lenient = ConfigStore::open(&path).unwrap();
        assert_eq!(lenient.get("1"), Some(json!("one")));

        let strict = ConfigStore::builder(&path)
            .stringify_keys(false)
            .build()
            .unwrap();
        assert!(strict.as_map().is_empty());
    }

    #[test]
    fn invalid_paths_are_noops() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"a": 1}"#);
        let store = ConfigStore::open(path).unwrap();

        store.set("a[", 2).unwrap();
        assert_eq!(store.get("a["), None);
        store.set("list[9223372036854775807]", 2).unwrap();
        assert_eq!(store.get("list"), None);
        assert!(store.delete("/(/").unwrap().is_empty());
        assert_eq!(store.get("a"), Some(json!(1)));
    }
}

mod reloading {
    use super::*;

    #[test]
    fn reload_without_changes_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"a": {"b": [1, 2]}, "c": "x"}"#);
        let store = ConfigStore::open(path).unwrap();

        store.reload().unwrap();
        let first = store.as_map();
        store.reload().unwrap();

        assert_eq!(store.as_map(), first);
    }

    #[test]
    fn default_reload_discards_memory_writes() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"shared": "disk"}"#);
        let store = ConfigStore::open(path).unwrap();

        store.set("shared", "memory").unwrap();
        store.set("only_memory", 1).unwrap();
        store.reload().unwrap();

        assert_eq!(store.get("shared"), Some(json!("disk")));
        assert_eq!(store.get("only_memory"), None);
    }

    #[test]
    fn prefer_memory_keeps_memory_value() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"shared": "disk", "d": 1}"#);
        let store = ConfigStore::builder(path)
            .persist_memory(true)
            .prefer_memory(true)
            .build()
            .unwrap();

        store.set("shared", "memory").unwrap();
        store.set("m", 2).unwrap();
        store.reload().unwrap();

        assert_eq!(store.get("shared"), Some(json!("memory")));
        assert_eq!(store.get("d"), Some(json!(1)));
        assert_eq!(store.get("m"), Some(json!(2)));
    }

    #[test]
    fn prefer_disk_lets_file_win() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"shared": "disk"}"#);
        let store = ConfigStore::builder(path)
            .persist_memory(true)
            .build()
            .unwrap();

        store.set("shared", "memory").unwrap();
        store.set("m", 2).unwrap();
        store.reload().unwrap();

        assert_eq!(store.get("shared"), Some(json!("disk")));
        assert_eq!(store.get("m"), Some(json!(2)));
    }

    #[test]
    fn reload_reports_file_changes_to_listeners() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"db": {"host": "a", "port": 1}}"#);
        let store = ConfigStore::open(&path).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        store
            .on("db.port", move |matched, _| {
                assert_eq!(matched.first(), Some(&json!(2)));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        fs::write(&path, r#"{"db": {"host": "a", "port": 2}}"#).unwrap();
        store.reload().unwrap();
        store.reload().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

mod persistence {
    use super::*;

    #[test]
    fn sync_down_saves_every_write() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.json");
        let store = ConfigStore::builder(&path).sync_down(true).build().unwrap();

        store.set("server.port", 8080).unwrap();
        assert_eq!(read_json(&path), json!({"server": {"port": 8080}}));

        store.delete("server.port").unwrap();
        assert_eq!(read_json(&path), json!({"server": {}}));
    }

    #[test]
    fn save_writes_effective_configuration() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let store = ConfigStore::builder(&path)
            .defaults(map(json!({"d": 1})))
            .overlay(map(json!({"o": 3})))
            .build()
            .unwrap();

        store.set("c", 2).unwrap();
        store.save().unwrap();

        assert_eq!(read_json(&path), json!({"d": 1, "c": 2, "o": 3}));
    }

    #[test]
    fn yaml_round_trips_through_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");
        let store = ConfigStore::builder(&path).sync_down(true).build().unwrap();

        store.set("list", json!(["a", "b"])).unwrap();
        store.set("nested.flag", false).unwrap();

        let reopened = ConfigStore::open(&path).unwrap();
        assert_eq!(reopened.format(), Format::Yaml);
        assert_eq!(reopened.as_map(), store.as_map());
    }

    #[test]
    fn toml_save_fails_on_null() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let store = ConfigStore::open(&path).unwrap();

        store.set("missing", Value::Null).unwrap();

        assert!(store.save().is_err());
        assert!(!path.exists());
    }
}

mod file_watching {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn external_edit_is_picked_up() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"value": 1}"#);
        let store = ConfigStore::builder(&path)
            .sync_up(true)
            .interval(Duration::from_millis(50))
            .build()
            .unwrap();

        assert!(store.watching());
        let first_refresh = store.last_refresh().unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        write_newer(&path, r#"{"value": 2}"#);

        assert!(
            wait_for(Duration::from_secs(2), || store.get("value") == Some(json!(2))).await,
            "external edit was not reloaded"
        );
        assert!(store.last_refresh().unwrap() > first_refresh);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn filesystem_events_wake_the_watcher() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.yaml", "value: 1\n");
        let store = ConfigStore::builder(&path)
            .sync_up(true)
            .fs_events(true)
            .interval(Duration::from_secs(1))
            .build()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        write_newer(&path, "value: 2\n");

        assert!(
            wait_for(Duration::from_secs(3), || store.get("value") == Some(json!(2))).await,
            "external edit was not reloaded"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn subscription_sees_external_edit() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"db": {"port": 1}}"#);
        let store = ConfigStore::builder(&path)
            .interval(Duration::from_millis(50))
            .build()
            .unwrap();
        let mut subscription = store.subscribe("db").unwrap();
        store.set_sync_up(true).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        write_newer(&path, r#"{"db": {"port": 2}}"#);

        let change = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(change.path, "db.port");
        assert_eq!(change.old_value, Some(json!(1)));
        assert_eq!(change.new_value, json!(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabling_sync_up_stops_the_watcher() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", r#"{"value": 1}"#);
        let store = ConfigStore::builder(&path)
            .sync_up(true)
            .interval(Duration::from_millis(20))
            .build()
            .unwrap();

        store.set_sync_up(false).unwrap();
        assert!(!store.watching());
        assert!(!store.sync_up());

        tokio::time::sleep(Duration::from_millis(50)).await;
        fs::write(&path, r#"{"value": 2}"#).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.get("value"), Some(json!(1)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restarting_watcher_skips_unchanged_file() {
        let temp = TempDir::new().unwrap();
        let path = create_test_config(&temp, "config.json", "{}");
        let reloads = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&reloads);
        let store = ConfigStore::builder(&path)
            .sync(true)
            .interval(Duration::from_millis(20))
            .on_reload(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();

        store.set_sync_up(true).unwrap();
        store.sync(true).unwrap();
        assert!(store.watching());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }
}

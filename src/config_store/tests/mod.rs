//! Unit tests for config_store module
//! Pure data-structure tests; store tests use temporary directories.

#![allow(clippy::panic)]

mod path_ops;

use serde_json::{Value, json};

use crate::config_store::{ConfigChange, ConfigError, ListenerFailure, Mapping};

pub(super) fn map(value: Value) -> Mapping {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn config_change_new() {
    let change = ConfigChange::new("test.path".to_string(), Some(json!("old")), json!("new"));

    assert_eq!(change.path, "test.path");
    assert_eq!(change.old_value, Some(json!("old")));
    assert_eq!(change.new_value, json!("new"));
    assert!(change.timestamp.elapsed().as_secs() < 1);
}

#[test]
fn config_change_new_field() {
    let change = ConfigChange::new("modules.new_module".to_string(), None, json!(true));

    assert_eq!(change.old_value, None);
    assert_eq!(change.new_value, json!(true));
}

#[test]
fn config_change_extract() {
    let change = ConfigChange::new("pool.size".to_string(), Some(json!(4)), json!(8));
    assert_eq!(change.extract::<u32>().unwrap(), 8);

    let err = change.extract::<String>().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::TypeMismatch { ref path, .. } if path == "pool.size"
    ));
}

#[test]
fn config_change_as_string() {
    let change = ConfigChange::new("name".to_string(), None, json!("stratum"));
    assert_eq!(change.as_string(), Some("stratum".to_string()));

    let change = ConfigChange::new("port".to_string(), None, json!(80));
    assert_eq!(change.as_string(), None);
}

#[test]
fn config_error_variants() {
    let error = ConfigError::InvalidPath("test.invalid.path".to_string());
    assert!(matches!(error, ConfigError::InvalidPath(_)));

    let error = ConfigError::LockError {
        lock_type: "read".to_string(),
        details: "lock poisoned".to_string(),
    };
    assert_eq!(error.to_string(), "failed to acquire read lock: lock poisoned");

    let error = ConfigError::SerializationError {
        content_type: "toml".to_string(),
        details: "invalid syntax".to_string(),
    };
    assert!(matches!(error, ConfigError::SerializationError { .. }));
}

#[test]
fn listener_failures_message_lists_each_failure() {
    let error = ConfigError::ListenerFailures(vec![
        ListenerFailure {
            listener: "db.*".to_string(),
            details: "boom".to_string(),
        },
        ListenerFailure {
            listener: "on_change".to_string(),
            details: "panicked: oops".to_string(),
        },
    ]);

    assert_eq!(
        error.to_string(),
        "2 listener(s) failed: db.*: boom; on_change: panicked: oops"
    );
}

//! Unit tests for CLI module
//!
//! Tests command registry, value parsing and formatting against stores
//! backed by temporary files.

use std::fs;

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::cli::{
    CliError, CliService, CommandRegistry, SetCommand,
    formatting::{format_change, format_value},
};
use crate::config_store::{ConfigChange, ConfigStore};

fn store_with(dir: &TempDir, name: &str, contents: &str) -> ConfigStore {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    ConfigStore::open(path).unwrap()
}

#[test]
fn format_value_scalars() {
    assert_eq!(format_value(&json!("hello world")), "\"hello world\"");
    assert_eq!(format_value(&json!("")), "\"\"");
    assert_eq!(format_value(&json!(42)), "42");
    assert_eq!(format_value(&json!(-2.5)), "-2.5");
    assert_eq!(format_value(&json!(true)), "true");
    assert_eq!(format_value(&Value::Null), "null");
}

#[test]
fn format_value_containers_are_compact_json() {
    assert_eq!(format_value(&json!([1, 2, 3])), "[1,2,3]");
    assert_eq!(format_value(&json!({"a": {"b": 1}})), "{\"a\":{\"b\":1}}");
    assert_eq!(format_value(&json!({})), "{}");
}

#[test]
fn format_change_marks_unset_old_value() {
    let change = ConfigChange::new("server.port".to_string(), None, json!(80));
    assert_eq!(format_change(&change), "server.port: (unset) -> 80");

    let change = ConfigChange::new("name".to_string(), Some(json!("a")), json!("b"));
    assert_eq!(format_change(&change), "name: \"a\" -> \"b\"");
}

#[test]
fn parse_config_value_detects_types() {
    assert_eq!(SetCommand::parse_config_value("true").unwrap(), json!(true));
    assert_eq!(SetCommand::parse_config_value("20").unwrap(), json!(20));
    assert_eq!(SetCommand::parse_config_value("0.5").unwrap(), json!(0.5));
    assert_eq!(SetCommand::parse_config_value("[1, 2]").unwrap(), json!([1, 2]));
    assert_eq!(SetCommand::parse_config_value("{\"a\": 1}").unwrap(), json!({"a": 1}));
    assert_eq!(SetCommand::parse_config_value("hello").unwrap(), json!("hello"));
}

#[test]
fn parse_config_value_rejects_broken_json() {
    assert!(matches!(
        SetCommand::parse_config_value("[1, 2"),
        Err(CliError::InvalidArguments(_))
    ));
}

#[tokio::test]
async fn command_registry_starts_empty() {
    let dir = TempDir::new().unwrap();
    let registry = CommandRegistry::new(store_with(&dir, "c.json", "{}"));

    assert!(registry.list_commands().is_empty());
}

#[tokio::test]
async fn command_registry_lists_config_commands() {
    let dir = TempDir::new().unwrap();
    let mut registry = CommandRegistry::new(store_with(&dir, "c.json", "{}"));
    registry.register_all_commands();

    assert_eq!(
        registry.list_commands(),
        vec![(
            "config".to_string(),
            vec!["delete", "dump", "get", "set", "watch"]
                .into_iter()
                .map(String::from)
                .collect()
        )]
    );
}

#[tokio::test]
async fn unknown_command_is_not_found() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(&dir, "c.json", "{}"));

    let result = service.execute_command("config", "frobnicate", &[]).await;
    assert!(matches!(result, Err(CliError::CommandNotFound(_))));

    let result = service.execute_command("audio", "get", &[]).await;
    assert!(matches!(result, Err(CliError::CommandNotFound(_))));
}

#[tokio::test]
async fn argument_count_is_validated() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(&dir, "c.json", "{}"));

    let result = service.execute_command("config", "set", &["only.path".to_string()]).await;
    assert!(matches!(result, Err(CliError::InvalidArguments(_))));

    let args = vec!["a".to_string(), "b".to_string()];
    let result = service.execute_command("config", "get", &args).await;
    assert!(matches!(result, Err(CliError::InvalidArguments(_))));
}

#[tokio::test]
async fn get_prints_value_and_fails_on_missing_path() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(&dir, "c.json", r#"{"server": {"port": 80}}"#));

    let output = service
        .execute_command("config", "get", &["server.port".to_string()])
        .await
        .unwrap();
    assert_eq!(output, "server.port: 80");

    let result = service
        .execute_command("config", "get", &["server.host".to_string()])
        .await;
    assert!(matches!(result, Err(CliError::Config(_))));
}

#[tokio::test]
async fn get_with_wildcard_lists_every_match() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(
        &dir,
        "c.json",
        r#"{"db": {"host": "localhost", "port": 5432}}"#,
    ));

    let output = service
        .execute_command("config", "get", &["db.*".to_string()])
        .await
        .unwrap();
    assert_eq!(output, "- \"localhost\"\n- 5432");
}

#[tokio::test]
async fn set_and_delete_persist_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json");
    fs::write(&path, r#"{"keep": 1, "drop": 2}"#).unwrap();
    let service = CliService::new(ConfigStore::open(&path).unwrap());

    service
        .execute_command("config", "set", &["server.port".to_string(), "8080".to_string()])
        .await
        .unwrap();
    service
        .execute_command("config", "delete", &["drop".to_string()])
        .await
        .unwrap();

    let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(saved, json!({"keep": 1, "server": {"port": 8080}}));
}

#[tokio::test]
async fn dump_uses_backing_format() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(&dir, "c.yaml", "name: stratum\n"));

    let output = service.execute_command("config", "dump", &[]).await.unwrap();
    assert_eq!(output, "name: stratum");
}

#[tokio::test]
async fn help_lists_commands() {
    let dir = TempDir::new().unwrap();
    let service = CliService::new(store_with(&dir, "c.json", "{}"));

    let help = service.execute_command("help", "", &[]).await.unwrap();
    for name in ["get", "set", "delete", "dump", "watch"] {
        assert!(help.contains(name), "help is missing {name}");
    }
}

use serde_json::json;

use super::map;
use crate::config_store::{
    HashPath, Step, delete_path, format_location, resolve_all, resolve_first, set_path, value_at,
};

fn sample() -> crate::config_store::Mapping {
    map(json!({
        "server": {"host": "localhost", "port": 8080},
        "servers": [
            {"host": "a", "port": 1},
            {"host": "b", "port": 2},
            {"host": "c", "port": 3}
        ],
        "hosts": "root-level",
        "host_primary": "p",
        "db_1": {"name": "one"},
        "db_2": {"name": "two"},
        "dotted.key": "escaped"
    }))
}

#[test]
fn literal_paths_resolve() {
    let config = sample();

    assert_eq!(resolve_first(&config, "server.port"), Some(json!(8080)));
    assert_eq!(resolve_first(&config, "servers[1].host"), Some(json!("b")));
    assert_eq!(resolve_first(&config, "servers[-1].port"), Some(json!(3)));
    assert_eq!(resolve_first(&config, r"dotted\.key"), Some(json!("escaped")));
}

#[test]
fn wildcards_return_all_matches_in_document_order() {
    let config = sample();

    assert_eq!(
        resolve_all(&config, "server.*"),
        vec![json!("localhost"), json!(8080)]
    );
    assert_eq!(
        resolve_all(&config, "servers[*].host"),
        vec![json!("a"), json!("b"), json!("c")]
    );
    assert_eq!(
        resolve_all(&config, "servers.*.port"),
        vec![json!(1), json!(2), json!(3)]
    );
}

#[test]
fn glob_and_regex_segments_match_keys() {
    let config = sample();

    assert_eq!(
        resolve_all(&config, "host*"),
        vec![json!("root-level"), json!("p")]
    );
    assert_eq!(
        resolve_all(&config, r"/^db_\d+$/.name"),
        vec![json!("one"), json!("two")]
    );
}

#[test]
fn misses_resolve_to_nothing() {
    let config = sample();

    assert!(resolve_all(&config, "").is_empty());
    assert!(resolve_all(&config, "server.port.deeper").is_empty());
    assert!(resolve_all(&config, "servers[10]").is_empty());
    assert!(resolve_all(&config, "nope").is_empty());
    assert!(resolve_all(&config, "servers[").is_empty());
}

#[test]
fn parse_rejects_malformed_expressions() {
    for expr in ["a..b", "a[x]", "a[1", "/unterminated", "/(/", "a]"] {
        assert!(HashPath::parse(expr).is_err(), "{expr} should not parse");
    }
}

#[test]
fn parse_reports_pattern_paths() {
    assert!(!HashPath::parse("a.b[0]").unwrap().is_pattern());
    assert!(HashPath::parse("a.*").unwrap().is_pattern());
    assert!(HashPath::parse("a[*]").unwrap().is_pattern());
    assert!(HashPath::parse("a*").unwrap().is_pattern());
    assert!(HashPath::parse("/a/").unwrap().is_pattern());
    assert!(HashPath::parse("").unwrap().is_empty());
}

#[test]
fn set_creates_intermediate_containers() {
    let mut config = map(json!({}));

    let written = set_path(&mut config, "a.b.c", json!(1));
    assert_eq!(
        written,
        vec![vec![
            Step::Key("a".to_string()),
            Step::Key("b".to_string()),
            Step::Key("c".to_string())
        ]]
    );

    set_path(&mut config, "list[2].name", json!("x"));

    assert_eq!(
        serde_json::Value::Object(config),
        json!({"a": {"b": {"c": 1}}, "list": [null, null, {"name": "x"}]})
    );
}

#[test]
fn set_replaces_scalars_in_the_way() {
    let mut config = map(json!({"a": 5}));

    set_path(&mut config, "a.b", json!(true));

    assert_eq!(serde_json::Value::Object(config), json!({"a": {"b": true}}));
}

#[test]
fn set_with_pattern_overwrites_existing_matches_only() {
    let mut config = sample();

    let written = set_path(&mut config, "servers[*].port", json!(0));

    assert_eq!(written.len(), 3);
    assert_eq!(resolve_all(&config, "servers[*].port"), vec![json!(0); 3]);
    assert!(set_path(&mut config, "missing.*", json!(1)).is_empty());
}

#[test]
fn set_with_invalid_path_is_noop() {
    let mut config = sample();
    let before = config.clone();

    assert!(set_path(&mut config, "a[", json!(1)).is_empty());
    assert_eq!(config, before);
}

#[test]
fn set_refuses_indexes_far_past_the_end() {
    let mut config = sample();
    let before = config.clone();

    assert!(set_path(&mut config, "a[9223372036854775807]", json!(1)).is_empty());
    assert!(set_path(&mut config, "servers[100000].host", json!("z")).is_empty());
    assert!(set_path(&mut config, "hosts[5000]", json!(1)).is_empty());
    assert_eq!(config, before);

    assert_eq!(
        set_path(&mut config, "servers[5]", json!("x")),
        vec![vec![Step::Key("servers".to_string()), Step::Index(5)]]
    );
    assert_eq!(resolve_all(&config, "servers[*]").len(), 6);
}

#[test]
fn delete_removes_matches_and_keeps_order() {
    let mut config = sample();

    let removed = delete_path(&mut config, "server.host");
    assert_eq!(removed, vec![json!("localhost")]);
    assert_eq!(resolve_first(&config, "server"), Some(json!({"port": 8080})));

    let removed = delete_path(&mut config, "servers[*]");
    assert_eq!(removed.len(), 3);
    assert_eq!(resolve_first(&config, "servers"), Some(json!([])));

    let keys: Vec<&str> = config.keys().map(String::as_str).take(3).collect();
    assert_eq!(keys, vec!["server", "servers", "hosts"]);
}

#[test]
fn delete_of_missing_path_is_noop() {
    let mut config = sample();
    assert!(delete_path(&mut config, "nope.nothing").is_empty());
    assert_eq!(config, sample());
}

#[test]
fn matches_location_is_prefix_match() {
    let location = vec![Step::Key("db".to_string()), Step::Key("host".to_string())];

    assert!(HashPath::parse("db").unwrap().matches_location(&location));
    assert!(HashPath::parse("db.*").unwrap().matches_location(&location));
    assert!(HashPath::parse("*").unwrap().matches_location(&location));
    assert!(HashPath::parse("d*").unwrap().matches_location(&location));
    assert!(!HashPath::parse("db.port").unwrap().matches_location(&location));
    assert!(!HashPath::parse("db.host.x").unwrap().matches_location(&location));
    assert!(!HashPath::parse("").unwrap().matches_location(&location));
}

#[test]
fn locations_render_back_to_paths() {
    let config = sample();
    let path = HashPath::parse(r"servers[*].host").unwrap();
    let rendered: Vec<String> = path
        .locations(&config)
        .iter()
        .map(|location| format_location(location))
        .collect();

    assert_eq!(
        rendered,
        vec!["servers[0].host", "servers[1].host", "servers[2].host"]
    );

    let escaped = vec![Step::Key("dotted.key".to_string())];
    assert_eq!(format_location(&escaped), r"dotted\.key");
    assert_eq!(value_at(&config, &escaped), Some(&json!("escaped")));
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[storage]
database_path = "/tmp/courier-test.db"
wal_mode = false
busy_timeout_ms = 1000

[cache]
low_water = 10
high_water = 20

[self_destruct]
sweep_interval_secs = 5

[dispatcher]
poll_interval_secs = 3
initial_backoff_ms = 100
max_backoff_ms = 1600

[logging]
log_level = "debug"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.storage.database_path, "/tmp/courier-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.busy_timeout_ms, 1000);
    assert_eq!(config.cache.low_water, 10);
    assert_eq!(config.cache.high_water, 20);
    assert_eq!(config.self_destruct.sweep_interval_secs, 5);
    assert_eq!(config.dispatcher.poll_interval_secs, 3);
    assert_eq!(config.dispatcher.initial_backoff_ms, 100);
    assert_eq!(config.dispatcher.max_backoff_ms, 1600);
    assert_eq!(config.logging.log_level, "debug");
}

/// Empty TOML falls back to compiled defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert!(config.storage.wal_mode);
    assert_eq!(config.cache.low_water, 100);
    assert_eq!(config.cache.high_water, 200);
    assert_eq!(config.dispatcher.max_backoff_ms, 60_000);
    assert_eq!(config.logging.log_level, "info");
}

#[test]
fn unknown_key_reports_suggestion() {
    let toml = "[cache]\nhihg_water = 20\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "hihg_water");
            assert_eq!(suggestion.as_deref(), Some("high_water"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let toml = "[telemetry]\nenabled = true\n";
    assert!(load_and_validate_str(toml).is_err());
}

#[test]
fn wrong_type_reports_invalid_type() {
    let toml = "[storage]\nbusy_timeout_ms = [1, 2]\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn semantic_validation_runs_after_parse() {
    let toml = "[cache]\nlow_water = 50\nhigh_water = 50\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ConfigError::Validation { .. }));
}

#[test]
fn cache_section_converts_to_collection_spec() {
    let config = load_and_validate_str("[cache]\nlow_water = 3\nhigh_water = 7\n").unwrap();
    let spec = config.cache.collection_spec();
    assert_eq!(spec.low_water, 3);
    assert_eq!(spec.high_water, 7);
}

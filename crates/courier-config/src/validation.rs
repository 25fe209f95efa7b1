// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for constraints serde cannot express.

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration. Collects every failure instead of
/// stopping at the first one.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let cache = &config.cache;
    if cache.low_water == 0 {
        fail("cache.low_water must be at least 1".to_string());
    }
    if cache.low_water >= cache.high_water {
        fail(format!(
            "cache.low_water ({}) must be below cache.high_water ({})",
            cache.low_water, cache.high_water
        ));
    }

    if config.self_destruct.sweep_interval_secs == 0 {
        fail("self_destruct.sweep_interval_secs must be at least 1".to_string());
    }

    let dispatcher = &config.dispatcher;
    if dispatcher.poll_interval_secs == 0 {
        fail("dispatcher.poll_interval_secs must be at least 1".to_string());
    }
    if dispatcher.initial_backoff_ms == 0 {
        fail("dispatcher.initial_backoff_ms must be at least 1".to_string());
    }
    if dispatcher.max_backoff_ms < dispatcher.initial_backoff_ms {
        fail(format!(
            "dispatcher.max_backoff_ms ({}) must not be below dispatcher.initial_backoff_ms ({})",
            dispatcher.max_backoff_ms, dispatcher.initial_backoff_ms
        ));
    }

    let level = config.logging.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "logging.log_level `{}` is not one of {}",
            config.logging.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./courier.toml` > `~/.config/courier/courier.toml` >
//! `/etc/courier/courier.toml`, then `COURIER_` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::CourierConfig;

/// Section names that environment keys are split on.
const SECTIONS: [&str; 5] = ["storage", "cache", "self_destruct", "dispatcher", "logging"];

/// Load configuration from the XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/courier/courier.toml`
/// 3. `~/.config/courier/courier.toml`
/// 4. `./courier.toml`
/// 5. `COURIER_*` environment variables
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from an inline TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file("/etc/courier/courier.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("courier/courier.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("courier.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `COURIER_<SECTION>_<KEY>` to `section.key`.
///
/// Figment hands `map` the key as written in the environment, so it is
/// lowercased first. Section names contain underscores (`self_destruct`),
/// so keys are matched against the known section prefixes instead of split
/// on `_`.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or(key_str)
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_into_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("COURIER_SELF_DESTRUCT_SWEEP_INTERVAL_SECS", "9");
            jail.set_env("COURIER_CACHE_HIGH_WATER", "300");
            jail.set_env("COURIER_STORAGE_BUSY_TIMEOUT_MS", "250");
            let config: CourierConfig = Figment::new()
                .merge(Serialized::defaults(CourierConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.self_destruct.sweep_interval_secs, 9);
            assert_eq!(config.cache.high_water, 300);
            assert_eq!(config.storage.busy_timeout_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_apply_on_top_of_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("courier.toml", "[dispatcher]\npoll_interval_secs = 2\n")?;
            jail.set_env("COURIER_DISPATCHER_POLL_INTERVAL_SECS", "5");
            let config = load_config_from_path(Path::new("courier.toml"))?;
            assert_eq!(config.dispatcher.poll_interval_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                "[dispatcher]\ninitial_backoff_ms = 10\nmax_backoff_ms = 80\n",
            )?;
            let config = load_config_from_path(Path::new("courier.toml"))?;
            assert_eq!(config.dispatcher.initial_backoff_ms, 10);
            assert_eq!(config.dispatcher.max_backoff_ms, 80);
            assert_eq!(config.cache.low_water, 100);
            Ok(())
        });
    }
}

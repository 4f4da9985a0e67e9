// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./livedesk.toml` > `~/.config/livedesk/livedesk.toml` >
//! `/etc/livedesk/livedesk.toml`, with `LIVEDESK_` environment overrides.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::LivedeskConfig;

/// Config file name looked up in every directory of the hierarchy.
pub const CONFIG_FILE_NAME: &str = "livedesk.toml";

/// System-wide config path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/livedesk/livedesk.toml";

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/livedesk/livedesk.toml`
/// 3. `~/.config/livedesk/livedesk.toml`
/// 4. `./livedesk.toml`
/// 5. `LIVEDESK_*` environment variables
pub fn load_config() -> Result<LivedeskConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LivedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LivedeskConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for hierarchy loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LivedeskConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("livedesk").join(CONFIG_FILE_NAME))
                .unwrap_or_default(),
        ))
        .merge(Toml::file(CONFIG_FILE_NAME))
        .merge(env_provider())
}

/// Environment provider mapping `LIVEDESK_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because keys themselves
/// contain underscores: `LIVEDESK_CHANNEL_MAX_TOPICS_PER_CHANNEL` must map to
/// `channel.max_topics_per_channel`.
fn env_provider() -> Env {
    Env::prefixed("LIVEDESK_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 6] = [
        "logging", "platform", "channel", "reconcile", "quality", "watch",
    ];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

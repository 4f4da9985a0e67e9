// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Livedesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Livedesk configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LivedeskConfig {
    /// Log filter settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Remote platform connection settings.
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Push-channel lifecycle and sharding settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Hybrid reconciliation cadence and reservation settings.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Push-versus-pull plausibility thresholds.
    #[serde(default)]
    pub quality: QualityConfig,

    /// What to watch.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Remote contact-center platform settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformConfig {
    /// REST API base URL, e.g. `https://api.mypurecloud.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth bearer token. Obtaining and storing it is outside Livedesk.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Organization id, used to key shared state and reservations.
    #[serde(default = "default_org_id")]
    pub org_id: String,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            org_id: default_org_id(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://api.mypurecloud.com".to_string()
}

fn default_org_id() -> String {
    "default".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Notification channel lifecycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Fixed delay before reopening a dropped socket, in milliseconds.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Platform-advertised subscription lifetime, in seconds.
    #[serde(default = "default_subscription_lifetime_secs")]
    pub subscription_lifetime_secs: u64,

    /// Fraction of the lifetime after which a channel is rotated.
    #[serde(default = "default_rotation_ratio")]
    pub rotation_ratio: f64,

    /// Platform per-channel topic limit.
    #[serde(default = "default_max_topics_per_channel")]
    pub max_topics_per_channel: usize,

    /// Hard cap on simultaneous channels per monitor.
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,

    /// Consecutive failed socket opens before the channel is recreated.
    #[serde(default = "default_max_reopen_attempts")]
    pub max_reopen_attempts: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            subscription_lifetime_secs: default_subscription_lifetime_secs(),
            rotation_ratio: default_rotation_ratio(),
            max_topics_per_channel: default_max_topics_per_channel(),
            max_channels: default_max_channels(),
            max_reopen_attempts: default_max_reopen_attempts(),
        }
    }
}

impl ChannelConfig {
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn subscription_lifetime(&self) -> Duration {
        Duration::from_secs(self.subscription_lifetime_secs)
    }
}

fn default_reconnect_backoff_ms() -> u64 {
    2_000
}

fn default_subscription_lifetime_secs() -> u64 {
    24 * 60 * 60
}

fn default_rotation_ratio() -> f64 {
    0.92
}

fn default_max_topics_per_channel() -> usize {
    1_000
}

fn default_max_channels() -> usize {
    20
}

fn default_max_reopen_attempts() -> u32 {
    5
}

/// Hybrid reconciler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    /// How often the consumer refreshes its view, in seconds.
    #[serde(default = "default_ui_refresh_interval_secs")]
    pub ui_refresh_interval_secs: u64,

    /// Refresh intervals without a classified event before push is stale.
    #[serde(default = "default_stale_multiplier")]
    pub stale_multiplier: u32,

    /// Lower bound on the staleness cooldown, in seconds.
    #[serde(default = "default_stale_floor_secs")]
    pub stale_floor_secs: u64,

    /// Self-heal snapshot cadence even while push looks healthy, in seconds.
    #[serde(default = "default_periodic_resync_secs")]
    pub periodic_resync_secs: u64,

    /// Minimum interval between snapshot fetches for one (org, purpose), in seconds.
    #[serde(default = "default_reservation_interval_secs")]
    pub reservation_interval_secs: u64,

    /// Conversation snapshot lookback, in minutes.
    #[serde(default = "default_conversation_lookback_mins")]
    pub conversation_lookback_mins: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            ui_refresh_interval_secs: default_ui_refresh_interval_secs(),
            stale_multiplier: default_stale_multiplier(),
            stale_floor_secs: default_stale_floor_secs(),
            periodic_resync_secs: default_periodic_resync_secs(),
            reservation_interval_secs: default_reservation_interval_secs(),
            conversation_lookback_mins: default_conversation_lookback_mins(),
        }
    }
}

impl ReconcileConfig {
    pub fn ui_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.ui_refresh_interval_secs)
    }

    pub fn stale_floor(&self) -> Duration {
        Duration::from_secs(self.stale_floor_secs)
    }

    pub fn periodic_resync(&self) -> Duration {
        Duration::from_secs(self.periodic_resync_secs)
    }

    pub fn reservation_interval(&self) -> Duration {
        Duration::from_secs(self.reservation_interval_secs)
    }

    pub fn conversation_lookback(&self) -> Duration {
        Duration::from_secs(self.conversation_lookback_mins * 60)
    }
}

fn default_ui_refresh_interval_secs() -> u64 {
    30
}

fn default_stale_multiplier() -> u32 {
    3
}

fn default_stale_floor_secs() -> u64 {
    180
}

fn default_periodic_resync_secs() -> u64 {
    300
}

fn default_reservation_interval_secs() -> u64 {
    60
}

fn default_conversation_lookback_mins() -> u64 {
    240
}

/// Thresholds for trusting push-derived queue counts over pull aggregates.
///
/// These are tuned policy, not invariants.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    /// Fraction of active queues (per the pull aggregate) push must also report.
    #[serde(default = "default_min_queue_coverage")]
    pub min_queue_coverage: f64,

    /// Minimum push total / pull total.
    #[serde(default = "default_min_total_ratio")]
    pub min_total_ratio: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_queue_coverage: default_min_queue_coverage(),
            min_total_ratio: default_min_total_ratio(),
        }
    }
}

fn default_min_queue_coverage() -> f64 {
    0.6
}

fn default_min_total_ratio() -> f64 {
    0.8
}

/// Entities to subscribe to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Users whose presence, routing status and calls are followed.
    #[serde(default)]
    pub user_ids: Vec<String>,

    /// Queues whose conversations are followed.
    #[serde(default)]
    pub queue_ids: Vec<String>,

    /// Pull conversation snapshots for the whole org instead of the watched queues and users.
    #[serde(default)]
    pub org_wide: bool,

    /// Conversations older than this without an update are evicted on read, in seconds.
    #[serde(default = "default_conversation_max_age_secs")]
    pub conversation_max_age_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            user_ids: Vec::new(),
            queue_ids: Vec::new(),
            org_wide: false,
            conversation_max_age_secs: default_conversation_max_age_secs(),
        }
    }
}

impl WatchConfig {
    pub fn conversation_max_age(&self) -> Duration {
        Duration::from_secs(self.conversation_max_age_secs)
    }
}

fn default_conversation_max_age_secs() -> u64 {
    6 * 60 * 60
}

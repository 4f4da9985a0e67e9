// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk plan` and `livedesk check` reports.

use std::fmt::Write as _;

use livedesk_config::LivedeskConfig;
use livedesk_live::topic::watch_topics;
use livedesk_live::{ShardLimits, plan_shards};

/// Shard plan and coverage for the configured watch set.
pub fn plan_report(config: &LivedeskConfig) -> String {
    let topics = watch_topics(&config.watch.user_ids, &config.watch.queue_ids);
    let limits = ShardLimits::from_config(&config.channel);
    let plan = plan_shards(&topics, limits.topics_per_channel, limits.max_channels);
    let coverage = plan.coverage();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "watch set: {} users, {} queues, {} topics",
        config.watch.user_ids.len(),
        config.watch.queue_ids.len(),
        coverage.requested
    );
    let _ = writeln!(
        out,
        "limits: {} topics per channel, {} channels",
        limits.topics_per_channel, limits.max_channels
    );
    for (i, shard) in plan.shards.iter().enumerate() {
        let _ = writeln!(out, "  shard-{i}: {} topics", shard.len());
    }
    let _ = writeln!(
        out,
        "coverage: {} of {} topics on {} channels",
        coverage.covered, coverage.requested, coverage.shards
    );
    if coverage.is_degraded() {
        let _ = writeln!(out, "dropped ({}):", plan.dropped.len());
        for topic in &plan.dropped {
            let _ = writeln!(out, "  {topic}");
        }
    }
    out
}

/// One-screen summary of a configuration that passed validation.
pub fn check_report(config: &LivedeskConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "configuration OK");
    let _ = writeln!(out, "  org: {}", config.platform.org_id);
    let _ = writeln!(out, "  base url: {}", config.platform.base_url);
    let _ = writeln!(
        out,
        "  api token: {}",
        if config.platform.api_token.is_some() {
            "set"
        } else {
            "missing (serve will refuse to start)"
        }
    );
    let _ = writeln!(
        out,
        "  watch: {} users, {} queues{}",
        config.watch.user_ids.len(),
        config.watch.queue_ids.len(),
        if config.watch.org_wide { ", org-wide snapshots" } else { "" }
    );
    let _ = writeln!(
        out,
        "  refresh every {}s",
        config.reconcile.ui_refresh_interval_secs
    );
    out
}

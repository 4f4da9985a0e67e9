// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic sharding across notification channels.
//!
//! The platform caps topics per channel and channels per client. A topic set
//! is split into consecutive chunks, one channel each; anything past the
//! channel cap is dropped and reported as degraded coverage.

use std::sync::Arc;

use futures::future::join_all;
use livedesk_config::model::ChannelConfig;
use livedesk_core::{LivedeskError, NotificationApi, Topic};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::channel::{ChannelSettings, NotificationChannel, StartOutcome};
use crate::classify::FrameHandler;
use crate::health::PushHealth;
use crate::topic::{canonical_set, dedupe};

/// How many topics a shard plan covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Coverage {
    pub requested: usize,
    pub covered: usize,
    pub dropped: usize,
    pub shards: usize,
}

impl Coverage {
    pub fn is_degraded(&self) -> bool {
        self.dropped > 0
    }

    /// The capacity error describing this coverage, when degraded.
    pub fn as_error(&self) -> Option<LivedeskError> {
        self.is_degraded().then_some(LivedeskError::Capacity {
            requested: self.requested,
            covered: self.covered,
        })
    }
}

/// Assignment of topics to channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardPlan {
    pub shards: Vec<Vec<Topic>>,
    pub dropped: Vec<Topic>,
    /// Distinct topics requested.
    pub requested: usize,
}

impl ShardPlan {
    pub fn coverage(&self) -> Coverage {
        Coverage {
            requested: self.requested,
            covered: self.shards.iter().map(Vec::len).sum(),
            dropped: self.dropped.len(),
            shards: self.shards.len(),
        }
    }
}

/// Split `topics` into chunks of at most `per_channel`, keeping at most
/// `max_channels` chunks.
///
/// Duplicates are removed keeping first occurrences; order is otherwise
/// preserved, so the topics dropped are always the tail of the request.
pub fn plan_shards(topics: &[Topic], per_channel: usize, max_channels: usize) -> ShardPlan {
    let unique = dedupe(topics);
    let requested = unique.len();
    let per_channel = per_channel.max(1);
    let capacity = per_channel.saturating_mul(max_channels);

    let (kept, dropped) = if unique.len() > capacity {
        let (kept, dropped) = unique.split_at(capacity);
        (kept.to_vec(), dropped.to_vec())
    } else {
        (unique, Vec::new())
    };

    ShardPlan {
        shards: kept.chunks(per_channel).map(<[Topic]>::to_vec).collect(),
        dropped,
        requested,
    }
}

/// Per-client channel caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardLimits {
    pub topics_per_channel: usize,
    pub max_channels: usize,
}

impl ShardLimits {
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self {
            topics_per_channel: config.max_topics_per_channel,
            max_channels: config.max_channels,
        }
    }
}

impl Default for ShardLimits {
    fn default() -> Self {
        Self::from_config(&ChannelConfig::default())
    }
}

struct ShardState {
    /// Canonical form of the last requested set.
    topics: Vec<Topic>,
    channels: Vec<NotificationChannel>,
    coverage: Coverage,
}

/// A topic set spread over as many channels as it needs.
pub struct ShardedSubscription {
    api: Arc<dyn NotificationApi>,
    handler: Arc<dyn FrameHandler>,
    health: Arc<PushHealth>,
    settings: ChannelSettings,
    limits: ShardLimits,
    state: Mutex<ShardState>,
}

impl ShardedSubscription {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        handler: Arc<dyn FrameHandler>,
        health: Arc<PushHealth>,
        settings: ChannelSettings,
        limits: ShardLimits,
    ) -> Self {
        Self {
            api,
            handler,
            health,
            settings,
            limits,
            state: Mutex::new(ShardState {
                topics: Vec::new(),
                channels: Vec::new(),
                coverage: Coverage::default(),
            }),
        }
    }

    /// Subscribe to `topics`, rebuilding every shard when the set changed.
    pub async fn start(&self, topics: &[Topic]) -> StartOutcome {
        let wanted = canonical_set(topics);
        let mut state = self.state.lock().await;
        if !wanted.is_empty() && state.topics == wanted && !state.channels.is_empty() {
            return StartOutcome::AlreadyRunning;
        }

        stop_all(&state.channels).await;
        state.channels.clear();

        let plan = plan_shards(topics, self.limits.topics_per_channel, self.limits.max_channels);
        let coverage = plan.coverage();
        self.health.set_dropped_topics(coverage.dropped);
        if let Some(err) = coverage.as_error() {
            warn!(
                requested = coverage.requested,
                covered = coverage.covered,
                dropped = coverage.dropped,
                error = %err,
                "topic set exceeds channel capacity, coverage degraded"
            );
        }
        state.coverage = coverage;
        state.topics = wanted;

        if plan.shards.is_empty() {
            return StartOutcome::Stopped;
        }

        for (i, shard) in plan.shards.into_iter().enumerate() {
            let channel = NotificationChannel::new(
                format!("shard-{i}"),
                self.api.clone(),
                self.handler.clone(),
                self.health.clone(),
                self.settings.clone(),
            );
            channel.start(&shard).await;
            state.channels.push(channel);
        }
        info!(
            shards = coverage.shards,
            topics = coverage.covered,
            "push subscription started"
        );
        StartOutcome::Started
    }

    /// Stop every shard.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        stop_all(&state.channels).await;
        state.channels.clear();
        state.topics.clear();
        state.coverage = Coverage::default();
        self.health.set_dropped_topics(0);
    }

    pub async fn coverage(&self) -> Coverage {
        self.state.lock().await.coverage
    }

    pub async fn shard_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }

    pub async fn connected_shards(&self) -> usize {
        self.state
            .lock()
            .await
            .channels
            .iter()
            .filter(|c| c.is_connected())
            .count()
    }

    /// Platform channel ids currently in use, one per connected-or-connecting shard.
    pub async fn channel_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .channels
            .iter()
            .filter_map(NotificationChannel::channel_id)
            .collect()
    }

    /// Topics assigned to each shard, in shard order.
    pub async fn assignments(&self) -> Vec<Vec<Topic>> {
        self.state
            .lock()
            .await
            .channels
            .iter()
            .map(NotificationChannel::topics)
            .collect()
    }
}

async fn stop_all(channels: &[NotificationChannel]) {
    join_all(channels.iter().map(NotificationChannel::stop)).await;
}

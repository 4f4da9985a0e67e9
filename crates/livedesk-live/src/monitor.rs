// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query and eviction façade over one org's live state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use livedesk_config::LivedeskConfig;
use livedesk_core::{HealthStatus, NotificationApi, OrgId, SnapshotApi, Topic};

use crate::channel::{ChannelSettings, StartOutcome};
use crate::classify::EventClassifier;
use crate::health::{HealthCounters, PushHealth};
use crate::quality::{QualityPolicy, QueueView};
use crate::reconcile::{
    HybridReconciler, PushStatus, ReconcileOutcome, ReconcilePolicy, ReconcileTargets, Staleness,
};
use crate::record::{ConversationRecord, PresenceRecord, RoutingRecord};
use crate::registry::OrgHandle;
use crate::shard::{Coverage, ShardLimits, ShardedSubscription};
use crate::store::{Evicted, LiveStore};
use crate::topic::watch_topics;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub channel: ChannelSettings,
    pub limits: ShardLimits,
    pub reconcile: ReconcilePolicy,
    pub quality: QualityPolicy,
    /// Max age used by [`LiveMonitor::evict`].
    pub max_record_age: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &LivedeskConfig) -> Self {
        Self {
            channel: ChannelSettings::from_config(&config.channel),
            limits: ShardLimits::from_config(&config.channel),
            reconcile: ReconcilePolicy::from_config(&config.reconcile),
            quality: QualityPolicy::from_config(&config.quality),
            max_record_age: config.watch.conversation_max_age(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&LivedeskConfig::default())
    }
}

/// Point-in-time view of the push path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// Every shard has an open socket.
    pub connected: bool,
    pub connected_shards: usize,
    pub shard_count: usize,
    pub channel_ids: Vec<String>,
    pub last_message_age: Option<Duration>,
    pub last_event_age: Option<Duration>,
    pub coverage: Coverage,
    pub counters: HealthCounters,
    pub staleness: Staleness,
}

fn age(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<Duration> {
    at.map(|at| (now - at).to_std().unwrap_or_default())
}

pub struct LiveMonitor {
    org_id: OrgId,
    store: Arc<LiveStore>,
    health: Arc<PushHealth>,
    subscription: ShardedSubscription,
    reconciler: HybridReconciler,
    settings: MonitorSettings,
}

impl LiveMonitor {
    pub fn new(
        org: OrgHandle,
        notifications: Arc<dyn NotificationApi>,
        snapshots: Arc<dyn SnapshotApi>,
        settings: MonitorSettings,
    ) -> Self {
        let health = Arc::new(PushHealth::new());
        let classifier = EventClassifier::new(org.store.clone());
        let subscription = ShardedSubscription::new(
            notifications,
            Arc::new(classifier.clone()),
            health.clone(),
            settings.channel.clone(),
            settings.limits,
        );
        let reconciler = HybridReconciler::new(
            org.org_id.clone(),
            snapshots,
            classifier,
            org.reservations,
            health.clone(),
            settings.reconcile.clone(),
            settings.quality,
        );
        Self {
            org_id: org.org_id,
            store: org.store,
            health,
            subscription,
            reconciler,
            settings,
        }
    }

    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    pub fn store(&self) -> &Arc<LiveStore> {
        &self.store
    }

    pub async fn start(&self, topics: &[Topic]) -> StartOutcome {
        self.subscription.start(topics).await
    }

    /// Subscribe to presence, routing and calls of `user_ids` plus the conversations of `queue_ids`.
    pub async fn watch(&self, user_ids: &[String], queue_ids: &[String]) -> StartOutcome {
        self.start(&watch_topics(user_ids, queue_ids)).await
    }

    pub async fn stop(&self) {
        self.subscription.stop().await;
    }

    async fn push_status(&self) -> PushStatus {
        let shards = self.subscription.shard_count().await;
        let connected = shards > 0 && self.subscription.connected_shards().await == shards;
        PushStatus::from_health(connected, &self.health)
    }

    pub async fn reconcile(
        &self,
        targets: &ReconcileTargets,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let push = self.push_status().await;
        self.reconciler.reconcile(targets, &push, now).await
    }

    pub async fn queue_summary(&self, queue_ids: &[String], now: DateTime<Utc>) -> QueueView {
        self.reconciler.queue_summary(queue_ids, now).await
    }

    /// Non-ended conversations updated within `max_age`; older ones are evicted first.
    pub fn active_conversations(&self, max_age: Duration) -> Vec<ConversationRecord> {
        self.active_conversations_at(max_age, Utc::now())
    }

    pub fn active_conversations_at(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Vec<ConversationRecord> {
        let active = self.store.active_conversations_at(max_age, now);
        self.health.observe_active_conversations(active.len());
        active
    }

    /// Latest presence of `user_id`; records past the max age are evicted.
    pub fn user_presence(&self, user_id: &str) -> Option<PresenceRecord> {
        self.user_presence_at(user_id, Utc::now())
    }

    pub fn user_presence_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<PresenceRecord> {
        self.store
            .user_presence_at(user_id, self.settings.max_record_age, now)
    }

    /// Latest routing status of `user_id`; records past the max age are evicted.
    pub fn user_routing(&self, user_id: &str) -> Option<RoutingRecord> {
        self.user_routing_at(user_id, Utc::now())
    }

    pub fn user_routing_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<RoutingRecord> {
        self.store
            .user_routing_at(user_id, self.settings.max_record_age, now)
    }

    /// Drop every record older than the configured max age.
    pub fn evict(&self, now: DateTime<Utc>) -> Evicted {
        self.store.evict_older_than(self.settings.max_record_age, now)
    }

    pub fn counters(&self) -> HealthCounters {
        self.health.counters()
    }

    pub async fn diagnostics(&self, now: DateTime<Utc>) -> Diagnostics {
        let shard_count = self.subscription.shard_count().await;
        let connected_shards = self.subscription.connected_shards().await;
        let push = PushStatus::from_health(
            shard_count > 0 && connected_shards == shard_count,
            &self.health,
        );
        Diagnostics {
            connected: push.connected,
            connected_shards,
            shard_count,
            channel_ids: self.subscription.channel_ids().await,
            last_message_age: age(push.last_message_at, now),
            last_event_age: age(push.last_event_at, now),
            coverage: self.subscription.coverage().await,
            counters: self.health.counters(),
            staleness: Staleness::assess(&push, self.settings.reconcile.cooldown(), now),
        }
    }

    pub async fn health(&self, now: DateTime<Utc>) -> HealthStatus {
        let d = self.diagnostics(now).await;
        if d.shard_count == 0 {
            return HealthStatus::Unhealthy("no push channels running".into());
        }
        if d.connected_shards == 0 {
            return HealthStatus::Unhealthy("no push channel connected".into());
        }
        if !d.connected {
            return HealthStatus::Degraded(format!(
                "{} of {} push channels connected",
                d.connected_shards, d.shard_count
            ));
        }
        if d.coverage.is_degraded() {
            return HealthStatus::Degraded(format!(
                "{} of {} topics dropped over channel capacity",
                d.coverage.dropped, d.coverage.requested
            ));
        }
        match d.staleness {
            Staleness::Fresh => HealthStatus::Healthy,
            Staleness::NeverReceived => HealthStatus::Degraded("no push message received yet".into()),
            Staleness::Quiet(quiet) => {
                HealthStatus::Degraded(format!("push quiet for {}s", quiet.as_secs()))
            }
            Staleness::Disconnected => HealthStatus::Unhealthy("push disconnected".into()),
        }
    }
}

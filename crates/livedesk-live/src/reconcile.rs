// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid seed-and-stream reconciliation.
//!
//! Push is the primary source. A REST snapshot is pulled when push looks
//! stale (disconnected, silent, or never heard from) and on a slow periodic
//! cadence even when push is healthy, to repair anything push missed. Every
//! fetch runs under an `(org, purpose)` reservation so concurrent sessions
//! for the same org fetch once between them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use livedesk_config::model::ReconcileConfig;
use livedesk_core::{ConversationQuery, LivedeskError, OrgId, SnapshotApi, SnapshotPurpose};
use tracing::{debug, info, warn};

use crate::classify::{EventClassifier, Handled};
use crate::extract::ExtractHint;
use crate::health::PushHealth;
use crate::quality::{QualityPolicy, QueueView, choose_queue_view};
use crate::record::RecordSource;
use crate::reservation::{ReservationBook, ReservationKey};
use crate::store::SnapshotScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub ui_refresh_interval: Duration,
    pub stale_multiplier: u32,
    pub stale_floor: Duration,
    pub periodic_resync: Duration,
    pub reservation_interval: Duration,
    pub conversation_lookback: Duration,
}

impl ReconcilePolicy {
    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self {
            ui_refresh_interval: config.ui_refresh_interval(),
            stale_multiplier: config.stale_multiplier,
            stale_floor: config.stale_floor(),
            periodic_resync: config.periodic_resync(),
            reservation_interval: config.reservation_interval(),
            conversation_lookback: config.conversation_lookback(),
        }
    }

    /// How long push may stay silent before it is considered stale.
    pub fn cooldown(&self) -> Duration {
        (self.ui_refresh_interval * self.stale_multiplier).max(self.stale_floor)
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self::from_config(&ReconcileConfig::default())
    }
}

/// The entities a reconcile pass is responsible for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileTargets {
    pub user_ids: Vec<String>,
    pub queue_ids: Vec<String>,
    /// Conversation snapshots cover the whole org.
    pub org_wide: bool,
}

impl ReconcileTargets {
    fn wants_conversations(&self) -> bool {
        self.org_wide || !self.user_ids.is_empty() || !self.queue_ids.is_empty()
    }

    fn scope(&self) -> SnapshotScope {
        SnapshotScope {
            org_wide: self.org_wide,
            queue_ids: self.queue_ids.iter().cloned().collect(),
            user_ids: self.user_ids.iter().cloned().collect(),
        }
    }
}

/// Push-path state as seen by the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStatus {
    pub connected: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
}

impl PushStatus {
    pub fn from_health(connected: bool, health: &PushHealth) -> Self {
        Self {
            connected,
            last_message_at: health.last_message_at(),
            last_event_at: health.last_event_at(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Disconnected,
    NeverReceived,
    /// Connected, but nothing for longer than the cooldown.
    Quiet(Duration),
}

impl Staleness {
    pub fn assess(status: &PushStatus, cooldown: Duration, now: DateTime<Utc>) -> Self {
        if !status.connected {
            return Self::Disconnected;
        }
        let Some(last_message) = status.last_message_at else {
            return Self::NeverReceived;
        };
        let last = status.last_event_at.unwrap_or(last_message);
        let quiet = (now - last).to_std().unwrap_or_default();
        if quiet > cooldown {
            Self::Quiet(quiet)
        } else {
            Self::Fresh
        }
    }

    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Snapshot fetched and merged; `records` were written.
    Fetched { records: usize },
    /// Another session holds the reservation.
    Deferred,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurposeOutcome {
    pub purpose: SnapshotPurpose,
    pub result: FetchResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub staleness: Staleness,
    /// One entry per purpose that was due; empty when nothing was due.
    pub purposes: Vec<PurposeOutcome>,
}

impl ReconcileOutcome {
    pub fn result(&self, purpose: SnapshotPurpose) -> Option<&FetchResult> {
        self.purposes
            .iter()
            .find(|p| p.purpose == purpose)
            .map(|p| &p.result)
    }

    pub fn fetched_any(&self) -> bool {
        self.purposes
            .iter()
            .any(|p| matches!(p.result, FetchResult::Fetched { .. }))
    }
}

pub struct HybridReconciler {
    org_id: OrgId,
    api: Arc<dyn SnapshotApi>,
    classifier: EventClassifier,
    reservations: Arc<ReservationBook>,
    health: Arc<PushHealth>,
    policy: ReconcilePolicy,
    quality: QualityPolicy,
    last_success: DashMap<SnapshotPurpose, DateTime<Utc>>,
}

impl HybridReconciler {
    pub fn new(
        org_id: OrgId,
        api: Arc<dyn SnapshotApi>,
        classifier: EventClassifier,
        reservations: Arc<ReservationBook>,
        health: Arc<PushHealth>,
        policy: ReconcilePolicy,
        quality: QualityPolicy,
    ) -> Self {
        Self {
            org_id,
            api,
            classifier,
            reservations,
            health,
            policy,
            quality,
            last_success: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// When this session last merged a snapshot for `purpose`.
    pub fn last_success(&self, purpose: SnapshotPurpose) -> Option<DateTime<Utc>> {
        self.last_success.get(&purpose).map(|t| *t)
    }

    fn is_due(&self, purpose: SnapshotPurpose, staleness: Staleness, now: DateTime<Utc>) -> bool {
        if staleness.is_stale() {
            return true;
        }
        match self.last_success(purpose) {
            None => true,
            Some(at) => (now - at)
                .to_std()
                .is_ok_and(|age| age >= self.policy.periodic_resync),
        }
    }

    /// Pull snapshots for every purpose that is due and merge them.
    pub async fn reconcile(
        &self,
        targets: &ReconcileTargets,
        push: &PushStatus,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let staleness = Staleness::assess(push, self.policy.cooldown(), now);
        let mut purposes = Vec::new();

        if !targets.user_ids.is_empty() && self.is_due(SnapshotPurpose::UserStatus, staleness, now)
        {
            let fetch = self.fetch_user_status(targets, now);
            let result = self
                .reserved_fetch(SnapshotPurpose::UserStatus, now, fetch)
                .await;
            purposes.push(PurposeOutcome {
                purpose: SnapshotPurpose::UserStatus,
                result,
            });
        }

        if targets.wants_conversations()
            && self.is_due(SnapshotPurpose::Conversations, staleness, now)
        {
            let result = self
                .reserved_fetch(
                    SnapshotPurpose::Conversations,
                    now,
                    self.fetch_conversations(targets, now),
                )
                .await;
            purposes.push(PurposeOutcome {
                purpose: SnapshotPurpose::Conversations,
                result,
            });
        }

        if !purposes.is_empty() {
            debug!(org = %self.org_id, ?staleness, ?purposes, "reconcile pass finished");
        }
        ReconcileOutcome {
            staleness,
            purposes,
        }
    }

    /// Run `fetch` only while holding the `(org, purpose)` reservation.
    ///
    /// A failed fetch gives the reservation back so any session can retry.
    async fn reserved_fetch(
        &self,
        purpose: SnapshotPurpose,
        now: DateTime<Utc>,
        fetch: impl Future<Output = Result<usize, LivedeskError>>,
    ) -> FetchResult {
        let key = ReservationKey::new(self.org_id.clone(), purpose);
        let interval = self.policy.reservation_interval;
        let Some(reservation) = self.reservations.try_reserve(key, interval, now) else {
            debug!(org = %self.org_id, %purpose, "snapshot reserved by another session");
            return FetchResult::Deferred;
        };

        self.health.record_snapshot_fetch(purpose);
        match fetch.await {
            Ok(records) => {
                self.last_success.insert(purpose, now);
                info!(org = %self.org_id, %purpose, records, "snapshot merged");
                FetchResult::Fetched { records }
            }
            Err(err) => {
                self.health.record_snapshot_failure(purpose);
                self.reservations.release(&reservation);
                warn!(org = %self.org_id, %purpose, error = %err, "snapshot fetch failed");
                FetchResult::Failed(err.to_string())
            }
        }
    }

    fn count_applied(&self, result: Result<Handled, LivedeskError>) -> usize {
        match result {
            Ok(handled) if handled.is_event() => 1,
            Ok(_) => 0,
            Err(err) => {
                self.health.record_malformed();
                warn!(org = %self.org_id, error = %err, "skipping malformed snapshot record");
                0
            }
        }
    }

    async fn fetch_user_status(
        &self,
        targets: &ReconcileTargets,
        now: DateTime<Utc>,
    ) -> Result<usize, LivedeskError> {
        let snapshot = self.api.users_status_scan(&targets.user_ids).await?;
        let mut applied = 0;
        for (user_id, body) in &snapshot.presence {
            applied += self.count_applied(self.classifier.apply_presence_body(
                user_id,
                body,
                RecordSource::Pull,
                now,
            ));
        }
        for (user_id, body) in &snapshot.routing {
            applied += self.count_applied(self.classifier.apply_routing_body(
                user_id,
                body,
                RecordSource::Pull,
                now,
            ));
        }
        Ok(applied)
    }

    async fn fetch_conversations(
        &self,
        targets: &ReconcileTargets,
        now: DateTime<Utc>,
    ) -> Result<usize, LivedeskError> {
        let query = if targets.org_wide {
            ConversationQuery {
                queue_ids: Vec::new(),
                user_ids: Vec::new(),
                lookback: self.policy.conversation_lookback,
            }
        } else {
            ConversationQuery {
                queue_ids: targets.queue_ids.clone(),
                user_ids: targets.user_ids.clone(),
                lookback: self.policy.conversation_lookback,
            }
        };
        let snapshot = self.api.recent_conversations(&query).await?;

        let mut applied = 0;
        let mut seen = HashSet::with_capacity(snapshot.conversations.len());
        for body in &snapshot.conversations {
            let result = self.classifier.apply_conversation_body(
                body,
                ExtractHint::default(),
                RecordSource::Pull,
                now,
            );
            if let Ok(Handled::Conversation {
                conversation_id,
                removed: false,
            }) = &result
            {
                seen.insert(conversation_id.clone());
            }
            applied += self.count_applied(result);
        }

        if !snapshot.complete {
            warn!(
                org = %self.org_id,
                listed = snapshot.conversations.len(),
                "conversation snapshot incomplete, keeping unlisted conversations"
            );
            return Ok(applied);
        }
        let pruned = self
            .classifier
            .store()
            .prune_missing(&targets.scope(), &seen, now);
        if pruned > 0 {
            debug!(org = %self.org_id, pruned, "removed conversations missing from snapshot");
        }
        Ok(applied)
    }

    /// Per-queue counts for `queue_ids`, from push state when it passes the
    /// quality gate and from the pull aggregate otherwise.
    pub async fn queue_summary(&self, queue_ids: &[String], now: DateTime<Utc>) -> QueueView {
        let store = self.classifier.store().clone();
        let due = store.pull_queue_counts().is_none_or(|cached| {
            (now - cached.fetched_at)
                .to_std()
                .is_ok_and(|age| age >= self.policy.reservation_interval)
        });

        if due {
            let api = self.api.clone();
            let fetch_store = store.clone();
            self.reserved_fetch(SnapshotPurpose::QueueObservations, now, async move {
                let counts = api.queue_observations(queue_ids).await?;
                let n = counts.len();
                fetch_store.set_pull_queue_counts(counts, now);
                Ok::<usize, LivedeskError>(n)
            })
            .await;
        }

        let pull: Vec<_> = store
            .pull_queue_counts()
            .map(|cached| {
                cached
                    .counts
                    .iter()
                    .filter(|c| queue_ids.contains(&c.queue_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let push = store.queue_counts(queue_ids);
        choose_queue_view(&push, &pull, &self.quality)
    }
}

// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end monitor tests: push frames, snapshot repair, shared
//! reservations, the queue quality gate and health reporting.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use livedesk_core::{HealthStatus, OrgId, QueueCounts, SnapshotPurpose, UsersStatusSnapshot};
use livedesk_live::{
    ConversationRecord, CountsSource, FetchResult, InteractionState, LiveMonitor, MonitorSettings,
    OrgRegistry, PresenceBucket, PresenceRecord, ReconcileTargets, RecordSource, RoutingRecord,
    RoutingStatus, Staleness,
};
use livedesk_test_utils::{MockPlatform, wait_for};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(1);

fn monitor(registry: &OrgRegistry, platform: &Arc<MockPlatform>) -> LiveMonitor {
    LiveMonitor::new(
        registry.acquire(&OrgId("org-1".into())),
        platform.clone(),
        platform.clone(),
        MonitorSettings::default(),
    )
}

fn frame(topic: &str, body: Value) -> String {
    json!({ "topicName": topic, "eventBody": body }).to_string()
}

fn queued_call() -> Value {
    json!({
        "id": "c1",
        "participants": [
            {
                "purpose": "customer",
                "address": "tel:+15550100",
                "calls": [{ "state": "connected", "direction": "inbound" }]
            },
            {
                "purpose": "acd",
                "queueId": "q1",
                "name": "Support",
                "startTime": "2026-03-01T09:58:00Z",
                "calls": [{ "state": "connected" }]
            }
        ]
    })
}

fn answered_call() -> Value {
    let mut body = queued_call();
    body["participants"][1]["calls"][0]["state"] = json!("disconnected");
    body["participants"]
        .as_array_mut()
        .unwrap()
        .push(json!({
            "purpose": "agent",
            "userId": "a1",
            "name": "Ada",
            "connectedTime": "2026-03-01T09:59:30Z",
            "calls": [{ "state": "connected" }]
        }));
    body
}

fn users(ids: &[&str]) -> ReconcileTargets {
    ReconcileTargets {
        user_ids: ids.iter().map(|s| s.to_string()).collect(),
        ..ReconcileTargets::default()
    }
}

fn secs(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

async fn watching(monitor: &LiveMonitor, platform: &MockPlatform) {
    monitor.watch(&["a1".into()], &["q1".into()]).await;
    assert!(wait_for(WAIT, || platform.open_sockets() == 1).await);
}

// ---- Test 1: Push end to end ----

#[tokio::test(start_paused = true)]
async fn test_queue_frames_drive_conversation_lifecycle() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    watching(&monitor, &platform).await;

    let topic = "v2.routing.queues.q1.conversations";
    assert_eq!(platform.broadcast(&frame(topic, queued_call())), 1);
    assert!(wait_for(WAIT, || monitor.store().conversation("c1").is_some()).await);
    assert_eq!(
        monitor.store().conversation("c1").unwrap().state,
        InteractionState::Waiting
    );

    platform.broadcast(&frame(topic, answered_call()));
    assert!(
        wait_for(WAIT, || monitor
            .store()
            .conversation("c1")
            .is_some_and(|c| c.state == InteractionState::Interacting))
        .await
    );
    let active = monitor.active_conversations(Duration::from_secs(3600));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].agent_id.as_deref(), Some("a1"));
    assert_eq!(active[0].queue_name.as_deref(), Some("Support"));
    assert!(!active[0].wait.unwrap().running);

    platform.broadcast(&frame(
        topic,
        json!({ "id": "c1", "conversationEnd": "2026-03-01T10:05:00Z" }),
    ));
    assert!(wait_for(WAIT, || monitor.store().conversation("c1").is_none()).await);
    assert!(monitor.active_conversations(Duration::from_secs(3600)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_presence_and_routing_frames() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    watching(&monitor, &platform).await;

    platform.broadcast(&frame(
        "v2.users.a1.presence",
        json!({ "presenceDefinition": { "systemPresence": "On Queue" } }),
    ));
    platform.broadcast(&frame(
        "v2.users.a1.routingStatus",
        json!({ "routingStatus": { "status": "IDLE" } }),
    ));
    assert!(wait_for(WAIT, || monitor.user_routing("a1").is_some()).await);
    assert_eq!(
        monitor.user_presence("a1").unwrap().presence,
        PresenceBucket::Available
    );
    assert_eq!(monitor.user_routing("a1").unwrap().status, RoutingStatus::Idle);
}

// ---- Test 2: Seed and periodic reconcile ----

#[tokio::test(start_paused = true)]
async fn test_seed_reconcile_runs_before_any_push() {
    let platform = MockPlatform::new();
    platform.set_users_status(UsersStatusSnapshot {
        presence: [(
            "a1".to_string(),
            json!({ "presenceDefinition": { "systemPresence": "Busy" } }),
        )]
        .into(),
        routing: Default::default(),
    });
    platform.set_conversations(vec![queued_call()]);
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    watching(&monitor, &platform).await;

    let targets = ReconcileTargets {
        user_ids: vec!["a1".into()],
        queue_ids: vec!["q1".into()],
        org_wide: false,
    };
    let now = Utc::now();
    let outcome = monitor.reconcile(&targets, now).await;
    assert_eq!(outcome.staleness, Staleness::NeverReceived);
    assert!(matches!(
        outcome.result(SnapshotPurpose::UserStatus),
        Some(FetchResult::Fetched { records: 1 })
    ));
    assert!(matches!(
        outcome.result(SnapshotPurpose::Conversations),
        Some(FetchResult::Fetched { records: 1 })
    ));
    assert_eq!(
        monitor.user_presence("a1").unwrap().presence,
        PresenceBucket::Busy
    );
    let c1 = monitor.store().conversation("c1").unwrap();
    assert_eq!(c1.source, RecordSource::Pull);
    assert_eq!(
        platform.conversation_queries()[0].queue_ids,
        vec!["q1".to_string()]
    );

    // Push now flows, so a pass shortly after has nothing due.
    platform.broadcast(&frame(
        "v2.users.a1.presence",
        json!({ "presenceDefinition": { "systemPresence": "Busy" } }),
    ));
    assert!(wait_for(WAIT, || monitor.counters().events == 1).await);
    let later = monitor.reconcile(&targets, Utc::now() + secs(10)).await;
    assert_eq!(later.staleness, Staleness::Fresh);
    assert!(later.purposes.is_empty());
    assert_eq!(platform.snapshot_calls(SnapshotPurpose::UserStatus), 1);
}

#[tokio::test(start_paused = true)]
async fn test_org_wide_targets_query_without_filters() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);

    let targets = ReconcileTargets {
        org_wide: true,
        ..ReconcileTargets::default()
    };
    let outcome = monitor.reconcile(&targets, Utc::now()).await;
    assert_eq!(outcome.staleness, Staleness::Disconnected);
    assert!(outcome.result(SnapshotPurpose::UserStatus).is_none());
    let query = &platform.conversation_queries()[0];
    assert!(query.queue_ids.is_empty());
    assert!(query.user_ids.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_prunes_conversations_it_no_longer_lists() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();

    let mut stale = ConversationRecord::new("old", InteractionState::Waiting, RecordSource::Push, now - secs(30));
    stale.queue_id = Some("q1".into());
    monitor.store().merge_conversation(stale);
    let mut elsewhere =
        ConversationRecord::new("other", InteractionState::Waiting, RecordSource::Push, now - secs(30));
    elsewhere.queue_id = Some("q9".into());
    monitor.store().merge_conversation(elsewhere);

    let targets = ReconcileTargets {
        queue_ids: vec!["q1".into()],
        ..ReconcileTargets::default()
    };
    monitor.reconcile(&targets, now).await;
    assert!(monitor.store().conversation("old").is_none());
    assert!(monitor.store().conversation("other").is_some());
}

// ---- Test 3: Reservations across sessions ----

#[tokio::test(start_paused = true)]
async fn test_sessions_of_one_org_share_a_single_fetch() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let first = monitor(&registry, &platform);
    let second = monitor(&registry, &platform);
    let now = Utc::now();

    let a = first.reconcile(&users(&["a1"]), now).await;
    let b = second.reconcile(&users(&["a1"]), now).await;
    assert!(matches!(
        a.result(SnapshotPurpose::UserStatus),
        Some(FetchResult::Fetched { .. })
    ));
    assert_eq!(
        b.result(SnapshotPurpose::UserStatus),
        Some(&FetchResult::Deferred)
    );
    assert_eq!(platform.snapshot_calls(SnapshotPurpose::UserStatus), 1);
    assert!(Arc::ptr_eq(first.store(), second.store()));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sessions_fetch_once() {
    let platform = MockPlatform::new();
    platform.set_snapshot_delay(Duration::from_millis(100));
    let registry = OrgRegistry::new();
    let first = monitor(&registry, &platform);
    let second = monitor(&registry, &platform);
    let now = Utc::now();
    let targets = users(&["a1"]);

    let (a, b) = tokio::join!(first.reconcile(&targets, now), second.reconcile(&targets, now));
    let results = [
        a.result(SnapshotPurpose::UserStatus).cloned(),
        b.result(SnapshotPurpose::UserStatus).cloned(),
    ];
    let fetched = results
        .iter()
        .filter(|r| matches!(r, Some(FetchResult::Fetched { .. })))
        .count();
    let deferred = results
        .iter()
        .filter(|r| matches!(r, Some(FetchResult::Deferred)))
        .count();
    assert_eq!((fetched, deferred), (1, 1));
    assert_eq!(platform.snapshot_calls(SnapshotPurpose::UserStatus), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetch_releases_reservation() {
    let platform = MockPlatform::new();
    platform.fail_next_snapshots(1);
    let registry = OrgRegistry::new();
    let first = monitor(&registry, &platform);
    let second = monitor(&registry, &platform);
    let now = Utc::now();

    let failed = first.reconcile(&users(&["a1"]), now).await;
    assert!(matches!(
        failed.result(SnapshotPurpose::UserStatus),
        Some(FetchResult::Failed(_))
    ));
    assert_eq!(first.counters().snapshot_failures, 1);

    let retried = second.reconcile(&users(&["a1"]), now).await;
    assert!(matches!(
        retried.result(SnapshotPurpose::UserStatus),
        Some(FetchResult::Fetched { .. })
    ));
    assert_eq!(platform.snapshot_calls(SnapshotPurpose::UserStatus), 2);
}

// ---- Test 4: Pull never regresses fresher push ----

#[tokio::test(start_paused = true)]
async fn test_stale_pull_does_not_downgrade_push_state() {
    let platform = MockPlatform::new();
    platform.set_conversations(vec![queued_call()]);
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    watching(&monitor, &platform).await;

    platform.broadcast(&frame("v2.routing.queues.q1.conversations", answered_call()));
    assert!(wait_for(WAIT, || monitor.store().conversation("c1").is_some()).await);

    let fetched_before_push: DateTime<Utc> = Utc::now() - secs(10);
    let targets = ReconcileTargets {
        queue_ids: vec!["q1".into()],
        ..ReconcileTargets::default()
    };
    monitor.reconcile(&targets, fetched_before_push).await;

    let c1 = monitor.store().conversation("c1").unwrap();
    assert_eq!(c1.state, InteractionState::Interacting);
    assert_eq!(c1.agent_id.as_deref(), Some("a1"));
}

#[tokio::test(start_paused = true)]
async fn test_end_pushed_during_fetch_is_not_undone_by_snapshot() {
    let platform = MockPlatform::new();
    platform.set_conversations(vec![queued_call()]);
    platform.set_snapshot_delay(Duration::from_millis(200));
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    watching(&monitor, &platform).await;

    let topic = "v2.routing.queues.q1.conversations";
    platform.broadcast(&frame(topic, queued_call()));
    assert!(wait_for(WAIT, || monitor.store().conversation("c1").is_some()).await);

    let targets = ReconcileTargets {
        queue_ids: vec!["q1".into()],
        ..ReconcileTargets::default()
    };
    let now = Utc::now();
    let (outcome, ended) = tokio::join!(monitor.reconcile(&targets, now), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        platform.broadcast(&frame(
            topic,
            json!({ "id": "c1", "conversationEnd": "2026-03-01T10:05:00Z" }),
        ));
        wait_for(WAIT, || monitor.store().conversation("c1").is_none()).await
    });
    assert!(ended);
    assert!(matches!(
        outcome.result(SnapshotPurpose::Conversations),
        Some(FetchResult::Fetched { .. })
    ));
    assert!(monitor.store().conversation("c1").is_none());
    assert!(monitor.active_conversations(Duration::from_secs(3600)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_truncated_snapshot_keeps_unlisted_conversations() {
    let platform = MockPlatform::new();
    platform.set_truncated_conversations(vec![queued_call()]);
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();

    let mut tracked =
        ConversationRecord::new("c2", InteractionState::Interacting, RecordSource::Push, now - secs(30));
    tracked.queue_id = Some("q1".into());
    monitor.store().merge_conversation(tracked);

    let targets = ReconcileTargets {
        queue_ids: vec!["q1".into()],
        ..ReconcileTargets::default()
    };
    let outcome = monitor.reconcile(&targets, now).await;
    assert!(matches!(
        outcome.result(SnapshotPurpose::Conversations),
        Some(FetchResult::Fetched { records: 1 })
    ));
    assert!(monitor.store().conversation("c1").is_some());
    assert!(monitor.store().conversation("c2").is_some());
}

// ---- Test 5: Queue summary quality gate ----

#[tokio::test(start_paused = true)]
async fn test_queue_summary_falls_back_to_pull() {
    let platform = MockPlatform::new();
    platform.set_queue_observations(vec![QueueCounts {
        queue_id: "q1".into(),
        waiting: 3,
        interacting: 2,
    }]);
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();

    let view = monitor.queue_summary(&["q1".into()], now).await;
    assert_eq!(view.source, CountsSource::Pull);
    assert_eq!(view.queues[0].waiting, 3);

    // Cached aggregate is reused within the reservation interval.
    monitor.queue_summary(&["q1".into()], now + secs(1)).await;
    assert_eq!(platform.snapshot_calls(SnapshotPurpose::QueueObservations), 1);
}

#[tokio::test(start_paused = true)]
async fn test_queue_summary_trusts_matching_push() {
    let platform = MockPlatform::new();
    platform.set_queue_observations(vec![QueueCounts {
        queue_id: "q1".into(),
        waiting: 1,
        interacting: 0,
    }]);
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();
    let mut waiting = ConversationRecord::new("c1", InteractionState::Waiting, RecordSource::Push, now);
    waiting.queue_id = Some("q1".into());
    monitor.store().merge_conversation(waiting);

    let view = monitor.queue_summary(&["q1".into()], now).await;
    assert_eq!(view.source, CountsSource::Push);
    assert_eq!(view.queues[0].waiting, 1);
}

// ---- Test 6: Health ----

#[tokio::test(start_paused = true)]
async fn test_health_follows_push_path() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    assert!(matches!(
        monitor.health(Utc::now()).await,
        HealthStatus::Unhealthy(_)
    ));

    watching(&monitor, &platform).await;
    let d = monitor.diagnostics(Utc::now()).await;
    assert!(d.connected);
    assert_eq!(d.channel_ids, vec!["ch-1".to_string()]);
    assert!(matches!(
        monitor.health(Utc::now()).await,
        HealthStatus::Degraded(_)
    ));

    platform.broadcast(&frame("channel.metadata", json!({ "message": "WebSocket Heartbeat" })));
    platform.broadcast(&frame(
        "v2.users.a1.presence",
        json!({ "presenceDefinition": { "systemPresence": "Away" } }),
    ));
    assert!(wait_for(WAIT, || monitor.counters().events == 1).await);
    assert_eq!(monitor.health(Utc::now()).await, HealthStatus::Healthy);

    // Quiet longer than the cooldown.
    let quiet = monitor.health(Utc::now() + secs(600)).await;
    assert!(matches!(quiet, HealthStatus::Degraded(_)));

    // Inside the reconnect backoff nothing is connected.
    assert!(platform.drop_socket("ch-1"));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(matches!(
        monitor.health(Utc::now()).await,
        HealthStatus::Unhealthy(_)
    ));
}

// ---- Test 7: Eviction ----

#[tokio::test]
async fn test_evict_keeps_records_at_exact_max_age() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();
    let max_age = MonitorSettings::default().max_record_age;
    let max_age_chrono = chrono::Duration::from_std(max_age).unwrap();

    monitor.store().merge_conversation(ConversationRecord::new(
        "edge",
        InteractionState::Waiting,
        RecordSource::Push,
        now - max_age_chrono,
    ));
    monitor.store().merge_conversation(ConversationRecord::new(
        "expired",
        InteractionState::Waiting,
        RecordSource::Push,
        now - max_age_chrono - secs(1),
    ));

    let evicted = monitor.evict(now);
    assert_eq!(evicted.conversations, 1);
    assert!(monitor.store().conversation("edge").is_some());
    assert!(monitor.store().conversation("expired").is_none());
}

#[tokio::test]
async fn test_status_reads_drop_expired_records() {
    let platform = MockPlatform::new();
    let registry = OrgRegistry::new();
    let monitor = monitor(&registry, &platform);
    let now = Utc::now();
    let max_age = chrono::Duration::from_std(MonitorSettings::default().max_record_age).unwrap();

    for (user, age) in [("fresh", max_age), ("stale", max_age + secs(1))] {
        monitor.store().apply_presence(PresenceRecord {
            user_id: user.into(),
            presence: PresenceBucket::Available,
            observed_at: now - age,
            updated_at: now - age,
            source: RecordSource::Push,
        });
        monitor.store().apply_routing(RoutingRecord {
            user_id: user.into(),
            status: RoutingStatus::Idle,
            observed_at: now - age,
            updated_at: now - age,
            source: RecordSource::Push,
        });
    }

    assert!(monitor.user_presence_at("fresh", now).is_some());
    assert!(monitor.user_routing_at("fresh", now).is_some());
    assert!(monitor.user_presence_at("stale", now).is_none());
    assert!(monitor.user_routing_at("stale", now).is_none());
    assert_eq!(monitor.store().presence_count(), 1);
    assert_eq!(monitor.store().routing_count(), 1);
}

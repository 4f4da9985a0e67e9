// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared push-path health: freshness timestamps and suppressed-error counters.
//!
//! Every failure the engine absorbs instead of surfacing lands here, and is
//! mirrored to the metrics recorder when the `prometheus` feature is enabled.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use livedesk_core::SnapshotPurpose;

/// Sentinel for "never happened" in the millisecond timestamps.
const NEVER: i64 = i64::MIN;

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn instant(ms: i64) -> Option<DateTime<Utc>> {
    if ms == NEVER {
        None
    } else {
        DateTime::from_timestamp_millis(ms)
    }
}

#[derive(Debug)]
pub struct PushHealth {
    last_message_ms: AtomicI64,
    last_event_ms: AtomicI64,
    frames: AtomicU64,
    events: AtomicU64,
    malformed: AtomicU64,
    transport_errors: AtomicU64,
    reconnects: AtomicU64,
    rotations: AtomicU64,
    snapshot_fetches: AtomicU64,
    snapshot_failures: AtomicU64,
    dropped_topics: AtomicU64,
}

impl Default for PushHealth {
    fn default() -> Self {
        Self {
            last_message_ms: AtomicI64::new(NEVER),
            last_event_ms: AtomicI64::new(NEVER),
            frames: AtomicU64::new(0),
            events: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            snapshot_fetches: AtomicU64::new(0),
            snapshot_failures: AtomicU64::new(0),
            dropped_topics: AtomicU64::new(0),
        }
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounters {
    pub frames: u64,
    pub events: u64,
    pub malformed: u64,
    pub transport_errors: u64,
    pub reconnects: u64,
    pub rotations: u64,
    pub snapshot_fetches: u64,
    pub snapshot_failures: u64,
    pub dropped_topics: u64,
}

impl PushHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any frame arrived on any socket.
    pub fn record_frame(&self, at: DateTime<Utc>) {
        self.last_message_ms.fetch_max(millis(at), Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_frame();
    }

    /// A frame was classified as an entity event.
    pub fn record_event(&self, kind: &'static str, at: DateTime<Utc>) {
        self.last_event_ms.fetch_max(millis(at), Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_event(kind);
        #[cfg(not(feature = "prometheus"))]
        let _ = kind;
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_malformed_frame();
    }

    pub fn record_transport_error(&self, stage: &'static str) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_transport_error(stage);
        #[cfg(not(feature = "prometheus"))]
        let _ = stage;
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_reconnect();
    }

    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_rotation();
    }

    pub fn record_snapshot_fetch(&self, purpose: SnapshotPurpose) {
        self.snapshot_fetches.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_snapshot_fetch(&purpose.to_string());
        #[cfg(not(feature = "prometheus"))]
        let _ = purpose;
    }

    pub fn record_snapshot_failure(&self, purpose: SnapshotPurpose) {
        self.snapshot_failures.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::record_snapshot_failure(&purpose.to_string());
        #[cfg(not(feature = "prometheus"))]
        let _ = purpose;
    }

    /// Topics left out of the current shard plan.
    pub fn set_dropped_topics(&self, count: usize) {
        self.dropped_topics.store(count as u64, Ordering::Relaxed);
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::set_dropped_topics(count as f64);
    }

    /// Mirror the size of the live conversation set to the metrics gauge.
    pub fn observe_active_conversations(&self, count: usize) {
        #[cfg(feature = "prometheus")]
        livedesk_prometheus::set_active_conversations(count as f64);
        #[cfg(not(feature = "prometheus"))]
        let _ = count;
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        instant(self.last_message_ms.load(Ordering::Relaxed))
    }

    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        instant(self.last_event_ms.load(Ordering::Relaxed))
    }

    pub fn counters(&self) -> HealthCounters {
        HealthCounters {
            frames: self.frames.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            snapshot_fetches: self.snapshot_fetches.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
            dropped_topics: self.dropped_topics.load(Ordering::Relaxed),
        }
    }
}

// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.

use metrics::{describe_counter, describe_gauge};

/// Register all Livedesk metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("livedesk_frames_total", "Socket frames received");
    describe_counter!(
        "livedesk_events_total",
        "Frames classified as entity events, by kind"
    );
    describe_counter!(
        "livedesk_malformed_frames_total",
        "Frames or snapshot records that could not be interpreted"
    );
    describe_counter!(
        "livedesk_transport_errors_total",
        "Push-path failures, by stage"
    );
    describe_counter!("livedesk_reconnects_total", "Socket reopens after a close");
    describe_counter!(
        "livedesk_rotations_total",
        "Channels replaced ahead of their expiry"
    );
    describe_counter!(
        "livedesk_snapshot_fetches_total",
        "REST snapshot fetches, by purpose"
    );
    describe_counter!(
        "livedesk_snapshot_failures_total",
        "Failed REST snapshot fetches, by purpose"
    );
    describe_gauge!(
        "livedesk_dropped_topics",
        "Topics left unsubscribed over channel capacity"
    );
    describe_gauge!(
        "livedesk_active_conversations",
        "Conversations last returned by an active query"
    );
}

pub fn record_frame() {
    metrics::counter!("livedesk_frames_total").increment(1);
}

/// Record an entity event of `kind` (`presence`, `routing`, `conversation`).
pub fn record_event(kind: &'static str) {
    metrics::counter!("livedesk_events_total", "kind" => kind).increment(1);
}

pub fn record_malformed_frame() {
    metrics::counter!("livedesk_malformed_frames_total").increment(1);
}

/// Record a push-path failure at `stage` (`establish`, `open`, `rotate`, `read`).
pub fn record_transport_error(stage: &'static str) {
    metrics::counter!("livedesk_transport_errors_total", "stage" => stage).increment(1);
}

pub fn record_reconnect() {
    metrics::counter!("livedesk_reconnects_total").increment(1);
}

pub fn record_rotation() {
    metrics::counter!("livedesk_rotations_total").increment(1);
}

pub fn record_snapshot_fetch(purpose: &str) {
    metrics::counter!("livedesk_snapshot_fetches_total", "purpose" => purpose.to_string())
        .increment(1);
}

pub fn record_snapshot_failure(purpose: &str) {
    metrics::counter!("livedesk_snapshot_failures_total", "purpose" => purpose.to_string())
        .increment(1);
}

pub fn set_dropped_topics(count: f64) {
    metrics::gauge!("livedesk_dropped_topics").set(count);
}

pub fn set_active_conversations(count: f64) {
    metrics::gauge!("livedesk_active_conversations").set(count);
}

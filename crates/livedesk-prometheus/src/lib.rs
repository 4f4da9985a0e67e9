// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Livedesk live-state engine.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The engine
//! records through the helpers in [`recording`]; [`PrometheusAdapter`]
//! installs the process-wide recorder and renders text format.

pub mod recording;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use livedesk_core::LivedeskError;

pub use recording::{
    record_event, record_frame, record_malformed_frame, record_reconnect, record_rotation,
    record_snapshot_failure, record_snapshot_fetch, record_transport_error,
    set_active_conversations, set_dropped_topics,
};

/// Installed Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, LivedeskError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LivedeskError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;

    use super::*;

    #[test]
    fn helpers_render_through_local_recorder() {
        // A local recorder keeps the test off the global one.
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            recording::register_metrics();
            record_frame();
            record_frame();
            record_event("conversation");
            record_snapshot_failure("user_status");
            set_dropped_topics(3.0);
        });

        let text = handle.render();
        assert!(text.contains("livedesk_frames_total 2"));
        assert!(text.contains("livedesk_events_total{kind=\"conversation\"} 1"));
        assert!(text.contains("livedesk_snapshot_failures_total{purpose=\"user_status\"} 1"));
        assert!(text.contains("livedesk_dropped_topics 3"));
    }
}

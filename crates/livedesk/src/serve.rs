// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `livedesk serve`: mirror the configured watch set until shut down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use livedesk_config::LivedeskConfig;
use livedesk_core::{HealthStatus, LivedeskError, OrgId};
use livedesk_live::{
    ConversationRecord, InteractionState, LiveMonitor, MonitorSettings, OrgRegistry, QueueView,
    ReconcileTargets,
};
use livedesk_platform::PlatformClient;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::shutdown;

#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// Rewrite this file with Prometheus text after every pass.
    pub metrics_file: Option<PathBuf>,
}

/// Counts logged after every pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub active: usize,
    pub waiting: usize,
    pub interacting: usize,
    pub ivr: usize,
    pub longest_wait: Option<Duration>,
}

impl Summary {
    pub fn from_conversations(active: &[ConversationRecord], now: DateTime<Utc>) -> Self {
        let mut summary = Self {
            active: active.len(),
            ..Self::default()
        };
        for record in active {
            match record.state {
                InteractionState::Waiting => {
                    summary.waiting += 1;
                    let wait = record.wait_at(now);
                    summary.longest_wait = summary.longest_wait.max(wait);
                }
                InteractionState::Interacting => summary.interacting += 1,
                InteractionState::Ivr => summary.ivr += 1,
                InteractionState::Unknown => {}
            }
        }
        summary
    }
}

fn targets(config: &LivedeskConfig) -> ReconcileTargets {
    ReconcileTargets {
        user_ids: config.watch.user_ids.clone(),
        queue_ids: config.watch.queue_ids.clone(),
        org_wide: config.watch.org_wide,
    }
}

pub async fn run_serve(config: LivedeskConfig, options: ServeOptions) -> Result<(), LivedeskError> {
    let client = Arc::new(PlatformClient::new(&config.platform)?);
    let cancel = shutdown::install_signal_handler();

    #[cfg(feature = "prometheus")]
    let exporter = match &options.metrics_file {
        Some(_) => Some(livedesk_prometheus::PrometheusAdapter::new()?),
        None => None,
    };
    #[cfg(not(feature = "prometheus"))]
    {
        if options.metrics_file.is_some() {
            warn!("metrics file requested but livedesk was built without the prometheus feature");
        }
    }

    let registry = OrgRegistry::new();
    let org_id = OrgId(config.platform.org_id.clone());
    let monitor = LiveMonitor::new(
        registry.acquire(&org_id),
        client.clone(),
        client,
        MonitorSettings::from_config(&config),
    );

    let targets = targets(&config);
    let outcome = monitor.watch(&targets.user_ids, &targets.queue_ids).await;
    info!(
        org = %org_id,
        users = targets.user_ids.len(),
        queues = targets.queue_ids.len(),
        org_wide = targets.org_wide,
        ?outcome,
        "livedesk started"
    );

    let max_age = config.watch.conversation_max_age();
    let mut interval = tokio::time::interval(config.reconcile.ui_refresh_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                pass(&monitor, &targets, max_age).await;
                #[cfg(feature = "prometheus")]
                {
                    if let (Some(exporter), Some(path)) = (&exporter, &options.metrics_file) {
                        if let Err(e) = tokio::fs::write(path, exporter.render()).await {
                            warn!(path = %path.display(), error = %e, "failed to write metrics file");
                        }
                    }
                }
            }
        }
    }

    info!("shutting down");
    monitor.stop().await;
    drop(monitor);
    registry.release_idle(&org_id);
    Ok(())
}

/// One refresh: repair, evict, then log what the query surface would show.
async fn pass(monitor: &LiveMonitor, targets: &ReconcileTargets, max_age: Duration) {
    let now = Utc::now();
    let outcome = monitor.reconcile(targets, now).await;
    let evicted = monitor.evict(now);
    let active = monitor.active_conversations_at(max_age, now);
    let summary = Summary::from_conversations(&active, now);

    info!(
        staleness = ?outcome.staleness,
        fetched = outcome.fetched_any(),
        evicted = evicted.total(),
        active = summary.active,
        waiting = summary.waiting,
        interacting = summary.interacting,
        ivr = summary.ivr,
        longest_wait_secs = summary.longest_wait.map(|w| w.as_secs()),
        "live summary"
    );

    if !targets.queue_ids.is_empty() {
        let view: QueueView = monitor.queue_summary(&targets.queue_ids, now).await;
        for queue in &view.queues {
            info!(
                queue_id = %queue.queue_id,
                waiting = queue.waiting,
                interacting = queue.interacting,
                source = ?view.source,
                "queue counts"
            );
        }
    }

    match monitor.health(now).await {
        HealthStatus::Healthy => {}
        HealthStatus::Degraded(reason) => warn!(%reason, "push path degraded"),
        HealthStatus::Unhealthy(reason) => warn!(%reason, "push path unhealthy"),
    }
}

// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality gate between push-derived and pull queue aggregates.

use livedesk_config::model::QualityConfig;
use livedesk_core::QueueCounts;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityPolicy {
    /// Share of pull-observed queues that push state must also see.
    pub min_queue_coverage: f64,
    /// Push total over pull total that must be reached.
    pub min_total_ratio: f64,
}

impl QualityPolicy {
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            min_queue_coverage: config.min_queue_coverage,
            min_total_ratio: config.min_total_ratio,
        }
    }
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::from_config(&QualityConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CountsSource {
    Push,
    Pull,
}

/// The per-queue counts to report, and how they were chosen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueView {
    pub source: CountsSource,
    pub queues: Vec<QueueCounts>,
    /// Share of pull-active queues with any push activity.
    pub coverage: f64,
    /// Push total divided by pull total.
    pub total_ratio: f64,
}

/// Trust push counts only when they cover enough of what the pull aggregate sees.
///
/// With no pull activity at all there is nothing to contradict push, so push
/// is reported.
pub fn choose_queue_view(
    push: &[QueueCounts],
    pull: &[QueueCounts],
    policy: &QualityPolicy,
) -> QueueView {
    let pull_active: Vec<&QueueCounts> = pull.iter().filter(|c| c.total() > 0).collect();
    let pull_total: u64 = pull.iter().map(|c| u64::from(c.total())).sum();
    let push_total: u64 = push.iter().map(|c| u64::from(c.total())).sum();

    if pull_active.is_empty() || pull_total == 0 {
        return QueueView {
            source: CountsSource::Push,
            queues: push.to_vec(),
            coverage: 1.0,
            total_ratio: 1.0,
        };
    }

    let seen_by_push = pull_active
        .iter()
        .filter(|p| {
            push.iter()
                .any(|c| c.queue_id == p.queue_id && c.total() > 0)
        })
        .count();
    let coverage = seen_by_push as f64 / pull_active.len() as f64;
    let total_ratio = push_total as f64 / pull_total as f64;

    let trusted = coverage >= policy.min_queue_coverage && total_ratio >= policy.min_total_ratio;
    QueueView {
        source: if trusted {
            CountsSource::Push
        } else {
            CountsSource::Pull
        },
        queues: if trusted { push.to_vec() } else { pull.to_vec() },
        coverage,
        total_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(queue: &str, waiting: u32, interacting: u32) -> QueueCounts {
        QueueCounts {
            queue_id: queue.into(),
            waiting,
            interacting,
        }
    }

    #[test]
    fn push_is_trusted_when_it_matches_pull() {
        let push = vec![counts("q1", 2, 3), counts("q2", 1, 0)];
        let pull = vec![counts("q1", 2, 3), counts("q2", 1, 1)];
        let view = choose_queue_view(&push, &pull, &QualityPolicy::default());
        assert_eq!(view.source, CountsSource::Push);
        assert_eq!(view.queues, push);
        assert!((view.coverage - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn low_coverage_falls_back_to_pull() {
        let push = vec![counts("q1", 5, 5)];
        let pull = vec![counts("q1", 5, 5), counts("q2", 1, 0), counts("q3", 1, 0)];
        let view = choose_queue_view(&push, &pull, &QualityPolicy::default());
        assert_eq!(view.source, CountsSource::Pull);
        assert_eq!(view.queues, pull);
        assert!(view.coverage < 0.6);
    }

    #[test]
    fn low_total_ratio_falls_back_to_pull() {
        let push = vec![counts("q1", 1, 0), counts("q2", 1, 0)];
        let pull = vec![counts("q1", 5, 0), counts("q2", 5, 0)];
        let view = choose_queue_view(&push, &pull, &QualityPolicy::default());
        assert_eq!(view.source, CountsSource::Pull);
        assert!((view.total_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn thresholds_are_configurable() {
        let push = vec![counts("q1", 1, 0), counts("q2", 1, 0)];
        let pull = vec![counts("q1", 5, 0), counts("q2", 5, 0)];
        let lenient = QualityPolicy {
            min_queue_coverage: 0.5,
            min_total_ratio: 0.1,
        };
        assert_eq!(choose_queue_view(&push, &pull, &lenient).source, CountsSource::Push);
    }

    #[test]
    fn idle_pull_never_overrides_push() {
        let push = vec![counts("q1", 0, 1)];
        let pull = vec![counts("q1", 0, 0)];
        assert_eq!(
            choose_queue_view(&push, &pull, &QualityPolicy::default()).source,
            CountsSource::Push
        );
    }
}

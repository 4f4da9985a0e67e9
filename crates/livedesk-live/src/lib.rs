// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-state synchronization engine.
//!
//! Mirrors agent presence, routing status and in-flight conversations of a
//! contact-center org from push-notification channels, repairs gaps from
//! rate-limited REST snapshots, and answers queries from memory.
//!
//! Start with [`LiveMonitor`], built from an [`OrgHandle`] obtained from an
//! [`OrgRegistry`] and the platform collaborator traits.

pub mod channel;
pub mod classify;
pub mod extract;
pub mod health;
pub mod monitor;
pub mod quality;
pub mod reconcile;
pub mod record;
pub mod registry;
pub mod reservation;
pub mod shard;
pub mod store;
pub mod topic;

pub use channel::{ChannelSettings, NotificationChannel, StartOutcome};
pub use classify::{EventClassifier, FrameHandler, Handled};
pub use health::{HealthCounters, PushHealth};
pub use monitor::{Diagnostics, LiveMonitor, MonitorSettings};
pub use quality::{CountsSource, QualityPolicy, QueueView, choose_queue_view};
pub use reconcile::{
    FetchResult, HybridReconciler, PushStatus, ReconcileOutcome, ReconcilePolicy,
    ReconcileTargets, Staleness,
};
pub use record::{
    ConversationRecord, Direction, InteractionState, MediaType, PresenceBucket, PresenceRecord,
    RecordSource, RoutingRecord, RoutingStatus, WaitClock,
};
pub use registry::{OrgHandle, OrgRegistry};
pub use reservation::{Reservation, ReservationBook, ReservationKey};
pub use shard::{Coverage, ShardLimits, ShardPlan, ShardedSubscription, plan_shards};
pub use store::{Evicted, LiveStore};

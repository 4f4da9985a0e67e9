// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the engine and the platform client.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// An addressable event stream identifier, e.g. `v2.users.{id}.presence`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(pub String);

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of the organization whose live state is being mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by the engine's diagnostic accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Push path connected and fresh.
    Healthy,
    /// Operational but stale, partially covered, or reconnecting.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// A server-side notification channel as returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEndpoint {
    /// Platform channel id, used for subscriptions.
    pub id: String,
    /// Socket address to connect to.
    pub connect_uri: String,
    /// Server-advertised expiry, when the platform reports one.
    pub expires: Option<DateTime<Utc>>,
}

/// Per-user presence and routing bodies returned by a status scan.
///
/// Values are shaped like the corresponding push event bodies so the same
/// classifier can interpret both paths.
#[derive(Debug, Clone, Default)]
pub struct UsersStatusSnapshot {
    pub presence: HashMap<String, serde_json::Value>,
    pub routing: HashMap<String, serde_json::Value>,
}

/// Query parameters for a recent-conversations snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationQuery {
    /// Only conversations touching these queues; empty means org-wide.
    pub queue_ids: Vec<String>,
    /// Only conversations involving these users; empty means no user filter.
    pub user_ids: Vec<String>,
    /// How far back the conversation start may lie.
    pub lookback: std::time::Duration,
}

/// Conversation bodies returned by a recent-conversations snapshot.
///
/// `complete` is false when the source stopped early (page limit), so the
/// list cannot prove that an unlisted conversation has ended.
#[derive(Debug, Clone, Default)]
pub struct ConversationSnapshot {
    pub conversations: Vec<serde_json::Value>,
    pub complete: bool,
}

impl ConversationSnapshot {
    pub fn complete(conversations: Vec<serde_json::Value>) -> Self {
        Self {
            conversations,
            complete: true,
        }
    }

    pub fn truncated(conversations: Vec<serde_json::Value>) -> Self {
        Self {
            conversations,
            complete: false,
        }
    }
}

/// Per-queue interaction counts, from a pull aggregate or derived from push state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queue_id: String,
    pub waiting: u32,
    pub interacting: u32,
}

impl QueueCounts {
    pub fn total(&self) -> u32 {
        self.waiting + self.interacting
    }
}

/// What a snapshot fetch is for; part of the reservation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum SnapshotPurpose {
    UserStatus,
    Conversations,
    QueueObservations,
}

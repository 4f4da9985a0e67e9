// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST snapshot sources used by the reconciler.

use async_trait::async_trait;

use crate::error::LivedeskError;
use crate::types::{ConversationQuery, ConversationSnapshot, QueueCounts, UsersStatusSnapshot};

/// Authoritative but rate-limited pull sources.
#[async_trait]
pub trait SnapshotApi: Send + Sync + 'static {
    /// Current presence and routing status for the given users.
    async fn users_status_scan(
        &self,
        user_ids: &[String],
    ) -> Result<UsersStatusSnapshot, LivedeskError>;

    /// Open conversations started within the query's lookback window.
    async fn recent_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationSnapshot, LivedeskError>;

    /// Queue-level waiting/interacting aggregates.
    async fn queue_observations(
        &self,
        queue_ids: &[String],
    ) -> Result<Vec<QueueCounts>, LivedeskError>;
}

// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted in-memory platform implementing both collaborator traits.
//!
//! Channels get sequential ids (`ch-1`, `ch-2`, ...) and `mock://{id}`
//! connect addresses. Every call is counted, and the next N calls of a kind
//! can be scripted to fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use livedesk_core::{
    ChannelEndpoint, ConversationQuery, ConversationSnapshot, EventSocket, LivedeskError,
    NotificationApi, QueueCounts, SnapshotApi, SnapshotPurpose, Topic, UsersStatusSnapshot,
};

use crate::mock_socket::{MockSocket, SocketLink};

#[derive(Default)]
struct Inner {
    next_channel: u32,
    channels: Vec<String>,
    subscriptions: Vec<(String, Vec<Topic>)>,
    create_calls: usize,
    open_calls: usize,
    fail_creates: u32,
    fail_subscribes: u32,
    fail_opens: u32,
    expiry: Option<DateTime<Utc>>,
    sockets: Vec<Arc<SocketLink>>,
    users_status: UsersStatusSnapshot,
    conversations: Vec<Value>,
    conversations_truncated: bool,
    queue_counts: Vec<QueueCounts>,
    snapshot_calls: HashMap<SnapshotPurpose, usize>,
    conversation_queries: Vec<ConversationQuery>,
    fail_snapshots: u32,
    snapshot_delay: Duration,
}

/// Consume one scripted failure, if any is pending.
fn take_failure(pending: &mut u32) -> bool {
    if *pending > 0 {
        *pending -= 1;
        true
    } else {
        false
    }
}

/// A mock platform for testing channel, reconcile and monitor code.
#[derive(Default)]
pub struct MockPlatform {
    inner: Mutex<Inner>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- scripting ---

    pub fn fail_next_creates(&self, n: u32) {
        self.lock().fail_creates = n;
    }

    pub fn fail_next_subscribes(&self, n: u32) {
        self.lock().fail_subscribes = n;
    }

    pub fn fail_next_opens(&self, n: u32) {
        self.lock().fail_opens = n;
    }

    pub fn fail_next_snapshots(&self, n: u32) {
        self.lock().fail_snapshots = n;
    }

    /// Expiry reported on channels created from now on.
    pub fn set_channel_expiry(&self, expires: Option<DateTime<Utc>>) {
        self.lock().expiry = expires;
    }

    /// Delay every snapshot call by `delay` before answering.
    pub fn set_snapshot_delay(&self, delay: Duration) {
        self.lock().snapshot_delay = delay;
    }

    pub fn set_users_status(&self, snapshot: UsersStatusSnapshot) {
        self.lock().users_status = snapshot;
    }

    pub fn set_conversations(&self, conversations: Vec<Value>) {
        let mut inner = self.lock();
        inner.conversations = conversations;
        inner.conversations_truncated = false;
    }

    /// Like [`set_conversations`](Self::set_conversations), but the snapshot
    /// reports that it stopped at a page limit.
    pub fn set_truncated_conversations(&self, conversations: Vec<Value>) {
        let mut inner = self.lock();
        inner.conversations = conversations;
        inner.conversations_truncated = true;
    }

    pub fn set_queue_observations(&self, counts: Vec<QueueCounts>) {
        self.lock().queue_counts = counts;
    }

    // --- server-side socket control ---

    fn live_link(&self, channel_id: &str) -> Option<Arc<SocketLink>> {
        self.lock()
            .sockets
            .iter()
            .rev()
            .find(|l| l.channel_id() == channel_id && l.is_open())
            .cloned()
    }

    /// Send a frame on the open socket of `channel_id`. Returns false if none is open.
    pub fn push_frame(&self, channel_id: &str, frame: impl Into<String>) -> bool {
        match self.live_link(channel_id) {
            Some(link) => {
                link.push(frame);
                true
            }
            None => false,
        }
    }

    /// Send a frame on every open socket. Returns how many received it.
    pub fn broadcast(&self, frame: &str) -> usize {
        let links: Vec<Arc<SocketLink>> = self
            .lock()
            .sockets
            .iter()
            .filter(|l| l.is_open())
            .cloned()
            .collect();
        for link in &links {
            link.push(frame);
        }
        links.len()
    }

    /// Make the next read on `channel_id`'s socket fail.
    pub fn break_socket(&self, channel_id: &str) -> bool {
        match self.live_link(channel_id) {
            Some(link) => {
                link.push_error("connection reset");
                true
            }
            None => false,
        }
    }

    /// Close `channel_id`'s socket from the server side.
    pub fn drop_socket(&self, channel_id: &str) -> bool {
        match self.live_link(channel_id) {
            Some(link) => {
                link.close_from_server();
                true
            }
            None => false,
        }
    }

    // --- observations ---

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn open_calls(&self) -> usize {
        self.lock().open_calls
    }

    /// Ids of successfully created channels, oldest first.
    pub fn channel_ids(&self) -> Vec<String> {
        self.lock().channels.clone()
    }

    /// Every successful subscribe call as `(channel_id, topics)`.
    pub fn subscriptions(&self) -> Vec<(String, Vec<Topic>)> {
        self.lock().subscriptions.clone()
    }

    pub fn open_sockets(&self) -> usize {
        self.lock().sockets.iter().filter(|l| l.is_open()).count()
    }

    /// True once the client closed every socket it opened for `channel_id`.
    pub fn client_closed(&self, channel_id: &str) -> bool {
        let inner = self.lock();
        let mut links = inner
            .sockets
            .iter()
            .filter(|l| l.channel_id() == channel_id)
            .peekable();
        links.peek().is_some() && links.all(|l| l.closed_by_client())
    }

    pub fn snapshot_calls(&self, purpose: SnapshotPurpose) -> usize {
        self.lock().snapshot_calls.get(&purpose).copied().unwrap_or(0)
    }

    pub fn conversation_queries(&self) -> Vec<ConversationQuery> {
        self.lock().conversation_queries.clone()
    }

    /// Count the call, honor the scripted delay and failures.
    async fn snapshot_call(&self, purpose: SnapshotPurpose) -> Result<(), LivedeskError> {
        let (delay, fail) = {
            let mut inner = self.lock();
            *inner.snapshot_calls.entry(purpose).or_insert(0) += 1;
            let fail = take_failure(&mut inner.fail_snapshots);
            (inner.snapshot_delay, fail)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(LivedeskError::snapshot(format!(
                "scripted {purpose} failure"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationApi for MockPlatform {
    async fn create_channel(&self) -> Result<ChannelEndpoint, LivedeskError> {
        let mut inner = self.lock();
        inner.create_calls += 1;
        if take_failure(&mut inner.fail_creates) {
            return Err(LivedeskError::transport("scripted create failure"));
        }
        inner.next_channel += 1;
        let id = format!("ch-{}", inner.next_channel);
        inner.channels.push(id.clone());
        Ok(ChannelEndpoint {
            connect_uri: format!("mock://{id}"),
            id,
            expires: inner.expiry,
        })
    }

    async fn subscribe(&self, channel_id: &str, topics: &[Topic]) -> Result<(), LivedeskError> {
        let mut inner = self.lock();
        if take_failure(&mut inner.fail_subscribes) {
            return Err(LivedeskError::transport("scripted subscribe failure"));
        }
        inner
            .subscriptions
            .push((channel_id.to_string(), topics.to_vec()));
        Ok(())
    }

    async fn open_socket(
        &self,
        connect_uri: &str,
    ) -> Result<Box<dyn EventSocket>, LivedeskError> {
        let mut inner = self.lock();
        inner.open_calls += 1;
        if take_failure(&mut inner.fail_opens) {
            return Err(LivedeskError::transport("scripted open failure"));
        }
        let channel_id = connect_uri
            .strip_prefix("mock://")
            .ok_or_else(|| LivedeskError::transport(format!("unknown address {connect_uri}")))?;
        let link = SocketLink::new(channel_id);
        inner.sockets.push(link.clone());
        Ok(Box::new(MockSocket::new(link)))
    }
}

#[async_trait]
impl SnapshotApi for MockPlatform {
    async fn users_status_scan(
        &self,
        user_ids: &[String],
    ) -> Result<UsersStatusSnapshot, LivedeskError> {
        self.snapshot_call(SnapshotPurpose::UserStatus).await?;
        let inner = self.lock();
        let keep = |id: &String| user_ids.is_empty() || user_ids.contains(id);
        Ok(UsersStatusSnapshot {
            presence: inner
                .users_status
                .presence
                .iter()
                .filter(|(id, _)| keep(id))
                .map(|(id, v)| (id.clone(), v.clone()))
                .collect(),
            routing: inner
                .users_status
                .routing
                .iter()
                .filter(|(id, _)| keep(id))
                .map(|(id, v)| (id.clone(), v.clone()))
                .collect(),
        })
    }

    async fn recent_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<ConversationSnapshot, LivedeskError> {
        self.lock().conversation_queries.push(query.clone());
        self.snapshot_call(SnapshotPurpose::Conversations).await?;
        let inner = self.lock();
        Ok(ConversationSnapshot {
            conversations: inner.conversations.clone(),
            complete: !inner.conversations_truncated,
        })
    }

    async fn queue_observations(
        &self,
        queue_ids: &[String],
    ) -> Result<Vec<QueueCounts>, LivedeskError> {
        self.snapshot_call(SnapshotPurpose::QueueObservations).await?;
        Ok(self
            .lock()
            .queue_counts
            .iter()
            .filter(|c| queue_ids.is_empty() || queue_ids.contains(&c.queue_id))
            .cloned()
            .collect())
    }
}

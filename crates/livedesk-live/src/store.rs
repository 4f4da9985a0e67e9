// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent live-state store and the push/pull merge rules.
//!
//! Each map is a [`DashMap`], so every operation locks a single shard entry
//! for the duration of one record update. Nothing here performs I/O.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use livedesk_core::QueueCounts;

use crate::record::{
    ConversationRecord, Direction, InteractionState, MediaType, PresenceRecord, RecordSource,
    RoutingRecord,
};

/// Placeholder queue names the platform sends when it has nothing better.
const GENERIC_QUEUE_NAMES: &[&str] = &["queue", "unknown", "unknown queue", "n/a", "none", "-"];

/// True when `name` carries no information beyond the queue id.
pub fn is_generic_queue_name(name: &str, queue_id: Option<&str>) -> bool {
    let name = name.trim();
    name.is_empty()
        || queue_id.is_some_and(|id| name.eq_ignore_ascii_case(id))
        || GENERIC_QUEUE_NAMES
            .iter()
            .any(|g| name.eq_ignore_ascii_case(g))
}

/// What a conversation write did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Merged,
    Removed,
    /// The conversation ended after this observation was taken.
    Discarded,
}

/// Records removed by an eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evicted {
    pub presence: usize,
    pub routing: usize,
    pub conversations: usize,
}

impl Evicted {
    pub fn total(&self) -> usize {
        self.presence + self.routing + self.conversations
    }
}

/// Which stored conversations a pull snapshot is authoritative for.
#[derive(Debug, Clone, Default)]
pub struct SnapshotScope {
    pub org_wide: bool,
    pub queue_ids: HashSet<String>,
    pub user_ids: HashSet<String>,
}

impl SnapshotScope {
    fn covers(&self, record: &ConversationRecord) -> bool {
        self.org_wide
            || record.queue_id.as_ref().is_some_and(|q| self.queue_ids.contains(q))
            || record.agent_id.as_ref().is_some_and(|a| self.user_ids.contains(a))
    }
}

/// Whether `incoming` may replace the lifecycle state of `existing`.
///
/// Raising the rank is always allowed. Push never lowers it; pull lowers it
/// only when it was observed after the last push update.
fn accepts_state(existing: &ConversationRecord, incoming: &ConversationRecord) -> bool {
    if incoming.state.rank() >= existing.state.rank() {
        return true;
    }
    match (incoming.source, existing.source) {
        (RecordSource::Push, _) => false,
        (RecordSource::Pull, RecordSource::Push) => incoming.updated_at > existing.updated_at,
        (RecordSource::Pull, RecordSource::Pull) => incoming.updated_at >= existing.updated_at,
    }
}

/// Combine a stored conversation with a newer observation of it.
pub fn merge_records(
    existing: &ConversationRecord,
    incoming: ConversationRecord,
) -> ConversationRecord {
    let state_ok = accepts_state(existing, &incoming);
    let queue_id = incoming.queue_id.clone().or_else(|| existing.queue_id.clone());

    let queue_name = match incoming.queue_name {
        Some(name) if !is_generic_queue_name(&name, queue_id.as_deref()) => Some(name),
        incoming_name => existing
            .queue_name
            .clone()
            .filter(|name| !is_generic_queue_name(name, queue_id.as_deref()))
            .or(incoming_name)
            .or_else(|| existing.queue_name.clone()),
    };

    let media_type = match (existing.media_type, incoming.media_type) {
        (current, MediaType::Unknown) => current,
        (MediaType::Callback, MediaType::Voice) => MediaType::Callback,
        (_, newer) => newer,
    };

    let state = if state_ok { incoming.state } else { existing.state };
    let mut wait = if state_ok {
        incoming.wait.or(existing.wait)
    } else {
        existing.wait.or(incoming.wait)
    };
    if state == InteractionState::Interacting {
        wait = wait.map(|w| if w.running { w.freeze_at(incoming.updated_at) } else { w });
    }

    ConversationRecord {
        conversation_id: existing.conversation_id.clone(),
        queue_id,
        queue_name,
        direction: if incoming.direction == Direction::Unknown {
            existing.direction
        } else {
            incoming.direction
        },
        media_type,
        state,
        wait,
        agent_id: incoming.agent_id.or_else(|| existing.agent_id.clone()),
        agent_name: incoming.agent_name.or_else(|| existing.agent_name.clone()),
        address: incoming.address.or_else(|| existing.address.clone()),
        ended: false,
        source: if state_ok { incoming.source } else { existing.source },
        updated_at: existing.updated_at.max(incoming.updated_at),
    }
}

fn is_older(updated_at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    (now - updated_at).to_std().is_ok_and(|age| age > max_age)
}

/// Last queue aggregate fetched from the pull path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullQueueCounts {
    pub counts: Vec<QueueCounts>,
    pub fetched_at: DateTime<Utc>,
}

/// Per-org live state: presence, routing status and in-flight conversations.
#[derive(Debug, Default)]
pub struct LiveStore {
    presence: DashMap<String, PresenceRecord>,
    routing: DashMap<String, RoutingRecord>,
    conversations: DashMap<String, ConversationRecord>,
    /// Ended conversation ids and when the end was observed.
    ended: DashMap<String, DateTime<Utc>>,
    queue_names: DashMap<String, String>,
    pull_queues: ArcSwapOption<PullQueueCounts>,
}

impl LiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-write-wins on the platform modification time. Returns false when
    /// the stored record is newer.
    pub fn apply_presence(&self, record: PresenceRecord) -> bool {
        match self.presence.entry(record.user_id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().observed_at > record.observed_at {
                    return false;
                }
                slot.insert(record);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Last-write-wins on the platform status start time.
    pub fn apply_routing(&self, record: RoutingRecord) -> bool {
        match self.routing.entry(record.user_id.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().observed_at > record.observed_at {
                    return false;
                }
                slot.insert(record);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Insert or merge a conversation. Ended records are removed instead.
    ///
    /// An observation taken no later than a recorded end is discarded.
    pub fn merge_conversation(&self, mut incoming: ConversationRecord) -> MergeOutcome {
        if incoming.ended {
            self.remove_conversation(&incoming.conversation_id, incoming.updated_at);
            return MergeOutcome::Removed;
        }
        if self.ended_since(&incoming.conversation_id, incoming.updated_at) {
            return MergeOutcome::Discarded;
        }
        self.remember_queue_name(&incoming);

        match self.conversations.entry(incoming.conversation_id.clone()) {
            Entry::Occupied(mut slot) => {
                let mut merged = merge_records(slot.get(), incoming);
                self.fill_queue_name(&mut merged);
                slot.insert(merged);
                MergeOutcome::Merged
            }
            Entry::Vacant(slot) => {
                self.fill_queue_name(&mut incoming);
                slot.insert(incoming);
                MergeOutcome::Inserted
            }
        }
    }

    /// Remove a conversation that ended at `ended_at` and remember the end.
    pub fn remove_conversation(&self, conversation_id: &str, ended_at: DateTime<Utc>) -> bool {
        self.ended
            .entry(conversation_id.to_owned())
            .and_modify(|at| *at = (*at).max(ended_at))
            .or_insert(ended_at);
        self.conversations.remove(conversation_id).is_some()
    }

    fn ended_since(&self, conversation_id: &str, observed_at: DateTime<Utc>) -> bool {
        self.ended
            .get(conversation_id)
            .is_some_and(|ended_at| observed_at <= *ended_at)
    }

    fn remember_queue_name(&self, record: &ConversationRecord) {
        if let (Some(id), Some(name)) = (&record.queue_id, &record.queue_name) {
            if !is_generic_queue_name(name, Some(id)) {
                self.queue_names.insert(id.clone(), name.clone());
            }
        }
    }

    fn fill_queue_name(&self, record: &mut ConversationRecord) {
        let Some(id) = record.queue_id.as_deref() else {
            return;
        };
        let generic = record
            .queue_name
            .as_deref()
            .is_none_or(|name| is_generic_queue_name(name, Some(id)));
        if generic {
            if let Some(known) = self.queue_names.get(id) {
                record.queue_name = Some(known.value().clone());
            }
        }
    }

    /// Best-known display name for a queue.
    pub fn queue_name(&self, queue_id: &str) -> Option<String> {
        self.queue_names.get(queue_id).map(|n| n.value().clone())
    }

    pub fn user_presence(&self, user_id: &str) -> Option<PresenceRecord> {
        self.presence.get(user_id).map(|r| r.value().clone())
    }

    pub fn user_routing(&self, user_id: &str) -> Option<RoutingRecord> {
        self.routing.get(user_id).map(|r| r.value().clone())
    }

    /// Presence of `user_id`, evicting it first when older than `max_age`.
    pub fn user_presence_at(
        &self,
        user_id: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<PresenceRecord> {
        self.presence
            .remove_if(user_id, |_, r| is_older(r.updated_at, max_age, now));
        self.user_presence(user_id)
    }

    /// Routing status of `user_id`, evicting it first when older than `max_age`.
    pub fn user_routing_at(
        &self,
        user_id: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<RoutingRecord> {
        self.routing
            .remove_if(user_id, |_, r| is_older(r.updated_at, max_age, now));
        self.user_routing(user_id)
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.conversations.get(conversation_id).map(|r| r.value().clone())
    }

    pub fn active_conversations(&self, max_age: Duration) -> Vec<ConversationRecord> {
        self.active_conversations_at(max_age, Utc::now())
    }

    /// Evict conversations older than `max_age`, then return the rest sorted by id.
    pub fn active_conversations_at(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Vec<ConversationRecord> {
        self.conversations
            .retain(|_, r| !r.ended && !is_older(r.updated_at, max_age, now));
        let mut active: Vec<ConversationRecord> = self
            .conversations
            .iter()
            .map(|r| r.value().clone())
            .collect();
        active.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
        active
    }

    /// Drop every record whose last update is more than `max_age` before `now`.
    pub fn evict_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> Evicted {
        let before = (
            self.presence.len(),
            self.routing.len(),
            self.conversations.len(),
        );
        self.presence
            .retain(|_, r| !is_older(r.updated_at, max_age, now));
        self.routing
            .retain(|_, r| !is_older(r.updated_at, max_age, now));
        self.conversations
            .retain(|_, r| !r.ended && !is_older(r.updated_at, max_age, now));
        self.ended.retain(|_, at| !is_older(*at, max_age, now));
        Evicted {
            presence: before.0.saturating_sub(self.presence.len()),
            routing: before.1.saturating_sub(self.routing.len()),
            conversations: before.2.saturating_sub(self.conversations.len()),
        }
    }

    /// Remove in-scope conversations a pull snapshot no longer lists.
    ///
    /// Only records last updated before the snapshot was taken are touched, so
    /// a push event that raced the fetch survives.
    pub fn prune_missing(
        &self,
        scope: &SnapshotScope,
        seen: &HashSet<String>,
        fetched_at: DateTime<Utc>,
    ) -> usize {
        let before = self.conversations.len();
        self.conversations.retain(|id, r| {
            seen.contains(id) || !scope.covers(r) || r.updated_at >= fetched_at
        });
        before.saturating_sub(self.conversations.len())
    }

    pub fn presence_count(&self) -> usize {
        self.presence.len()
    }

    pub fn routing_count(&self) -> usize {
        self.routing.len()
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn set_pull_queue_counts(&self, counts: Vec<QueueCounts>, fetched_at: DateTime<Utc>) {
        self.pull_queues
            .store(Some(Arc::new(PullQueueCounts { counts, fetched_at })));
    }

    pub fn pull_queue_counts(&self) -> Option<Arc<PullQueueCounts>> {
        self.pull_queues.load_full()
    }

    /// Conversations attributed to each of `queue_ids`, split by state.
    pub fn queue_counts(&self, queue_ids: &[String]) -> Vec<QueueCounts> {
        let mut counts: Vec<QueueCounts> = queue_ids
            .iter()
            .map(|id| QueueCounts {
                queue_id: id.clone(),
                ..Default::default()
            })
            .collect();
        for entry in self.conversations.iter() {
            let record = entry.value();
            let Some(slot) = record
                .queue_id
                .as_ref()
                .and_then(|q| counts.iter_mut().find(|c| &c.queue_id == q))
            else {
                continue;
            };
            match record.state {
                InteractionState::Waiting => slot.waiting += 1,
                InteractionState::Interacting => slot.interacting += 1,
                InteractionState::Ivr | InteractionState::Unknown => {}
            }
        }
        counts
    }
}

// SPDX-FileCopyrightText: 2026 Livedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic grammar: building subscription topics and parsing inbound topic names.

use livedesk_core::Topic;

/// Platform keep-alive topic; frames on it carry no entity state.
pub const HEARTBEAT_TOPIC: &str = "channel.metadata";

/// The entity kind and id a topic name addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicKind {
    UserPresence(String),
    UserRouting(String),
    UserConversations(String),
    QueueConversations(String),
    /// Org-wide conversation stream for one conversation id.
    Conversation(String),
    Heartbeat,
    Unrecognized,
}

impl TopicKind {
    /// Parse a topic name such as `v2.users.{id}.presence`.
    pub fn parse(topic: &str) -> Self {
        if topic == HEARTBEAT_TOPIC {
            return Self::Heartbeat;
        }

        let parts: Vec<&str> = topic.split('.').collect();
        match parts.as_slice() {
            ["v2", "users", id, "presence"] if !id.is_empty() => Self::UserPresence(id.to_string()),
            ["v2", "users", id, "routingStatus"] if !id.is_empty() => {
                Self::UserRouting(id.to_string())
            }
            ["v2", "users", id, "conversations", ..] if !id.is_empty() => {
                Self::UserConversations(id.to_string())
            }
            ["v2", "routing", "queues", id, "conversations", ..] if !id.is_empty() => {
                Self::QueueConversations(id.to_string())
            }
            ["v2", "conversations", id, ..] if !id.is_empty() => Self::Conversation(id.to_string()),
            _ => Self::Unrecognized,
        }
    }

    /// True for topics whose events describe a conversation.
    pub fn is_conversation(&self) -> bool {
        matches!(
            self,
            Self::UserConversations(_) | Self::QueueConversations(_) | Self::Conversation(_)
        )
    }
}

pub fn user_presence(user_id: &str) -> Topic {
    Topic(format!("v2.users.{user_id}.presence"))
}

pub fn user_routing(user_id: &str) -> Topic {
    Topic(format!("v2.users.{user_id}.routingStatus"))
}

pub fn user_calls(user_id: &str) -> Topic {
    Topic(format!("v2.users.{user_id}.conversations.calls"))
}

pub fn queue_conversations(queue_id: &str) -> Topic {
    Topic(format!("v2.routing.queues.{queue_id}.conversations"))
}

pub fn conversation(conversation_id: &str) -> Topic {
    Topic(format!("v2.conversations.{conversation_id}"))
}

/// Presence, routing and call topics for every user, then one topic per queue.
pub fn watch_topics(user_ids: &[String], queue_ids: &[String]) -> Vec<Topic> {
    let mut topics = Vec::with_capacity(user_ids.len() * 3 + queue_ids.len());
    for user in user_ids {
        topics.push(user_presence(user));
        topics.push(user_routing(user));
        topics.push(user_calls(user));
    }
    topics.extend(queue_ids.iter().map(|q| queue_conversations(q)));
    topics
}

/// De-duplicate topics, keeping the first occurrence of each.
pub fn dedupe(topics: &[Topic]) -> Vec<Topic> {
    let mut seen = std::collections::HashSet::with_capacity(topics.len());
    topics
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Order-insensitive identity of a topic set, used for idempotent starts.
pub fn canonical_set(topics: &[Topic]) -> Vec<Topic> {
    let mut set = dedupe(topics);
    set.sort();
    set
}
